//! Client input sampling and throttled update batching

use shared::{InputEvent, Keys, Update};

/// Anything that can report which keys are held for a frame.
///
/// A windowed frontend would read the keyboard here; the headless binary
/// drives its ship with `Autopilot`.
pub trait KeySource {
    fn poll(&mut self, now: f64) -> Keys;
}

/// A fixed set of keys held forever.
impl KeySource for Keys {
    fn poll(&mut self, _now: f64) -> Keys {
        *self
    }
}

/// Scripted pilot that loops through thrusting, turning, firing and braking.
#[derive(Debug, Default, Clone)]
pub struct Autopilot {
    started: Option<f64>,
}

impl Autopilot {
    /// Length of one full manoeuvre in seconds
    pub const CYCLE: f64 = 4.0;

    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySource for Autopilot {
    fn poll(&mut self, now: f64) -> Keys {
        let started = *self.started.get_or_insert(now);
        let phase = (now - started).rem_euclid(Self::CYCLE);

        let mut keys = Keys::default();
        if phase < 1.5 {
            keys.up = true;
        } else if phase < 2.0 {
            keys.left = true;
        } else if phase < 3.0 {
            keys.right = true;
            keys.fire = true;
        } else {
            keys.down = true;
            keys.fire = true;
        }
        keys
    }
}

/// Buffers per-frame input events and releases them as one `Update` at the send rate
pub struct InputManager {
    pending: Vec<InputEvent>,
    send_interval: f64,
    last_sent: f64,
}

impl InputManager {
    pub fn new(send_rate: u32, now: f64) -> Self {
        Self {
            pending: Vec::new(),
            send_interval: 1.0 / send_rate.max(1) as f64,
            last_sent: now,
        }
    }

    pub fn record(&mut self, event: InputEvent) {
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[InputEvent] {
        &self.pending
    }

    /// Takes every buffered event once a send interval has passed since the last update
    pub fn poll_update(&mut self, client_id: u32, now: f64) -> Option<Update> {
        if now - self.last_sent < self.send_interval {
            return None;
        }
        self.last_sent = now;
        Some(Update {
            client_id,
            inputs: std::mem::take(&mut self.pending),
            time_stamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: f64) -> InputEvent {
        InputEvent {
            pressed: Keys::default(),
            delta: 0.016,
            timestamp,
        }
    }

    #[test]
    fn test_input_manager_creation() {
        let manager = InputManager::new(20, 0.0);
        assert!(manager.pending().is_empty());
        assert_eq!(manager.send_interval, 0.05);
    }

    #[test]
    fn test_updates_are_throttled() {
        let mut manager = InputManager::new(20, 100.0);
        manager.record(event(100.01));
        manager.record(event(100.02));
        assert!(manager.poll_update(3, 100.03).is_none());

        manager.record(event(100.06));
        let update = manager.poll_update(3, 100.06).unwrap();
        assert_eq!(update.client_id, 3);
        assert_eq!(update.time_stamp, 100.06);
        assert_eq!(update.inputs.len(), 3);
        assert_eq!(update.inputs[2].timestamp, 100.06);
        assert!(manager.pending().is_empty());

        assert!(manager.poll_update(3, 100.07).is_none());
    }

    #[test]
    fn test_zero_send_rate_is_clamped() {
        let mut manager = InputManager::new(0, 0.0);
        assert!(manager.poll_update(1, 0.5).is_none());
        assert!(manager.poll_update(1, 1.0).is_some());
    }

    #[test]
    fn test_fixed_keys_source() {
        let mut held = Keys {
            fire: true,
            ..Keys::default()
        };
        assert!(held.poll(1.0).fire);
        assert!(held.poll(99.0).fire);
    }

    #[test]
    fn test_autopilot_cycle() {
        let mut pilot = Autopilot::new();
        let start = 1_000.0;

        let keys = pilot.poll(start);
        assert!(keys.up && !keys.fire);
        assert!(pilot.poll(start + 1.75).left);

        let keys = pilot.poll(start + 2.5);
        assert!(keys.right && keys.fire);

        let keys = pilot.poll(start + 3.5);
        assert!(keys.down && keys.fire);

        // wraps around
        assert!(pilot.poll(start + Autopilot::CYCLE + 0.5).up);
    }
}
