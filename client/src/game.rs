//! Client-side prediction and reconciliation
//!
//! The local ship is simulated immediately from the keys held each frame.
//! Broadcasts are then checked against the positions the client recently
//! predicted: a familiar position keeps the local ship, anything else snaps
//! it to the server. Hitpoints and death always come from the server.
//!
//! Remote ships are taken straight from each broadcast and only nudged
//! between broadcasts by replaying the inputs the server echoed for them.

use crate::history::TrustBuffer;
use log::debug;
use shared::{
    default_barriers, expire_bullets, resolve_barrier_hits, resolve_bullet_hits, Barrier,
    InputEvent, Keys, Ship, WorldView,
};
use std::collections::{BTreeMap, VecDeque};

/// How a broadcast was applied to the local ship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing was predicted yet, the server ship was taken as is
    Adopted,
    /// The server position was one we predicted, the local ship was kept
    KeptLocal,
    /// The server position was unknown, the local ship snapped to it
    Snapped,
}

pub struct ClientGameState {
    client_id: u32,
    pub ships: BTreeMap<u32, Ship>,
    pub barriers: Vec<Barrier>,
    /// Echoed inputs per remote ship, consumed one per frame
    remote_inputs: BTreeMap<u32, VecDeque<InputEvent>>,
    trust: TrustBuffer,
    last_server_time: Option<f64>,
}

impl ClientGameState {
    pub fn new(client_id: u32, trust_capacity: usize) -> Self {
        Self {
            client_id,
            ships: BTreeMap::new(),
            barriers: default_barriers(),
            remote_inputs: BTreeMap::new(),
            trust: TrustBuffer::new(trust_capacity),
            last_server_time: None,
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn local_ship(&self) -> Option<&Ship> {
        self.ships.get(&self.client_id)
    }

    pub fn trust(&self) -> &TrustBuffer {
        &self.trust
    }

    /// Server clock of the latest broadcast applied
    pub fn last_server_time(&self) -> Option<f64> {
        self.last_server_time
    }

    /// Replaces the world with a server view, reconciling the local ship
    pub fn apply_server_state(&mut self, view: WorldView) -> Reconciliation {
        let local = self.ships.remove(&self.client_id);
        let client_id = self.client_id;

        if view.time_stamp.is_some() {
            self.last_server_time = view.time_stamp;
        }
        self.remote_inputs = view
            .inputs
            .into_iter()
            .filter(|(id, _)| *id != client_id)
            .map(|(id, inputs)| (id, VecDeque::from(inputs)))
            .collect();
        self.ships = view.ships;

        let Some(server_ship) = self.ships.remove(&client_id) else {
            // the server has not placed us yet, keep whatever we had
            if let Some(local) = local {
                self.ships.insert(client_id, local);
            }
            return Reconciliation::KeptLocal;
        };

        let (ship, outcome) = match local {
            Some(mut local) if !self.trust.is_empty() => {
                local.hitpoints = server_ship.hitpoints;
                local.dead = server_ship.dead;
                local.dead_stamp = server_ship.dead_stamp;

                if self.trust.contains(server_ship.position()) {
                    (local, Reconciliation::KeptLocal)
                } else {
                    debug!(
                        "Snapping ship {} from {:?} to server position {:?}",
                        client_id,
                        local.position(),
                        server_ship.position()
                    );
                    // positions predicted before the correction no longer count
                    self.trust.clear();
                    (server_ship, Reconciliation::Snapped)
                }
            }
            _ => (server_ship, Reconciliation::Adopted),
        };

        self.ships.insert(client_id, ship);
        outcome
    }

    /// Runs one client frame and returns the input event to send to the server
    ///
    /// The local ship moves with `keys`; each remote ship replays at most one
    /// echoed input using this frame's `delta`. Bullets, barriers and expiry
    /// follow, then the local position is remembered for reconciliation.
    pub fn step_frame(&mut self, keys: Keys, delta: f64, now: f64) -> InputEvent {
        for ship in self.ships.values_mut() {
            ship.colliding = false;
        }

        let ids: Vec<u32> = self.ships.keys().copied().collect();
        for id in ids {
            let pressed = if id == self.client_id {
                Some(keys)
            } else {
                self.remote_inputs
                    .get_mut(&id)
                    .and_then(|queue| queue.pop_front())
                    .map(|event| event.pressed)
            };
            let Some(pressed) = pressed else {
                continue;
            };
            if let Some(mut ship) = self.ships.remove(&id) {
                ship.handle_movement_input(&pressed, delta, self.ships.values_mut(), now);
                self.ships.insert(id, ship);
            }
        }

        resolve_bullet_hits(&mut self.ships, now);
        resolve_barrier_hits(&mut self.ships, &self.barriers);
        expire_bullets(&mut self.ships);

        if let Some(local) = self.ships.get(&self.client_id) {
            if local.dead {
                self.trust.clear();
            } else {
                self.trust.push(local.position());
            }
        }

        InputEvent {
            pressed: keys,
            delta,
            timestamp: now,
        }
    }
}
