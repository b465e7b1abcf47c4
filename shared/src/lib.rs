//! Types and rules shared by the arena server and client.
//!
//! Both sides run the same movement, damage and collision code so a client's
//! local prediction lands where the server's replay of the same inputs lands.

pub mod collision;
pub mod entity;
pub mod protocol;

pub use collision::{expire_bullets, resolve_barrier_hits, resolve_bullet_hits, sweep};
pub use entity::{default_barriers, Barrier, Bullet, Gun, Keys, Rect, Ship};
pub use protocol::{ClientMessage, InputEvent, ProtocolError, ServerMessage, Update, WorldView};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const WORLD_WIDTH: i32 = 1900;
pub const WORLD_HEIGHT: i32 = 900;
pub const BARRIER_THICKNESS: i32 = 40;

pub const SHIP_SIZE: i32 = 32;
pub const MAX_HITPOINTS: i32 = 10;
pub const MAX_VELOCITY: f64 = 15.0;
/// Velocity gained per second of held thrust.
pub const THRUST_RATE: f64 = 5.0;
/// Velocity lost per second of held brake.
pub const BRAKE_RATE: f64 = 20.0;
/// Degrees turned per second of held rotation.
pub const TURN_RATE: f64 = 180.0;
pub const RESPAWN_TIMER: f64 = 5.0;

pub const BULLET_SIZE: i32 = 8;
pub const BULLET_SPEED: f64 = 60.0;
pub const BULLET_TTL: f64 = 3.0;
pub const FIRE_INTERVAL: f64 = 0.2;

pub const SHIP_COLLISION_DAMAGE: i32 = 1;
pub const BULLET_DAMAGE: i32 = 1;
pub const BARRIER_DAMAGE: i32 = 2;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_SEND_RATE: u32 = 20;
pub const TRUST_CAPACITY: usize = 30;
/// Longest frame an input event may claim, in seconds.
pub const MAX_INPUT_DELTA: f64 = 1.0;

/// Current wall-clock time in seconds since the Unix epoch.
pub fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs_f64()
}

/// Reduces an angle in degrees into `(0, 360]`. Non-finite angles become 360.
pub fn normalize_direction(direction: f64) -> f64 {
    if !direction.is_finite() {
        return 360.0;
    }
    let reduced = direction.rem_euclid(360.0);
    if reduced == 0.0 {
        360.0
    } else {
        reduced
    }
}

/// Displacement for one step of `speed` along `direction`.
///
/// Direction 360 points up the screen, angles grow counter-clockwise.
pub fn heading_offset(direction: f64, speed: f64) -> (f64, f64) {
    let radians = direction.to_radians();
    (-radians.sin() * speed, -radians.cos() * speed)
}
