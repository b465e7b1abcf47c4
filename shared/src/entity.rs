//! Ships, their guns and bullets, and the static barriers of the arena.
//!
//! Everything here is plain data plus the per-entity rules (movement, fire
//! rate, damage, death and respawn). Entities serialize directly into the
//! wire `ShipState` layout, so a deep copy is just `Clone`.

use crate::collision::collide_ships;
use crate::{
    heading_offset, normalize_direction, BARRIER_THICKNESS, BRAKE_RATE, BULLET_SIZE,
    BULLET_SPEED, BULLET_TTL, FIRE_INTERVAL, MAX_HITPOINTS, MAX_VELOCITY, RESPAWN_TIMER,
    SHIP_SIZE, THRUST_RATE, TURN_RATE, WORLD_HEIGHT, WORLD_WIDTH,
};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in integer pixel space, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }
}

/// Keys held during one input frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keys {
    /// Thrust
    pub up: bool,
    /// Brake
    pub down: bool,
    /// Turn counter-clockwise
    pub left: bool,
    /// Turn clockwise
    pub right: bool,
    pub fire: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    /// Wall-clock time of the last `advance`.
    pub time: f64,
    pub x: i32,
    pub y: i32,
    pub direction: f64,
    /// Seconds accumulated since the bullet was fired.
    pub age: f64,
}

impl Bullet {
    /// Fires a bullet from `(x, y)` and moves it one step so it clears the muzzle.
    pub fn new(direction: f64, x: i32, y: i32, now: f64) -> Self {
        let mut bullet = Self {
            time: now,
            x,
            y,
            direction: normalize_direction(direction),
            age: 0.0,
        };
        bullet.advance(now);
        bullet
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, BULLET_SIZE, BULLET_SIZE)
    }

    /// Moves one step along the heading and accrues age up to `now`.
    pub fn advance(&mut self, now: f64) {
        let (dx, dy) = heading_offset(self.direction, BULLET_SPEED);
        self.x += dx.round() as i32;
        self.y += dy.round() as i32;
        self.age += (now - self.time).max(0.0);
        self.time = now;
    }

    pub fn is_expired(&self) -> bool {
        self.age >= BULLET_TTL
    }

    /// Marks the bullet spent so it cannot hit again and is dropped on the next expiry pass.
    pub fn tombstone(&mut self) {
        self.age = self.age.max(BULLET_TTL);
    }
}

/// A ship's weapon: the fire-rate limiter and the bullets it has in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gun {
    pub bullets: Vec<Bullet>,
    pub last_time_fired: f64,
}

impl Gun {
    /// Fires unless the previous shot was within `FIRE_INTERVAL` of `now`.
    ///
    /// Returns whether a bullet was fired.
    pub fn shoot(&mut self, direction: f64, x: i32, y: i32, now: f64) -> bool {
        if now - self.last_time_fired <= FIRE_INTERVAL {
            return false;
        }
        self.bullets.push(Bullet::new(direction, x, y, now));
        self.last_time_fired = now;
        true
    }

    pub fn expire_old_bullets(&mut self) {
        self.bullets.retain(|bullet| !bullet.is_expired());
    }
}

/// A player's ship. Serializes as the wire `ShipState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    #[serde(flatten)]
    pub rect: Rect,
    pub velocity: f64,
    pub hitpoints: i32,
    /// Set while resolving ship-ship collisions, cleared at the start of every tick.
    pub colliding: bool,
    pub dead: bool,
    /// Wall-clock time of death, 0 while alive.
    pub dead_stamp: f64,
    pub direction: f64,
    pub gun: Gun,
}

impl Ship {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            rect: Rect::new(x, y, SHIP_SIZE, SHIP_SIZE),
            velocity: 0.0,
            hitpoints: MAX_HITPOINTS,
            colliding: false,
            dead: false,
            dead_stamp: 0.0,
            direction: 360.0,
            gun: Gun::default(),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.rect.x, self.rect.y)
    }

    pub fn center(&self) -> (f64, f64) {
        self.rect.center()
    }

    pub fn take_damage(&mut self, damage: i32) {
        if self.hitpoints > 0 {
            self.hitpoints = (self.hitpoints - damage).clamp(0, MAX_HITPOINTS);
        }
    }

    /// Marks the ship dead once its hitpoints are gone.
    ///
    /// The death stamp is recorded on the first transition only.
    pub fn handle_death(&mut self, now: f64) {
        if self.hitpoints <= 0 {
            if !self.dead {
                self.dead_stamp = now;
            }
            self.dead = true;
        }
    }

    /// Brings a dead ship back once `RESPAWN_TIMER` has passed since its death.
    ///
    /// `spawn_point` is only consulted when the respawn actually happens.
    /// Returns whether the ship respawned.
    pub fn spawn<F>(&mut self, now: f64, spawn_point: F) -> bool
    where
        F: FnOnce() -> (i32, i32),
    {
        if !self.dead || now - self.dead_stamp <= RESPAWN_TIMER {
            return false;
        }
        let (x, y) = spawn_point();
        self.rect.x = x;
        self.rect.y = y;
        self.hitpoints = MAX_HITPOINTS;
        self.dead = false;
        self.dead_stamp = 0.0;
        self.velocity = 0.0;
        self.colliding = false;
        true
    }

    /// Rotates the heading by `degrees`, keeping it within `(0, 360]`.
    pub fn turn(&mut self, degrees: f64) {
        self.direction = normalize_direction(self.direction + degrees);
    }

    /// Integrates one step of the current velocity into the position.
    pub fn update_position(&mut self) {
        let (dx, dy) = heading_offset(self.direction, self.velocity);
        self.rect.translate(dx.round() as i32, dy.round() as i32);
    }

    /// Resolves collisions against every neighbour. Returns whether any overlap was found.
    pub fn handle_inter_ship_collision<'a, I>(&mut self, neighbors: I) -> bool
    where
        I: IntoIterator<Item = &'a mut Ship>,
    {
        let mut collision = false;
        for other in neighbors {
            if self.rect.intersects(&other.rect) {
                collision = true;
                collide_ships(self, other);
            }
        }
        collision
    }

    /// Applies one frame of held keys. Server replay and client prediction both go through here.
    ///
    /// `neighbors` must not include this ship.
    pub fn handle_movement_input<'a, I>(&mut self, keys: &Keys, delta: f64, neighbors: I, now: f64)
    where
        I: IntoIterator<Item = &'a mut Ship>,
    {
        if self.dead {
            return;
        }

        if keys.up {
            self.velocity = (self.velocity + THRUST_RATE * delta).min(MAX_VELOCITY);
        } else if keys.down {
            self.velocity = (self.velocity - BRAKE_RATE * delta).max(0.0);
        }

        if keys.left {
            self.turn(TURN_RATE * delta);
        } else if keys.right {
            self.turn(-TURN_RATE * delta);
        }

        if keys.fire {
            let (cx, cy) = self.center();
            let (dx, dy) = heading_offset(self.direction, self.velocity);
            let muzzle_x = (cx + dx) as i32;
            let muzzle_y = (cy + dy) as i32;
            self.gun.shoot(self.direction, muzzle_x, muzzle_y, now);
        }

        self.handle_inter_ship_collision(neighbors);
        self.handle_death(now);
        self.update_position();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barrier {
    pub rect: Rect,
}

impl Barrier {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            rect: Rect::new(x, y, w, h),
        }
    }
}

/// The four walls enclosing the arena.
pub fn default_barriers() -> Vec<Barrier> {
    vec![
        Barrier::new(0, 0, WORLD_WIDTH, BARRIER_THICKNESS),
        Barrier::new(0, WORLD_HEIGHT - BARRIER_THICKNESS, WORLD_WIDTH, BARRIER_THICKNESS),
        Barrier::new(0, 0, BARRIER_THICKNESS, WORLD_HEIGHT),
        Barrier::new(WORLD_WIDTH - BARRIER_THICKNESS, 0, BARRIER_THICKNESS, WORLD_HEIGHT),
    ]
}

/// Region of valid top-left spawn positions: inside the walls, ship fully clear of them.
pub fn spawn_area() -> Rect {
    Rect::new(
        BARRIER_THICKNESS,
        BARRIER_THICKNESS,
        WORLD_WIDTH - 2 * BARRIER_THICKNESS - SHIP_SIZE,
        WORLD_HEIGHT - 2 * BARRIER_THICKNESS - SHIP_SIZE,
    )
}
