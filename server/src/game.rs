use log::{debug, info};
use rand::Rng;
use shared::entity::spawn_area;
use shared::{
    default_barriers, expire_bullets, resolve_barrier_hits, resolve_bullet_hits, Barrier,
    InputEvent, Ship,
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("input for client {0} has no ship in the world")]
    MissingShip(u32),
}

/// Counters from one simulation step, used for periodic stats logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub inputs: usize,
    pub bullet_hits: usize,
    pub barrier_contacts: usize,
    pub respawns: usize,
}

/// The authoritative arena: every ship keyed by its owner's client ID.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub ships: BTreeMap<u32, Ship>,
    pub barriers: Vec<Barrier>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            ships: BTreeMap::new(),
            barriers: default_barriers(),
        }
    }

    /// Places a fresh ship for `client_id` at a random point inside the walls.
    pub fn add_ship<R: Rng>(&mut self, client_id: u32, rng: &mut R) -> &Ship {
        let (x, y) = random_spawn_point(rng);
        info!("Added ship {} at ({}, {})", client_id, x, y);
        self.ships.entry(client_id).or_insert(Ship::new(x, y))
    }

    pub fn remove_ship(&mut self, client_id: &u32) {
        if self.ships.remove(client_id).is_some() {
            info!("Removed ship {}", client_id);
        }
    }

    /// Advances the world by one tick.
    ///
    /// Every timeline event is applied in order to a working copy of the
    /// ships, then bullets, barriers, deaths and respawns are resolved, and
    /// finally the copy replaces the authoritative map. An event for a ship
    /// that does not exist aborts the step before anything is replaced.
    pub fn step<R: Rng>(
        &mut self,
        timeline: &[(u32, InputEvent)],
        now: f64,
        rng: &mut R,
    ) -> Result<StepReport, SimulationError> {
        for ship in self.ships.values_mut() {
            ship.colliding = false;
        }

        let mut working = self.ships.clone();
        for (client_id, event) in timeline {
            let mut ship = working
                .remove(client_id)
                .ok_or(SimulationError::MissingShip(*client_id))?;
            ship.handle_movement_input(&event.pressed, event.delta, working.values_mut(), now);
            working.insert(*client_id, ship);
        }

        let bullet_hits = resolve_bullet_hits(&mut working, now);
        let barrier_contacts = resolve_barrier_hits(&mut working, &self.barriers);
        expire_bullets(&mut working);

        let mut respawns = 0;
        for (client_id, ship) in working.iter_mut() {
            ship.handle_death(now);
            if ship.spawn(now, || random_spawn_point(rng)) {
                debug!("Ship {} respawned at {:?}", client_id, ship.position());
                respawns += 1;
            }
        }

        self.ships = working;
        self.tick += 1;

        Ok(StepReport {
            inputs: timeline.len(),
            bullet_hits,
            barrier_contacts,
            respawns,
        })
    }
}

/// Uniform top-left corner for a ship that keeps it clear of every wall.
pub fn random_spawn_point<R: Rng>(rng: &mut R) -> (i32, i32) {
    let area = spawn_area();
    (
        rng.gen_range(area.x..=area.x + area.w),
        rng.gen_range(area.y..=area.y + area.h),
    )
}
