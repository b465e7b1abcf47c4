//! Ship-ship, bullet-ship and ship-barrier collision passes.
//!
//! Bullets travel a long way per step compared to their size, so hits are
//! tested against the swept path between the old and new position rather
//! than the end position alone.

use crate::entity::{Barrier, Rect, Ship};
use crate::{BARRIER_DAMAGE, BULLET_DAMAGE, BULLET_SIZE, SHIP_COLLISION_DAMAGE};
use std::collections::BTreeMap;

/// Resolves one ship-ship collision: both take damage and trade velocity and heading.
///
/// A pair is skipped when either ship has already been resolved this tick.
/// Returns whether the collision was resolved.
pub fn collide_ships(a: &mut Ship, b: &mut Ship) -> bool {
    if !a.rect.intersects(&b.rect) || a.colliding || b.colliding {
        return false;
    }

    a.colliding = true;
    b.colliding = true;
    a.take_damage(SHIP_COLLISION_DAMAGE);
    b.take_damage(SHIP_COLLISION_DAMAGE);

    std::mem::swap(&mut a.velocity, &mut b.velocity);
    std::mem::swap(&mut a.direction, &mut b.direction);

    a.update_position();
    b.update_position();
    true
}

/// Samples the straight path from `start` to `end` into `w`×`h` rectangles.
///
/// Consecutive samples are never further apart than one rectangle in either
/// axis, so anything at least as large as the rectangle cannot be skipped.
/// The first sample sits at `start` and the last at `end`.
pub fn sweep(start: (i32, i32), end: (i32, i32), w: i32, h: i32) -> Vec<Rect> {
    let (start_x, start_y) = start;
    let (end_x, end_y) = end;
    let length_x = (end_x - start_x) as f64;
    let length_y = (end_y - start_y) as f64;

    let iterations = (length_x.abs() / w.max(1) as f64).max(length_y.abs() / h.max(1) as f64);
    if iterations <= 0.0 {
        return vec![Rect::new(end_x, end_y, w, h)];
    }

    let step_x = length_x / iterations;
    let step_y = length_y / iterations;
    let samples = iterations.ceil() as usize;

    (0..=samples)
        .map(|i| {
            let t = (i as f64).min(iterations);
            Rect::new(
                start_x + (step_x * t).round() as i32,
                start_y + (step_y * t).round() as i32,
                w,
                h,
            )
        })
        .collect()
}

/// Advances every bullet one step and applies hits along each swept path.
///
/// Every ship is a target, including the one that fired. A bullet may hit
/// several ships on the same sweep; it is tombstoned after any hit.
/// Returns the number of hits.
pub fn resolve_bullet_hits(ships: &mut BTreeMap<u32, Ship>, now: f64) -> usize {
    let targets: Vec<(u32, Rect)> = ships.iter().map(|(id, ship)| (*id, ship.rect)).collect();
    let mut hits = Vec::new();

    for ship in ships.values_mut() {
        for bullet in ship.gun.bullets.iter_mut() {
            if bullet.is_expired() {
                continue;
            }
            let start = (bullet.x, bullet.y);
            bullet.advance(now);
            let path = sweep(start, (bullet.x, bullet.y), BULLET_SIZE, BULLET_SIZE);

            for (target_id, target) in &targets {
                if path.iter().any(|step| step.intersects(target)) {
                    hits.push(*target_id);
                    bullet.tombstone();
                }
            }
        }
    }

    for target_id in &hits {
        if let Some(ship) = ships.get_mut(target_id) {
            ship.take_damage(BULLET_DAMAGE);
        }
    }
    hits.len()
}

/// Damages and turns back every ship overlapping a barrier. Returns the number of contacts.
pub fn resolve_barrier_hits(ships: &mut BTreeMap<u32, Ship>, barriers: &[Barrier]) -> usize {
    let mut contacts = 0;
    for barrier in barriers {
        for ship in ships.values_mut() {
            if barrier.rect.intersects(&ship.rect) {
                ship.take_damage(BARRIER_DAMAGE);
                ship.turn(180.0);
                contacts += 1;
            }
        }
    }
    contacts
}

/// Drops spent bullets from every gun.
pub fn expire_bullets(ships: &mut BTreeMap<u32, Ship>) {
    for ship in ships.values_mut() {
        ship.gun.expire_old_bullets();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Bullet;
    use crate::{MAX_HITPOINTS, SHIP_SIZE};

    const NOW: f64 = 2_000.0;

    fn bullet_at(x: i32, y: i32, direction: f64) -> Bullet {
        Bullet {
            time: NOW,
            x,
            y,
            direction,
            age: 0.0,
        }
    }

    #[test]
    fn test_collide_ships_swaps_momentum() {
        let mut a = Ship::new(100, 100);
        let mut b = Ship::new(120, 100);
        a.velocity = 6.0;
        a.direction = 270.0;
        b.velocity = 2.0;
        b.direction = 90.0;

        assert!(collide_ships(&mut a, &mut b));

        assert_eq!(a.hitpoints, MAX_HITPOINTS - 1);
        assert_eq!(b.hitpoints, MAX_HITPOINTS - 1);
        assert_eq!((a.velocity, a.direction), (2.0, 90.0));
        assert_eq!((b.velocity, b.direction), (6.0, 270.0));
        // a bounced left by 2, b right by 6
        assert_eq!(a.position(), (98, 100));
        assert_eq!(b.position(), (126, 100));
    }

    #[test]
    fn test_collision_pass_skips_already_colliding_pair() {
        let mut a = Ship::new(100, 100);
        let mut b = Ship::new(110, 110);
        let mut c = Ship::new(400, 400);
        let mut d = Ship::new(410, 410);
        c.colliding = true;

        assert!(collide_ships(&mut a, &mut b));
        assert!(!collide_ships(&mut c, &mut d));
        // resolved once per tick only
        assert!(!collide_ships(&mut a, &mut b));

        assert_eq!(a.hitpoints, MAX_HITPOINTS - 1);
        assert_eq!(b.hitpoints, MAX_HITPOINTS - 1);
        assert_eq!(c.hitpoints, MAX_HITPOINTS);
        assert_eq!(d.hitpoints, MAX_HITPOINTS);
        assert!(!d.colliding);
    }

    #[test]
    fn test_collide_ships_requires_overlap() {
        let mut a = Ship::new(0, 0);
        let mut b = Ship::new(SHIP_SIZE, 0);
        assert!(!collide_ships(&mut a, &mut b));
        assert!(!a.colliding && !b.colliding);
    }

    #[test]
    fn test_sweep_covers_whole_path() {
        let path = sweep((0, 0), (60, 0), 8, 8);
        assert_eq!(path.first().map(|r| (r.x, r.y)), Some((0, 0)));
        assert_eq!(path.last().map(|r| (r.x, r.y)), Some((60, 0)));
        for pair in path.windows(2) {
            assert!(pair[1].x - pair[0].x <= 8);
            assert!(pair[1].x >= pair[0].x);
        }
    }

    #[test]
    fn test_sweep_diagonal_and_reverse() {
        let path = sweep((100, 100), (40, 70), 8, 8);
        assert_eq!(path.last().map(|r| (r.x, r.y)), Some((40, 70)));
        for pair in path.windows(2) {
            assert!((pair[1].x - pair[0].x).abs() <= 8);
            assert!((pair[1].y - pair[0].y).abs() <= 8);
        }
    }

    #[test]
    fn test_sweep_without_movement() {
        let path = sweep((5, 5), (5, 5), 8, 8);
        assert_eq!(path, vec![Rect::new(5, 5, 8, 8)]);
    }

    #[test]
    fn test_fast_bullet_does_not_tunnel() {
        // 60px step straight through a 32px ship that neither endpoint touches
        let target = Rect::new(20, 0, SHIP_SIZE, SHIP_SIZE);
        let start = Rect::new(0, 10, 8, 8);
        let end = Rect::new(60, 10, 8, 8);
        assert!(!start.intersects(&target));
        assert!(!end.intersects(&target));

        let path = sweep((0, 10), (60, 10), 8, 8);
        assert!(path.iter().any(|step| step.intersects(&target)));
    }

    #[test]
    fn test_bullet_pass_hits_ship_on_path() {
        let mut ships = BTreeMap::new();
        let mut shooter = Ship::new(100, 500);
        // heading 270 travels +x; starts left of the target, ends past it
        shooter.gun.bullets.push(bullet_at(170, 510, 270.0));
        ships.insert(1, shooter);
        ships.insert(2, Ship::new(200, 500));

        let hits = resolve_bullet_hits(&mut ships, NOW + 0.05);

        assert_eq!(hits, 1);
        assert_eq!(ships[&2].hitpoints, MAX_HITPOINTS - 1);
        assert_eq!(ships[&1].hitpoints, MAX_HITPOINTS);
        let bullet = &ships[&1].gun.bullets[0];
        assert_eq!(bullet.x, 230);
        assert!(bullet.is_expired());

        expire_bullets(&mut ships);
        assert!(ships[&1].gun.bullets.is_empty());
    }

    #[test]
    fn test_bullet_pass_can_hit_firer() {
        let mut ships = BTreeMap::new();
        let mut shooter = Ship::new(300, 300);
        shooter.gun.bullets.push(bullet_at(250, 310, 270.0));
        ships.insert(7, shooter);

        assert_eq!(resolve_bullet_hits(&mut ships, NOW), 1);
        assert_eq!(ships[&7].hitpoints, MAX_HITPOINTS - 1);
    }

    #[test]
    fn test_bullet_pass_misses_and_keeps_bullet() {
        let mut ships = BTreeMap::new();
        let mut shooter = Ship::new(100, 100);
        shooter.gun.bullets.push(bullet_at(500, 500, 360.0));
        ships.insert(1, shooter);
        ships.insert(2, Ship::new(900, 600));

        assert_eq!(resolve_bullet_hits(&mut ships, NOW + 0.05), 0);
        expire_bullets(&mut ships);
        let bullet = &ships[&1].gun.bullets[0];
        assert_eq!((bullet.x, bullet.y), (500, 440));
        assert!(!bullet.is_expired());
    }

    #[test]
    fn test_barrier_damages_and_turns_ship() {
        let barriers = vec![Barrier::new(0, 0, 40, 900)];
        let mut ships = BTreeMap::new();
        let mut ship = Ship::new(30, 300);
        ship.direction = 90.0;
        ships.insert(1, ship);
        ships.insert(2, Ship::new(500, 300));

        assert_eq!(resolve_barrier_hits(&mut ships, &barriers), 1);
        assert_eq!(ships[&1].hitpoints, MAX_HITPOINTS - 2);
        assert_eq!(ships[&1].direction, 270.0);
        assert_eq!(ships[&2].hitpoints, MAX_HITPOINTS);
        assert_eq!(ships[&2].direction, 360.0);
    }
}
