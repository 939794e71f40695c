//! Live projectile collection
//!
//! The manager is the only owner of projectiles: it spawns them, advances
//! them in stored order, and removes them once they have come to rest.

use glam::Vec2;

use super::projectile::{BounceEvent, Projectile};
use crate::consts::MAX_PROJECTILES;

/// What the renderer needs to draw one projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileView {
    pub pos: Vec2,
    /// `atan2(vy, vx)`
    pub heading: f32,
}

/// Owns every live projectile
#[derive(Debug, Clone)]
pub struct ProjectileManager {
    projectiles: Vec<Projectile>,
    /// None = unbounded
    capacity: Option<usize>,
}

impl Default for ProjectileManager {
    fn default() -> Self {
        Self::with_capacity(MAX_PROJECTILES)
    }
}

impl ProjectileManager {
    /// Manager that evicts once `capacity` projectiles are live
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            projectiles: Vec::new(),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Manager with no cap on live projectiles
    pub fn unbounded() -> Self {
        Self {
            projectiles: Vec::new(),
            capacity: None,
        }
    }

    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity.map(|c| c.max(1));
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Spawn a projectile at `(x, y)` moving along `direction` (radians).
    pub fn spawn(&mut self, x: f32, y: f32, direction: f32, speed: f32) {
        if let Some(cap) = self.capacity {
            while self.projectiles.len() >= cap {
                self.evict_one();
            }
        }
        self.projectiles
            .push(Projectile::new(Vec2::new(x, y), direction, speed));
    }

    /// Drop the oldest resting projectile, or the oldest one if none rest.
    ///
    /// Projectiles are stored in spawn order, so the first match is the oldest.
    /// A projectile that has not ticked yet is never considered resting.
    fn evict_one(&mut self) {
        let index = self
            .projectiles
            .iter()
            .position(|p| p.age > 0 && p.is_at_rest())
            .unwrap_or(0);
        if index < self.projectiles.len() {
            let evicted = self.projectiles.remove(index);
            log::debug!(
                "Projectile cap reached, evicted age {} at ({:.3}, {:.3})",
                evicted.age,
                evicted.pos.x,
                evicted.pos.y
            );
        }
    }

    /// Advance every projectile once, then remove those at rest.
    ///
    /// Bounce events are returned in projectile order.
    pub fn tick(&mut self, x_scale: f32, screen: Vec2) -> Vec<BounceEvent> {
        let events: Vec<BounceEvent> = self
            .projectiles
            .iter_mut()
            .filter_map(|p| p.advance(x_scale, screen))
            .collect();

        for i in (0..self.projectiles.len()).rev() {
            if self.projectiles[i].is_expired() {
                self.projectiles.remove(i);
            }
        }

        events
    }

    /// Read-only views for drawing
    pub fn render_all(&self) -> impl Iterator<Item = ProjectileView> + '_ {
        self.projectiles.iter().map(|p| ProjectileView {
            pos: p.pos,
            heading: p.heading(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::BounceAxis;
    use std::f32::consts::PI;

    const SCREEN: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn test_resting_projectile_removed_after_rest_age() {
        // Sitting on the floor: every tick bounces back onto y = -1 with zero displacement
        let mut manager = ProjectileManager::unbounded();
        manager.spawn(0.0, -1.0, 0.0, 0.0);

        for tick in 1..=REST_AGE_TICKS {
            let events = manager.tick(1.0, SCREEN);
            assert!(events.iter().all(|e| e.volume == 0.0));
            assert_eq!(manager.len(), 1, "removed early at tick {}", tick);
        }

        manager.tick(1.0, SCREEN);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_dropped_projectile_eventually_rests() {
        let mut manager = ProjectileManager::unbounded();
        manager.spawn(0.0, 0.5, 0.0, 0.0);

        let mut ticks = 0;
        while !manager.is_empty() {
            manager.tick(1.0, SCREEN);
            ticks += 1;
            assert!(ticks < 20_000, "projectile never came to rest");
        }
        assert!(ticks > REST_AGE_TICKS as usize);
    }

    #[test]
    fn test_first_floor_bounce_scenario() {
        // Tiny x_scale pushes the side walls far away so only the floor is hit
        let x_scale = 0.01;
        let mut manager = ProjectileManager::unbounded();
        manager.spawn(0.0, 0.0, 0.0, PROJECTILE_SPEED);

        let (prev_y, events) = loop {
            let prev_y = manager.iter().next().expect("live").pos.y;
            let events = manager.tick(x_scale, SCREEN);
            if !events.is_empty() {
                break (prev_y, events);
            }
        };

        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.axis, BounceAxis::Vertical);
        assert!(!event.corner);

        let dy = -1.0 - prev_y;
        let expected = (10.0 * dy.abs()).min(0.4);
        assert!((event.volume - expected).abs() < 1e-6);
        assert_eq!(event.pixel.y, SCREEN.y);
    }

    #[test]
    fn test_opposite_projectiles_tracked_independently() {
        let mut manager = ProjectileManager::unbounded();
        manager.spawn(0.0, 0.0, 0.0, PROJECTILE_SPEED);
        manager.spawn(0.0, 0.0, PI, PROJECTILE_SPEED);

        for _ in 0..10 {
            manager.tick(1.0, SCREEN);
        }

        let live: Vec<_> = manager.iter().cloned().collect();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].age, 10);
        assert_eq!(live[1].age, 10);
        assert!(live[0].pos.x > 0.0);
        assert!(live[1].pos.x < 0.0);
        assert!((live[0].pos.x + live[1].pos.x).abs() < 1e-5);
        assert!((live[0].pos.y - live[1].pos.y).abs() < 1e-6);

        // Both come to rest and leave; neither lingers because of the other
        let mut ticks = 0;
        while !manager.is_empty() {
            manager.tick(1.0, SCREEN);
            ticks += 1;
            assert!(ticks < 50_000);
        }
    }

    #[test]
    fn test_removal_keeps_survivor_order() {
        let mut manager = ProjectileManager::unbounded();
        manager.spawn(0.0, -1.0, 0.0, 0.0); // rests on the floor
        manager.spawn(0.0, 0.0, 0.0, PROJECTILE_SPEED);
        manager.spawn(0.5, -1.0, 0.0, 0.0); // rests on the floor

        for _ in 0..=REST_AGE_TICKS {
            manager.tick(1.0, SCREEN);
        }

        assert_eq!(manager.len(), 1);
        assert!(manager.iter().next().expect("mover").vel.length() > 0.0);
    }

    #[test]
    fn test_cap_evicts_resting_before_moving() {
        let mut manager = ProjectileManager::with_capacity(2);
        manager.spawn(0.0, 0.0, 0.0, PROJECTILE_SPEED); // moving
        manager.spawn(0.3, -1.0, 0.0, 0.0); // resting
        manager.tick(1.0, SCREEN);

        manager.spawn(-0.3, 0.0, PI, PROJECTILE_SPEED);
        assert_eq!(manager.len(), 2);
        // The first (oldest, moving) one survives; the resting one was evicted
        let xs: Vec<f32> = manager.iter().map(|p| p.pos.x).collect();
        assert!(xs[0] > 0.0);
        assert_eq!(xs[1], -0.3);
    }

    #[test]
    fn test_cap_evicts_oldest_when_all_moving() {
        let mut manager = ProjectileManager::with_capacity(2);
        manager.spawn(0.1, 0.0, 0.0, PROJECTILE_SPEED);
        manager.spawn(0.2, 0.0, 0.0, PROJECTILE_SPEED);
        manager.tick(1.0, SCREEN);
        manager.spawn(0.3, 0.0, 0.0, PROJECTILE_SPEED);

        let xs: Vec<f32> = manager.iter().map(|p| p.pos.x).collect();
        assert_eq!(xs.len(), 2);
        assert!(xs[0] > 0.2);
        assert_eq!(xs[1], 0.3);
    }

    #[test]
    fn test_render_all_reports_heading() {
        let mut manager = ProjectileManager::default();
        manager.spawn(0.0, 0.0, PI / 2.0, PROJECTILE_SPEED);
        let views: Vec<_> = manager.render_all().collect();
        assert_eq!(views.len(), 1);
        assert!((views[0].heading - PI / 2.0).abs() < 1e-5);
    }
}
