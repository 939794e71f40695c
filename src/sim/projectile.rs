//! Projectile kinematics and boundary bounces
//!
//! One projectile integrates with explicit Euler at a fixed step. The caller
//! guarantees a constant tick rate, so there is no dt parameter.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::audio::AudioEvent;
use crate::consts::*;
use crate::world_to_pixel;

/// Which boundary a projectile struck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BounceAxis {
    /// Top or bottom edge
    Vertical,
    /// Left or right edge
    Horizontal,
}

/// A boundary collision, produced by `Projectile::advance` and consumed immediately
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceEvent {
    /// Axis used for loudness. Vertical wins when both edges were struck.
    pub axis: BounceAxis,
    /// Both axes bounced in the same tick
    pub corner: bool,
    /// Post-clamp displacement on `axis` this tick
    pub displacement: f32,
    /// `min(10 * |displacement|, 0.4)`
    pub volume: f32,
    /// Bounce position in screen pixels
    pub pixel: Vec2,
}

impl BounceEvent {
    pub fn audio(&self) -> AudioEvent {
        AudioEvent {
            volume: self.volume,
            position: Some(self.pixel),
        }
    }
}

impl From<BounceEvent> for AudioEvent {
    fn from(event: BounceEvent) -> Self {
        event.audio()
    }
}

/// Bounce loudness for a displacement on the struck axis
#[inline]
pub fn bounce_volume(displacement: f32) -> f32 {
    (displacement.abs() * BOUNCE_VOLUME_SCALE).min(MAX_BOUNCE_VOLUME)
}

/// Sanitize the viewport correction so bounds stay finite
#[inline]
pub(crate) fn sanitize_x_scale(x_scale: f32) -> f32 {
    if x_scale.is_finite() && x_scale > 0.0 {
        x_scale
    } else {
        1.0
    }
}

/// A live projectile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub pos: Vec2,
    pub prev_pos: Vec2,
    pub vel: Vec2,
    /// Ticks since spawn
    pub age: u32,
}

impl Projectile {
    pub fn new(pos: Vec2, direction: f32, speed: f32) -> Self {
        Self {
            pos,
            prev_pos: pos,
            vel: Vec2::new(direction.cos() * speed, direction.sin() * speed),
            age: 0,
        }
    }

    /// Heading angle used for sprite orientation
    pub fn heading(&self) -> f32 {
        self.vel.y.atan2(self.vel.x)
    }

    /// Displacement over the last tick
    pub fn displacement(&self) -> Vec2 {
        self.pos - self.prev_pos
    }

    pub fn is_at_rest(&self) -> bool {
        self.displacement().length() < REST_EPSILON
    }

    /// Old enough and no longer moving
    pub fn is_expired(&self) -> bool {
        self.age > REST_AGE_TICKS && self.is_at_rest()
    }

    /// Advance one tick.
    ///
    /// `x_scale` corrects for viewport aspect: the horizontal bound is
    /// `1.0 / x_scale`. `screen` is the pixel size used to place the bounce
    /// sound. Returns at most one bounce per tick.
    pub fn advance(&mut self, x_scale: f32, screen: Vec2) -> Option<BounceEvent> {
        let x_scale = sanitize_x_scale(x_scale);
        let x_bound = 1.0 / x_scale;

        self.prev_pos = self.pos;
        self.pos += self.vel;

        let bounce_y = self.pos.y.abs() > 1.0;
        if bounce_y {
            self.vel.y = -self.vel.y * BOUNCE_DAMPING;
            self.vel.x *= CROSS_AXIS_DAMPING;
        }

        let bounce_x = (self.pos.x * x_scale).abs() > 1.0;
        if bounce_x {
            self.vel.x = -self.vel.x * BOUNCE_DAMPING;
            self.vel.y *= CROSS_AXIS_DAMPING;
        }

        self.vel.y -= GRAVITY;

        self.pos.y = self.pos.y.clamp(-1.0, 1.0);
        if bounce_x {
            self.pos.x = x_bound.copysign(self.pos.x);
        }

        self.age += 1;

        if !(bounce_x || bounce_y) {
            return None;
        }

        let d = self.displacement();
        let (axis, displacement) = if bounce_y {
            (BounceAxis::Vertical, d.y)
        } else {
            (BounceAxis::Horizontal, d.x)
        };

        Some(BounceEvent {
            axis,
            corner: bounce_x && bounce_y,
            displacement,
            volume: bounce_volume(displacement),
            pixel: world_to_pixel(self.pos, screen),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SCREEN: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn test_free_flight_has_no_bounce() {
        let mut p = Projectile::new(Vec2::ZERO, 0.0, 0.01);
        let event = p.advance(1.0, SCREEN);
        assert!(event.is_none());
        assert_eq!(p.age, 1);
        assert!((p.pos.x - 0.01).abs() < 1e-7);
        assert!((p.vel.y + GRAVITY).abs() < 1e-9);
    }

    #[test]
    fn test_floor_bounce_damps_and_clamps() {
        let mut p = Projectile::new(Vec2::new(0.0, -0.99), 0.0, 0.0);
        p.vel = Vec2::new(0.01, -0.05);

        let event = p.advance(1.0, SCREEN).expect("floor bounce");
        assert_eq!(event.axis, BounceAxis::Vertical);
        assert!(!event.corner);
        assert_eq!(p.pos.y, -1.0);
        assert!((p.vel.y - (0.05 * 0.9 - GRAVITY)).abs() < 1e-7);
        assert!((p.vel.x - 0.01 * 0.98).abs() < 1e-7);

        // Clamped displacement is -0.01, so loudness is 0.1
        assert!((event.displacement + 0.01).abs() < 1e-6);
        assert!((event.volume - 0.1).abs() < 1e-5);
        assert!((event.pixel.x - (400.0 + p.pos.x * 400.0)).abs() < 1e-3);
        assert_eq!(event.pixel.y, 600.0);
    }

    #[test]
    fn test_wall_bounce_respects_x_scale() {
        // Bound on x is 1 / 0.5 = 2.0
        let mut p = Projectile::new(Vec2::new(1.95, 0.0), 0.0, 0.1);

        let event = p.advance(0.5, SCREEN).expect("wall bounce");
        assert_eq!(event.axis, BounceAxis::Horizontal);
        assert_eq!(p.pos.x, 2.0);
        assert!(p.vel.x < 0.0);
        assert!((p.vel.x + 0.09).abs() < 1e-7);

        // Would be out of bounds at x_scale 1.0, but not here
        let mut inside = Projectile::new(Vec2::new(1.5, 0.0), 0.0, 0.01);
        assert!(inside.advance(0.5, SCREEN).is_none());
    }

    #[test]
    fn test_corner_bounce_emits_single_vertical_event() {
        let mut p = Projectile::new(Vec2::new(0.99, 0.99), 0.0, 0.0);
        p.vel = Vec2::new(0.05, 0.03);

        let event = p.advance(1.0, SCREEN).expect("corner bounce");
        assert!(event.corner);
        assert_eq!(event.axis, BounceAxis::Vertical);
        assert_eq!(p.pos, Vec2::new(1.0, 1.0));
        // Struck axis uses d.y = 0.01
        assert!((event.volume - 0.1).abs() < 1e-5);
        assert!(p.vel.x < 0.0 && p.vel.y < 0.0);
    }

    #[test]
    fn test_loud_impact_is_capped() {
        let mut p = Projectile::new(Vec2::new(0.0, -0.5), 0.0, 0.0);
        p.vel = Vec2::new(0.0, -0.6);
        let event = p.advance(1.0, SCREEN).expect("hard bounce");
        assert_eq!(event.volume, MAX_BOUNCE_VOLUME);
    }

    #[test]
    fn test_invalid_x_scale_falls_back() {
        let mut p = Projectile::new(Vec2::new(0.9, 0.0), 0.0, 0.2);
        let event = p.advance(0.0, SCREEN).expect("bound of 1.0 applies");
        assert_eq!(event.axis, BounceAxis::Horizontal);
        assert_eq!(p.pos.x, 1.0);
    }

    #[test]
    fn test_heading_follows_velocity() {
        let p = Projectile::new(Vec2::ZERO, 1.0, 0.03);
        assert!((p.heading() - 1.0).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_position_stays_in_bounds(
            x in -1.0f32..1.0,
            y in -1.0f32..1.0,
            dir in -3.2f32..3.2,
            speed in 0.0f32..0.5,
            x_scale in 0.2f32..2.0,
            ticks in 1usize..400,
        ) {
            let mut p = Projectile::new(Vec2::new(x / x_scale, y), dir, speed);
            for _ in 0..ticks {
                p.advance(x_scale, SCREEN);
                prop_assert!(p.pos.y.abs() <= 1.0);
                prop_assert!((p.pos.x * x_scale).abs() <= 1.0 + 1e-5);
            }
        }

        #[test]
        fn prop_bounce_reduces_struck_axis_speed(
            vy in 0.01f32..0.5,
            vx in -0.01f32..0.01,
        ) {
            let mut p = Projectile::new(Vec2::new(0.0, 0.9999), 0.0, 0.0);
            p.vel = Vec2::new(vx, vy);
            let before = p.vel.y.abs();
            let event = p.advance(1.0, SCREEN);
            prop_assert!(event.is_some());
            // Undo gravity to isolate the bounce response
            let after = (p.vel.y + GRAVITY).abs();
            prop_assert!(after < before);
        }
    }
}
