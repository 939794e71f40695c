//! The steerable sprite that fires projectiles

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Radians turned per tick while a turn key is held
pub const TURN_RATE: f32 = 0.05;
/// World units moved per tick while thrusting
pub const MOVE_SPEED: f32 = 0.03;
/// Muzzle offset in the sprite's local frame (forward, up)
pub const MUZZLE_OFFSET: Vec2 = Vec2::new(0.2, 0.083);
/// The sprite pivots about a point this far below its centre
pub const PIVOT_DROP: f32 = 0.15;
/// Sprite width and height in world units
pub const PLAYER_SIZE: f32 = 0.4;

/// The player sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    /// Heading (radians, 0 = +x)
    pub angle: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            angle: 0.0,
        }
    }
}

impl Player {
    /// Apply one tick of steering. `thrust` is +1 forward, -1 backward, 0 idle.
    pub fn steer(&mut self, turn_left: bool, turn_right: bool, thrust: f32, x_scale: f32) {
        if turn_right {
            self.angle -= TURN_RATE;
        }
        if turn_left {
            self.angle += TURN_RATE;
        }

        let forward = Vec2::new(self.angle.cos(), self.angle.sin());
        self.pos += forward * MOVE_SPEED * thrust.clamp(-1.0, 1.0);

        self.wrap(x_scale);
    }

    /// Leaving one edge re-enters from the opposite one
    fn wrap(&mut self, x_scale: f32) {
        let x_bound = 1.0 / super::projectile::sanitize_x_scale(x_scale);

        if self.pos.y < -1.0 {
            self.pos.y = 1.0;
        } else if self.pos.y > 1.0 {
            self.pos.y = -1.0;
        }
        if self.pos.x > x_bound {
            self.pos.x = -x_bound;
        } else if self.pos.x < -x_bound {
            self.pos.x = x_bound;
        }
    }

    /// Where a projectile fired now would appear
    pub fn muzzle(&self) -> Vec2 {
        let (sin, cos) = self.angle.sin_cos();
        Vec2::new(
            self.pos.x + MUZZLE_OFFSET.x * cos - MUZZLE_OFFSET.y * sin,
            self.pos.y - PIVOT_DROP + MUZZLE_OFFSET.y * cos + MUZZLE_OFFSET.x * sin,
        )
    }

    /// Player position in screen pixels, accounting for the viewport squeeze
    pub fn pixel(&self, x_scale: f32, screen: Vec2) -> Vec2 {
        crate::world_to_pixel(Vec2::new(self.pos.x * x_scale, self.pos.y), screen)
    }
}
