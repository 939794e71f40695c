//! Sprite instances for the player and projectiles
//!
//! Each sprite is the unit square scaled to its half-extent, rotated, then
//! translated. The aspect correction `screen_scale` is applied on the GPU.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::sim::player::{PIVOT_DROP, PLAYER_SIZE};
use crate::sim::{ArcadeState, Player, ProjectileView};

/// Projectile sprite half-extent (world units)
pub const PROJECTILE_HALF_SIZE: f32 = 0.012;

/// Colors for game elements
pub mod colors {
    pub const PLAYER: [f32; 4] = [0.2, 0.8, 0.4, 1.0];
    pub const PROJECTILE: [f32; 4] = [1.0, 0.85, 0.3, 1.0];
    pub const BACKGROUND: [f32; 4] = [0.02, 0.02, 0.05, 1.0];
}

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x4,
    1 => Float32x4,
    2 => Float32x4,
    3 => Float32x4,
    4 => Float32x4,
];

/// Per-instance data (must match shader)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl SpriteInstance {
    pub fn new(model: Mat4, color: [f32; 4]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color,
        }
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        }
    }
}

/// Aspect correction applied after all model transforms
pub fn screen_scale(x_scale: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(x_scale, 1.0, 1.0))
}

/// Rotation about the z axis through `pivot`
pub fn rotate_about(pivot: Vec2, angle: f32) -> Mat4 {
    let pivot = pivot.extend(0.0);
    Mat4::from_translation(pivot) * Mat4::from_rotation_z(angle) * Mat4::from_translation(-pivot)
}

fn half_extent(half: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(half, half, 1.0))
}

/// Projectile sprite, rotated to its heading
pub fn projectile_sprite(view: &ProjectileView) -> SpriteInstance {
    let model = Mat4::from_translation(view.pos.extend(0.0))
        * Mat4::from_rotation_z(view.heading)
        * half_extent(PROJECTILE_HALF_SIZE);
    SpriteInstance::new(model, colors::PROJECTILE)
}

/// Player sprite; turns about a point below its centre
pub fn player_sprite(player: &Player) -> SpriteInstance {
    let model = Mat4::from_translation(player.pos.extend(0.0))
        * rotate_about(Vec2::new(0.0, -PIVOT_DROP), player.angle)
        * half_extent(PLAYER_SIZE / 2.0);
    SpriteInstance::new(model, colors::PLAYER)
}

/// Every sprite for one frame: player first, then projectiles in spawn order
pub fn scene(state: &ArcadeState) -> Vec<SpriteInstance> {
    let mut sprites = Vec::with_capacity(state.projectiles.len() + 1);
    sprites.push(player_sprite(&state.player));
    sprites.extend(state.projectiles.render_all().map(|view| projectile_sprite(&view)));
    sprites
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    /// What the vertex shader computes for the four corners
    fn clip_corners(sprite: &SpriteInstance, x_scale: f32) -> [Vec2; 4] {
        let m = screen_scale(x_scale) * sprite.model();
        [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
            .map(|(x, y)| m.transform_point3(Vec3::new(x, y, 0.0)).truncate())
    }

    fn centre(sprite: &SpriteInstance, x_scale: f32) -> Vec2 {
        let corners = clip_corners(sprite, x_scale);
        corners.iter().copied().sum::<Vec2>() / 4.0
    }

    fn x_extent(sprite: &SpriteInstance, x_scale: f32) -> f32 {
        let xs = clip_corners(sprite, x_scale).map(|c| c.x);
        xs.iter().copied().fold(f32::MIN, f32::max) - xs.iter().copied().fold(f32::MAX, f32::min)
    }

    #[test]
    fn test_screen_scale_squeezes_x() {
        let sprite = projectile_sprite(&ProjectileView {
            pos: Vec2::ZERO,
            heading: 0.0,
        });
        assert!((x_extent(&sprite, 1.0) - 2.0 * PROJECTILE_HALF_SIZE).abs() < 1e-6);
        assert!((x_extent(&sprite, 0.5) - PROJECTILE_HALF_SIZE).abs() < 1e-6);
    }

    #[test]
    fn test_projectile_is_centred_on_position() {
        let sprite = projectile_sprite(&ProjectileView {
            pos: Vec2::new(0.4, -0.3),
            heading: 1.1,
        });
        let c = centre(&sprite, 0.75);
        assert!((c.x - 0.4 * 0.75).abs() < 1e-5);
        assert!((c.y + 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_rotate_about_keeps_pivot_fixed() {
        let pivot = Vec2::new(0.0, -PIVOT_DROP);
        let p = rotate_about(pivot, FRAC_PI_2).transform_point3(pivot.extend(0.0));
        assert!((p.truncate() - pivot).length() < 1e-6);
    }

    #[test]
    fn test_player_turns_about_pivot() {
        let player = Player {
            pos: Vec2::ZERO,
            angle: PI,
        };
        // Half a turn about (0, -0.15) moves the centre to (0, -0.3)
        let c = centre(&player_sprite(&player), 1.0);
        assert!(c.x.abs() < 1e-5);
        assert!((c.y + 2.0 * PIVOT_DROP).abs() < 1e-5);
    }

    #[test]
    fn test_scene_has_one_sprite_each() {
        let mut state = ArcadeState::new(None);
        state.projectiles.spawn(0.0, 0.0, 0.0, 0.03);
        state.projectiles.spawn(0.5, 0.5, PI, 0.03);
        let sprites = scene(&state);
        assert_eq!(sprites.len(), 3);
        assert_eq!(sprites[0].color, colors::PLAYER);
        assert_eq!(sprites[1].color, colors::PROJECTILE);
        assert_eq!(sprites[2].model().w_axis.x, 0.5);
    }

    #[test]
    fn test_instance_layout_matches_struct() {
        assert_eq!(std::mem::size_of::<SpriteInstance>(), 80);
        assert_eq!(SpriteInstance::layout().array_stride, 80);
    }
}
