//! Bounce Shot - a steerable sprite firing projectiles that bounce around the screen
//!
//! Core modules:
//! - `sim`: Deterministic simulation (projectile physics, player, world tick)
//! - `audio`: Event-driven spatial audio and background music scheduling
//! - `renderer`: WebGPU rendering of the player and projectiles
//! - `settings`: Persisted volume and resource preferences

pub mod audio;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use settings::Settings;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Simulation ticks per second (one tick per presented frame)
    pub const TICK_RATE: u32 = 60;

    /// Downward acceleration applied to every projectile each tick
    pub const GRAVITY: f32 = 0.0002;
    /// Velocity retained on the struck axis after a bounce (sign is flipped)
    pub const BOUNCE_DAMPING: f32 = 0.9;
    /// Velocity retained on the other axis after a bounce
    pub const CROSS_AXIS_DAMPING: f32 = 0.98;

    /// Bounce loudness per unit of displacement on the struck axis
    pub const BOUNCE_VOLUME_SCALE: f32 = 10.0;
    /// Loudest a single bounce may ever be
    pub const MAX_BOUNCE_VOLUME: f32 = 0.4;

    /// Projectiles younger than this are never considered at rest
    pub const REST_AGE_TICKS: u32 = 200;
    /// Per-tick displacement below which a projectile is at rest
    pub const REST_EPSILON: f32 = 1e-6;

    /// Default muzzle speed (world units per tick)
    pub const PROJECTILE_SPEED: f32 = 0.03;
    /// Default cap on live projectiles
    pub const MAX_PROJECTILES: usize = 256;

    /// Volume of the firing sound
    pub const FIRE_VOLUME: f32 = 0.3;
    /// Delay between the firing sound and the projectile appearing (100 ms)
    pub const FIRE_DELAY_TICKS: u32 = 6;
}

/// Map a world position to screen pixels.
///
/// World y spans [-1, 1] bottom to top; pixel y grows downward.
#[inline]
pub fn world_to_pixel(pos: Vec2, screen: Vec2) -> Vec2 {
    Vec2::new(
        (pos.x * screen.x) / 2.0 + screen.x / 2.0,
        (1.0 - (pos.y + 1.0) * 0.5) * screen.y,
    )
}

/// Horizontal correction factor for a non-square viewport (height / width)
#[inline]
pub fn x_scale_for(width: f32, height: f32) -> f32 {
    if width > 0.0 && height > 0.0 {
        height / width
    } else {
        1.0
    }
}
