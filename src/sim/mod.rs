//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (one tick per frame, no dt)
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies; sounds leave as `AudioEvent` data

pub mod manager;
pub mod player;
pub mod projectile;
pub mod tick;

pub use manager::{ProjectileManager, ProjectileView};
pub use player::Player;
pub use projectile::{BounceAxis, BounceEvent, Projectile, bounce_volume};
pub use tick::{ArcadeState, PendingShot, SimEvent, TickInput, tick};
