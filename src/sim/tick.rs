//! Fixed-rate world tick
//!
//! One call per presented frame: steer the player, release delayed shots,
//! advance projectiles. Sounds are returned as events, never played here.

use glam::Vec2;

use super::manager::ProjectileManager;
use super::player::Player;
use super::projectile::BounceEvent;
use crate::audio::AudioEvent;
use crate::consts::*;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub turn_left: bool,
    pub turn_right: bool,
    pub forward: bool,
    pub backward: bool,
    /// Fire a projectile (one-shot)
    pub fire: bool,
}

impl TickInput {
    fn thrust(&self) -> f32 {
        match (self.forward, self.backward) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

/// A shot waiting out its launch delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingShot {
    pub pos: Vec2,
    pub direction: f32,
    pub ticks_left: u32,
}

/// Something the audio layer should hear about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A shot was fired; carries the firing sound
    Fired(AudioEvent),
    Bounce(BounceEvent),
}

impl SimEvent {
    pub fn audio(&self) -> AudioEvent {
        match self {
            SimEvent::Fired(event) => *event,
            SimEvent::Bounce(bounce) => bounce.audio(),
        }
    }
}

/// The whole scene
#[derive(Debug, Clone, Default)]
pub struct ArcadeState {
    pub player: Player,
    pub projectiles: ProjectileManager,
    pub pending_shots: Vec<PendingShot>,
    /// Simulation tick counter
    pub time_ticks: u64,
}

impl ArcadeState {
    pub fn new(max_projectiles: Option<usize>) -> Self {
        let mut projectiles = ProjectileManager::unbounded();
        projectiles.set_capacity(max_projectiles);
        Self {
            projectiles,
            ..Default::default()
        }
    }
}

/// Advance the scene by one tick.
///
/// `x_scale` is `height / width` of the viewport and `screen` its pixel size.
pub fn tick(state: &mut ArcadeState, input: &TickInput, x_scale: f32, screen: Vec2) -> Vec<SimEvent> {
    let mut events = Vec::new();
    state.time_ticks += 1;

    state
        .player
        .steer(input.turn_left, input.turn_right, input.thrust(), x_scale);

    // Release shots whose delay has elapsed, in the order they were fired
    let mut i = 0;
    while i < state.pending_shots.len() {
        let shot = &mut state.pending_shots[i];
        shot.ticks_left = shot.ticks_left.saturating_sub(1);
        if shot.ticks_left == 0 {
            let shot = state.pending_shots.remove(i);
            state
                .projectiles
                .spawn(shot.pos.x, shot.pos.y, shot.direction, PROJECTILE_SPEED);
        } else {
            i += 1;
        }
    }

    // Released exactly FIRE_DELAY_TICKS ticks after this one
    if input.fire {
        events.push(SimEvent::Fired(AudioEvent {
            volume: FIRE_VOLUME,
            position: Some(state.player.pixel(x_scale, screen)),
        }));
        state.pending_shots.push(PendingShot {
            pos: state.player.muzzle(),
            direction: state.player.angle,
            ticks_left: FIRE_DELAY_TICKS,
        });
    }

    events.extend(
        state
            .projectiles
            .tick(x_scale, screen)
            .into_iter()
            .map(SimEvent::Bounce),
    );

    events
}
