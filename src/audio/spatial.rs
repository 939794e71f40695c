//! Positioned one-shot sound effects
//!
//! Every trigger builds an independent voice: the bounce sample, a panner
//! placed at the event's screen position, and a short exponential attack.
//! Voices are never pooled or stolen; the host discards them when the
//! sample finishes.

use glam::{Vec2, Vec3};

use super::envelope::GainEnvelope;
use super::{AudioBackend, AudioError};

/// Starting gain of every voice (exponential ramps cannot start at zero)
pub const VOICE_GAIN_FLOOR: f32 = 1e-4;
/// Attack window of every voice
pub const VOICE_ATTACK_SECS: f64 = 0.03;
/// How far in front of the screen plane the listener sits
pub const LISTENER_DEPTH: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanningModel {
    EqualPower,
    #[default]
    Hrtf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceModel {
    #[default]
    Linear,
    Inverse,
    Exponential,
}

/// Panner parameters shared by every voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PannerConfig {
    pub panning_model: PanningModel,
    pub distance_model: DistanceModel,
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    /// Full-gain cone, degrees
    pub cone_inner_angle: f32,
    /// Attenuated cone, degrees
    pub cone_outer_angle: f32,
    pub cone_outer_gain: f32,
    /// Direction the source faces
    pub orientation: Vec3,
}

impl Default for PannerConfig {
    fn default() -> Self {
        Self {
            panning_model: PanningModel::Hrtf,
            distance_model: DistanceModel::Linear,
            ref_distance: 1.0,
            max_distance: 10_000.0,
            rolloff_factor: 50.0,
            cone_inner_angle: 60.0,
            cone_outer_angle: 90.0,
            cone_outer_gain: 0.4,
            orientation: Vec3::new(0.0, 0.0, -1.0),
        }
    }
}

impl PannerConfig {
    /// Distance attenuation, following the Web Audio formulas.
    ///
    /// The linear model clamps the rolloff factor into [0, 1].
    pub fn distance_gain(&self, distance: f32) -> f32 {
        let d_ref = self.ref_distance.max(0.0);
        match self.distance_model {
            DistanceModel::Linear => {
                let d_max = self.max_distance.max(d_ref);
                if d_max <= d_ref {
                    return 1.0;
                }
                let rolloff = self.rolloff_factor.clamp(0.0, 1.0);
                let d = distance.clamp(d_ref, d_max);
                1.0 - rolloff * (d - d_ref) / (d_max - d_ref)
            }
            DistanceModel::Inverse => {
                if d_ref <= 0.0 {
                    return 1.0;
                }
                let d = distance.max(d_ref);
                d_ref / (d_ref + self.rolloff_factor.max(0.0) * (d - d_ref))
            }
            DistanceModel::Exponential => {
                if d_ref <= 0.0 {
                    return 1.0;
                }
                let d = distance.max(d_ref);
                (d / d_ref).powf(-self.rolloff_factor.max(0.0))
            }
        }
    }

    /// Directional attenuation for a source at `source` heard from `listener`
    pub fn cone_gain(&self, source: Vec3, listener: Vec3) -> f32 {
        if self.cone_inner_angle >= 360.0 && self.cone_outer_angle >= 360.0 {
            return 1.0;
        }
        let facing = self.orientation.normalize_or_zero();
        let to_listener = (listener - source).normalize_or_zero();
        if facing == Vec3::ZERO || to_listener == Vec3::ZERO {
            return 1.0;
        }

        let angle = facing.dot(to_listener).clamp(-1.0, 1.0).acos().to_degrees();
        let inner = self.cone_inner_angle / 2.0;
        let outer = self.cone_outer_angle / 2.0;

        if angle <= inner {
            1.0
        } else if angle >= outer {
            self.cone_outer_gain
        } else {
            let x = (angle - inner) / (outer - inner);
            1.0 + (self.cone_outer_gain - 1.0) * x
        }
    }

    /// Combined distance and cone gain
    pub fn gain_towards(&self, source: Vec3, listener: Vec3) -> f32 {
        self.distance_gain(source.distance(listener)) * self.cone_gain(source, listener)
    }
}

/// One scheduled playback of the bounce sample
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    /// Source position in the audio scene (screen pixels, z = 0)
    pub position: Vec3,
    pub panner: PannerConfig,
    pub envelope: GainEnvelope,
    /// Gain reached at the end of the attack
    pub gain: f32,
}

/// Builds and schedules positioned one-shot voices
#[derive(Debug, Clone)]
pub struct SpatialAudioPlayer {
    screen: Vec2,
    panner: PannerConfig,
    sfx_gain: f32,
}

impl SpatialAudioPlayer {
    pub fn new(screen: Vec2) -> Self {
        Self {
            screen,
            panner: PannerConfig::default(),
            sfx_gain: 1.0,
        }
    }

    pub fn set_screen_size(&mut self, screen: Vec2) {
        self.screen = screen;
    }

    pub fn screen(&self) -> Vec2 {
        self.screen
    }

    /// Effect volume multiplier (0 = muted)
    pub fn set_sfx_gain(&mut self, gain: f32) {
        self.sfx_gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_panner(&mut self, panner: PannerConfig) {
        self.panner = panner;
    }

    pub fn panner(&self) -> &PannerConfig {
        &self.panner
    }

    /// Listener sits at screen centre, in front of the screen
    pub fn listener_position(&self) -> Vec3 {
        Vec3::new(self.screen.x / 2.0, self.screen.y / 2.0, -LISTENER_DEPTH)
    }

    /// Describe the voice a trigger would play at audio time `now`.
    ///
    /// Returns None when nothing would be audible.
    pub fn voice_for(&self, volume: f32, position: Option<Vec2>, now: f64) -> Option<Voice> {
        if volume.is_nan() || volume <= 0.0 {
            return None;
        }
        let gain = volume * self.sfx_gain;
        if gain <= 0.0 {
            return None;
        }

        let pixel = position.unwrap_or(self.screen / 2.0);
        Some(Voice {
            position: pixel.extend(0.0),
            panner: self.panner,
            envelope: GainEnvelope::attack(VOICE_GAIN_FLOOR, gain, now, VOICE_ATTACK_SECS),
            gain,
        })
    }

    /// Play one positioned sound. Returns whether a voice was started.
    pub fn trigger<B: AudioBackend + ?Sized>(
        &self,
        backend: &mut B,
        volume: f32,
        position: Option<Vec2>,
    ) -> Result<bool, AudioError> {
        let Some(voice) = self.voice_for(volume, position, backend.current_time()) else {
            return Ok(false);
        };
        log::debug!(
            "Voice at ({:.0}, {:.0}) gain {:.3}, spatial {:.3}",
            voice.position.x,
            voice.position.y,
            voice.gain,
            self.panner.gain_towards(voice.position, self.listener_position())
        );
        backend.play_voice(&voice)?;
        Ok(true)
    }
}
