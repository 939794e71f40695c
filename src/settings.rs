//! Player settings and preferences
//!
//! Persisted in LocalStorage on the web; defaults on native.

use serde::{Deserialize, Serialize};

use crate::audio::MusicConfig;
use crate::consts::MAX_PROJECTILES;

/// Shortest wait for track metadata; anything less skips tracks before they load
pub const MIN_METADATA_TIMEOUT_SECS: f64 = 1.0;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Audio ===
    /// Master volume (0.0 - 1.0), applied after the compressor
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    /// Silence everything
    pub muted: bool,
    /// Mute when window loses focus
    pub mute_on_blur: bool,
    /// Music fade in/out window (seconds)
    pub music_fade_secs: f64,
    /// Give up on a track whose duration is unknown after this long (seconds)
    pub metadata_timeout_secs: f64,

    // === Simulation ===
    /// Live projectile cap (None = unbounded)
    pub max_projectiles: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Audio
            master_volume: 0.8,
            sfx_volume: 1.0,
            music_volume: 0.7,
            muted: false,
            mute_on_blur: true,
            music_fade_secs: 3.0,
            metadata_timeout_secs: 10.0,

            // Simulation
            max_projectiles: Some(MAX_PROJECTILES),
        }
    }
}

impl Settings {
    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Set music volume (0.0 - 1.0)
    pub fn set_music_volume(&mut self, vol: f32) {
        self.music_volume = vol.clamp(0.0, 1.0);
    }

    /// Multiplier on every effect voice
    pub fn effective_sfx_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.sfx_volume.clamp(0.0, 1.0)
        }
    }

    /// Music bus gain while a track is fully faded in
    pub fn effective_music_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.music_volume.clamp(0.0, 1.0)
        }
    }

    /// Gain after the compressor, shared by effects and music
    pub fn mix_bus_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume.clamp(0.0, 1.0)
        }
    }

    pub fn music_config(&self) -> MusicConfig {
        MusicConfig {
            fade_secs: self.music_fade_secs.max(0.0),
            metadata_timeout_secs: self.metadata_timeout_secs.max(MIN_METADATA_TIMEOUT_SECS),
            gain: self.effective_music_gain(),
        }
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "bounce_shot_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let mut settings = Settings::default();
        settings.set_master_volume(1.5);
        settings.set_sfx_volume(-0.2);
        settings.set_music_volume(0.25);
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.sfx_volume, 0.0);
        assert_eq!(settings.music_volume, 0.25);
    }

    #[test]
    fn test_mute_zeroes_every_gain() {
        let settings = Settings {
            muted: true,
            ..Default::default()
        };
        assert_eq!(settings.effective_sfx_gain(), 0.0);
        assert_eq!(settings.effective_music_gain(), 0.0);
        assert_eq!(settings.mix_bus_gain(), 0.0);
        assert_eq!(settings.music_config().gain, 0.0);
    }

    #[test]
    fn test_metadata_timeout_has_floor() {
        let settings = Settings {
            metadata_timeout_secs: 0.0,
            ..Default::default()
        };
        assert_eq!(
            settings.music_config().metadata_timeout_secs,
            MIN_METADATA_TIMEOUT_SECS
        );

        let nan = Settings {
            metadata_timeout_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan.music_config().metadata_timeout_secs, MIN_METADATA_TIMEOUT_SECS);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"music_volume":0.5}"#).unwrap();
        assert_eq!(settings.music_volume, 0.5);
        assert_eq!(settings.master_volume, 0.8);
        assert_eq!(settings.max_projectiles, Some(MAX_PROJECTILES));
    }

    #[test]
    fn test_round_trip_json() {
        let mut original = Settings::default();
        original.max_projectiles = None;
        original.music_fade_secs = 5.0;
        let json = serde_json::to_string(&original).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(original, loaded);
    }
}
