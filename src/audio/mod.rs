//! Audio system
//!
//! Positioned bounce/fire effects and cross-faded background music, routed
//! through one shared mix bus (compressor, then master gain). The host audio
//! graph sits behind `AudioBackend`: Web Audio in the browser, a recording
//! clock natively.
//!
//! Browsers only allow audio after a user gesture, so the subsystem starts
//! `Uninitialized` and queues sounds until a backend is attached. A request
//! to start music is remembered separately and never evicted by sounds.

pub mod envelope;
pub mod headless;
pub mod music;
pub mod spatial;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use thiserror::Error;

pub use envelope::{Automation, GainEnvelope};
pub use headless::{HeadlessBackend, HeadlessTrack};
pub use music::{MusicConfig, MusicPhase, MusicScheduler, TrackSignal};
pub use spatial::{PannerConfig, SpatialAudioPlayer, Voice};

use crate::settings::Settings;

/// Sounds held while audio is not yet available
pub const MAX_QUEUED_REQUESTS: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// A sample or track could not be fetched or decoded
    #[error("Audio asset '{name}' unavailable: {reason}")]
    AssetUnavailable { name: String, reason: String },

    /// The host audio graph rejected an operation
    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("No music tracks loaded")]
    NoTracks,
}

/// A sound to play: loudness and where on screen it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioEvent {
    pub volume: f32,
    /// Screen pixels; None = screen centre
    pub position: Option<Vec2>,
}

/// Shared compressor settings in front of the master gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixBusConfig {
    pub ratio: f32,
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub release: f32,
}

impl Default for MixBusConfig {
    fn default() -> Self {
        Self {
            ratio: 20.0,
            attack: 1.0,
            release: 1.0,
        }
    }
}

/// The host audio graph
pub trait AudioBackend {
    /// Audio clock, seconds
    fn current_time(&self) -> f64;

    fn set_listener(&mut self, position: Vec3);

    /// Gain after the compressor
    fn set_master_gain(&mut self, gain: f32);

    /// Start one voice immediately; the host drops it when the sample ends
    fn play_voice(&mut self, voice: &Voice) -> Result<(), AudioError>;

    fn track_count(&self) -> usize;

    /// Start a music track from the beginning, returning its duration if known
    fn start_track(&mut self, index: usize) -> Result<Option<f64>, AudioError>;

    fn stop_track(&mut self, index: usize);

    /// Replace future music bus automation with `envelope`
    fn schedule_music_gain(&mut self, envelope: &GainEnvelope) -> Result<(), AudioError>;

    /// Completion signals received since the last call
    fn drain_signals(&mut self) -> Vec<TrackSignal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// Waiting for a user gesture / asset load; requests are queued
    Uninitialized,
    Ready,
    /// Initialization failed; everything is a no-op
    Silent,
}

/// Owns the backend and routes game events into it
pub struct AudioSubsystem<B: AudioBackend> {
    state: AudioState,
    backend: Option<B>,
    player: SpatialAudioPlayer,
    music: MusicScheduler,
    queue: VecDeque<AudioEvent>,
    /// `start_music` was called before a backend was attached
    music_requested: bool,
    master_gain: f32,
}

impl<B: AudioBackend> AudioSubsystem<B> {
    pub fn new(settings: &Settings, screen: Vec2, seed: u64) -> Self {
        let mut player = SpatialAudioPlayer::new(screen);
        player.set_sfx_gain(settings.effective_sfx_gain());
        Self {
            state: AudioState::Uninitialized,
            backend: None,
            player,
            music: MusicScheduler::new(settings.music_config(), seed),
            queue: VecDeque::new(),
            music_requested: false,
            master_gain: settings.mix_bus_gain(),
        }
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn player(&self) -> &SpatialAudioPlayer {
        &self.player
    }

    pub fn music(&self) -> &MusicScheduler {
        &self.music
    }

    /// Number of sounds waiting for initialization
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Music will start as soon as a backend is attached
    pub fn music_pending(&self) -> bool {
        self.music_requested
    }

    /// Attach a ready backend and replay queued requests in order
    pub fn attach(&mut self, mut backend: B) {
        if self.state != AudioState::Uninitialized {
            log::warn!("Audio backend attached twice, ignoring");
            return;
        }
        backend.set_listener(self.player.listener_position());
        backend.set_master_gain(self.master_gain);
        self.backend = Some(backend);
        self.state = AudioState::Ready;
        log::info!("Audio ready ({} queued sounds)", self.queue.len());

        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event);
        }
        if std::mem::take(&mut self.music_requested) {
            self.begin_music();
        }
    }

    /// Initialization failed: degrade to no audio for the rest of the session
    pub fn fail(&mut self, err: AudioError) {
        log::warn!("Audio disabled: {}", err);
        if !self.queue.is_empty() {
            log::info!("Discarding {} queued sounds", self.queue.len());
            self.queue.clear();
        }
        self.music_requested = false;
        self.backend = None;
        self.state = AudioState::Silent;
    }

    /// Play a positioned sound. Non-positive volumes are ignored.
    pub fn trigger(&mut self, volume: f32, position: Option<Vec2>) {
        if volume.is_nan() || volume <= 0.0 {
            return;
        }
        let event = AudioEvent { volume, position };
        match self.state {
            AudioState::Ready => self.dispatch(event),
            AudioState::Uninitialized => {
                if self.queue.len() >= MAX_QUEUED_REQUESTS {
                    if let Some(dropped) = self.queue.pop_front() {
                        log::warn!("Audio queue full, dropping oldest sound {:?}", dropped);
                    }
                }
                self.queue.push_back(event);
            }
            AudioState::Silent => {}
        }
    }

    pub fn play(&mut self, event: AudioEvent) {
        self.trigger(event.volume, event.position);
    }

    /// Begin the background music loop
    pub fn start_music(&mut self) {
        match self.state {
            AudioState::Ready => self.begin_music(),
            AudioState::Uninitialized => self.music_requested = true,
            AudioState::Silent => {}
        }
    }

    fn begin_music(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if let Err(err) = self.music.start(backend) {
            log::warn!("Music failed to start: {}", err);
        }
    }

    fn dispatch(&mut self, event: AudioEvent) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if let Err(err) = self.player.trigger(backend, event.volume, event.position) {
            log::warn!("Sound {:?} failed: {}", event, err);
        }
    }

    /// Feed host completion signals to the music scheduler. Call once per frame.
    pub fn update(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        for signal in backend.drain_signals() {
            if let Err(err) = self.music.handle_signal(backend, signal) {
                log::warn!("Music scheduling failed: {}", err);
            }
        }
        if let Err(err) = self.music.poll(backend) {
            log::warn!("Music scheduling failed: {}", err);
        }
    }

    pub fn set_screen_size(&mut self, screen: Vec2) {
        self.player.set_screen_size(screen);
        if let Some(backend) = self.backend.as_mut() {
            backend.set_listener(self.player.listener_position());
        }
    }

    /// Apply new volume preferences; music fades pick them up on the next track
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.player.set_sfx_gain(settings.effective_sfx_gain());
        self.music.set_config(settings.music_config());
        self.master_gain = settings.mix_bus_gain();
        if let Some(backend) = self.backend.as_mut() {
            backend.set_master_gain(self.master_gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Vec2 = Vec2::new(800.0, 600.0);

    fn subsystem() -> AudioSubsystem<HeadlessBackend> {
        AudioSubsystem::new(&Settings::default(), SCREEN, 3)
    }

    #[test]
    fn test_requests_queue_until_ready() {
        let mut audio = subsystem();
        audio.trigger(0.3, Some(Vec2::new(100.0, 100.0)));
        audio.start_music();
        assert_eq!(audio.state(), AudioState::Uninitialized);
        assert_eq!(audio.queued(), 1);
        assert!(audio.music_pending());

        audio.attach(HeadlessBackend::new(vec![HeadlessTrack::known(30.0)]));
        assert_eq!(audio.state(), AudioState::Ready);
        assert_eq!(audio.queued(), 0);
        assert!(!audio.music_pending());

        let backend = audio.backend().unwrap();
        assert_eq!(backend.voices().len(), 1);
        assert_eq!(backend.started(), &[0]);
        assert_eq!(backend.listener(), Some(Vec3::new(400.0, 300.0, -5.0)));
        assert!((backend.master_gain() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_volume_has_no_side_effect() {
        let mut audio = subsystem();
        audio.trigger(0.0, None);
        audio.trigger(-1.0, None);
        assert_eq!(audio.queued(), 0);

        audio.attach(HeadlessBackend::new(Vec::new()));
        audio.trigger(0.0, Some(Vec2::ZERO));
        audio.trigger(-1.0, Some(Vec2::ZERO));
        let backend = audio.backend().unwrap();
        assert!(backend.voices().is_empty());
        assert!(backend.music_gain().is_empty());
    }

    #[test]
    fn test_queue_is_bounded() {
        let mut audio = subsystem();
        for i in 0..(MAX_QUEUED_REQUESTS + 10) {
            audio.trigger(0.1 + i as f32 * 0.001, None);
        }
        assert_eq!(audio.queued(), MAX_QUEUED_REQUESTS);

        audio.attach(HeadlessBackend::new(Vec::new()));
        let voices = audio.backend().unwrap().voices();
        // The oldest ten were dropped
        assert!((voices[0].gain - (0.1 + 10.0 * 0.001)).abs() < 1e-6);
    }

    #[test]
    fn test_full_queue_keeps_music_request() {
        let mut audio = subsystem();
        audio.start_music();
        for _ in 0..MAX_QUEUED_REQUESTS {
            audio.trigger(0.2, None);
        }
        assert_eq!(audio.queued(), MAX_QUEUED_REQUESTS);

        audio.attach(HeadlessBackend::new(vec![HeadlessTrack::known(30.0)]));
        let backend = audio.backend().unwrap();
        assert_eq!(backend.voices().len(), MAX_QUEUED_REQUESTS);
        assert_eq!(backend.started(), &[0]);
        assert_ne!(audio.music().phase(), MusicPhase::Idle);
    }

    #[test]
    fn test_failed_init_goes_silent() {
        let mut audio = subsystem();
        audio.trigger(0.3, None);
        audio.fail(AudioError::AssetUnavailable {
            name: "bounce.mp3".into(),
            reason: "404".into(),
        });
        assert_eq!(audio.state(), AudioState::Silent);
        assert_eq!(audio.queued(), 0);
        assert!(!audio.music_pending());

        audio.trigger(0.3, None);
        audio.start_music();
        audio.update();
        assert_eq!(audio.queued(), 0);
        assert!(audio.backend().is_none());
    }

    #[test]
    fn test_update_runs_music_loop() {
        let mut audio = subsystem();
        let tracks = vec![HeadlessTrack::known(8.0), HeadlessTrack::known(8.0)];
        audio.attach(HeadlessBackend::new(tracks));
        audio.start_music();

        for _ in 0..100 {
            audio.backend_mut().unwrap().advance(0.25);
            audio.update();
        }

        let started = audio.backend().unwrap().started();
        assert!(started.len() >= 3);
        for pair in started.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_mute_applies_to_effects_and_bus() {
        let mut audio = subsystem();
        audio.attach(HeadlessBackend::new(Vec::new()));

        let mut settings = Settings::default();
        settings.muted = true;
        audio.apply_settings(&settings);
        audio.trigger(0.4, None);

        let backend = audio.backend().unwrap();
        assert!(backend.voices().is_empty());
        assert_eq!(backend.master_gain(), 0.0);
    }
}
