//! Background music cross-fade scheduler
//!
//! Tracks are interchangeable. Each cycle picks a random track other than the
//! previous one, fades it in, holds it, and fades it out so the fade ends
//! exactly when the track does. Completion of a track starts the next cycle.
//!
//! The fade-out can only be scheduled once the track duration is known. When
//! the host reports it late, the scheduler waits in `FadingIn`, bounded by
//! `MusicConfig::metadata_timeout`.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::envelope::GainEnvelope;
use super::{AudioBackend, AudioError};

/// Extra time past a track's expected end before it is treated as finished
const ENDED_GRACE_SECS: f64 = 1.0;
/// Selections remembered for inspection
const HISTORY_LEN: usize = 32;

/// Completion signals reported by the host audio system
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackSignal {
    /// Track metadata loaded; duration in seconds
    DurationKnown { track: usize, duration: f64 },
    /// Track playback reached its end
    Ended { track: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicPhase {
    Idle,
    Selecting,
    FadingIn,
    Playing,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicConfig {
    /// Fade in/out window in seconds
    pub fade_secs: f64,
    /// Longest wait for a track's duration before skipping it
    pub metadata_timeout_secs: f64,
    /// Music bus gain while a track is fully faded in
    pub gain: f32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            fade_secs: 3.0,
            metadata_timeout_secs: 10.0,
            gain: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CurrentTrack {
    index: usize,
    started_at: f64,
    duration: Option<f64>,
    /// Fade-in length scheduled when the track started
    fade_in_secs: f64,
}

impl CurrentTrack {
    fn fade_window(&self, fade_secs: f64) -> f64 {
        match self.duration {
            Some(d) => fade_secs.min(d / 2.0).max(0.0),
            None => fade_secs.max(0.0),
        }
    }

    fn ends_at(&self) -> Option<f64> {
        self.duration.map(|d| self.started_at + d)
    }
}

/// Picks, fades in, and fades out background tracks
#[derive(Debug, Clone)]
pub struct MusicScheduler {
    config: MusicConfig,
    phase: MusicPhase,
    current: Option<CurrentTrack>,
    previous: Option<usize>,
    rng: Pcg32,
    history: VecDeque<usize>,
}

impl MusicScheduler {
    pub fn new(config: MusicConfig, seed: u64) -> Self {
        Self {
            config,
            phase: MusicPhase::Idle,
            current: None,
            previous: None,
            rng: Pcg32::seed_from_u64(seed),
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn phase(&self) -> MusicPhase {
        self.phase
    }

    /// Index of the track currently playing
    pub fn current(&self) -> Option<usize> {
        self.current.map(|c| c.index)
    }

    /// Recent selections, oldest first
    pub fn history(&self) -> impl Iterator<Item = usize> + '_ {
        self.history.iter().copied()
    }

    pub fn config(&self) -> &MusicConfig {
        &self.config
    }

    /// Applies from the next scheduled fade on
    pub fn set_config(&mut self, config: MusicConfig) {
        self.config = config;
    }

    /// Start the first cycle. Does nothing if music is already running.
    pub fn start<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), AudioError> {
        if self.phase != MusicPhase::Idle {
            return Ok(());
        }
        self.play_next(backend)
    }

    /// Pick a track uniformly at random, excluding the previous one
    fn select(&mut self, count: usize) -> Option<usize> {
        match (count, self.previous) {
            (0, _) => None,
            (1, _) => Some(0),
            (n, Some(prev)) if prev < n => {
                let k = self.rng.random_range(0..n - 1);
                Some(if k >= prev { k + 1 } else { k })
            }
            (n, _) => Some(self.rng.random_range(0..n)),
        }
    }

    /// Selecting: choose and start the next track.
    ///
    /// Tracks that fail to start are skipped; each track is tried at most once.
    fn play_next<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), AudioError> {
        self.phase = MusicPhase::Selecting;
        self.current = None;

        let count = backend.track_count();
        let mut last_err = AudioError::NoTracks;
        for _ in 0..count {
            let Some(index) = self.select(count) else {
                break;
            };
            self.previous = Some(index);
            if self.history.len() == HISTORY_LEN {
                self.history.pop_front();
            }
            self.history.push_back(index);

            match self.begin_track(backend, index) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log::warn!("Music track {} failed to start: {}", index, err);
                    last_err = err;
                }
            }
        }

        self.phase = MusicPhase::Idle;
        Err(last_err)
    }

    /// Fading-in: start playback and the fade-in ramp
    fn begin_track<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        index: usize,
    ) -> Result<(), AudioError> {
        let started_at = backend.current_time();
        let duration = backend.start_track(index)?.filter(|d| d.is_finite() && *d > 0.0);

        let mut track = CurrentTrack {
            index,
            started_at,
            duration,
            fade_in_secs: 0.0,
        };
        let fade = track.fade_window(self.config.fade_secs);
        track.fade_in_secs = fade;
        let mut envelope = GainEnvelope::fade_in(self.config.gain, started_at, fade);
        if let Some(end) = track.ends_at() {
            envelope = envelope.then(GainEnvelope::fade_out(self.config.gain, end, fade));
        }
        if let Err(err) = backend.schedule_music_gain(&envelope) {
            backend.stop_track(index);
            return Err(err);
        }

        log::info!(
            "Music track {} started (duration {})",
            index,
            duration.map_or_else(|| "pending".to_string(), |d| format!("{:.1}s", d))
        );

        self.current = Some(track);
        self.phase = MusicPhase::FadingIn;
        Ok(())
    }

    /// Duration arrived after playback started: schedule the fade-out now
    fn on_duration<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        duration: f64,
    ) -> Result<(), AudioError> {
        let Some(track) = self.current.as_mut() else {
            return Ok(());
        };
        if track.duration.is_some() || !(duration.is_finite() && duration > 0.0) {
            return Ok(());
        }
        track.duration = Some(duration);
        let track = *track;

        let fade = track.fade_window(self.config.fade_secs);
        let end = track.started_at + duration;
        let now = backend.current_time();
        let fade_start = (end - fade).max(now);
        if fade_start < end {
            // Continue from wherever the fade-in has reached
            let level = GainEnvelope::fade_in(self.config.gain, track.started_at, track.fade_in_secs)
                .value_at(fade_start, 0.0);
            let envelope = GainEnvelope::new()
                .set(level, fade_start)
                .linear_to(0.0, end);
            backend.schedule_music_gain(&envelope)?;
        }
        log::debug!("Music track {} duration {:.1}s", track.index, duration);
        Ok(())
    }

    /// Feed one host signal. Signals for tracks other than the current one are ignored.
    pub fn handle_signal<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        signal: TrackSignal,
    ) -> Result<(), AudioError> {
        let Some(current) = self.current else {
            return Ok(());
        };
        match signal {
            TrackSignal::DurationKnown { track, duration } if track == current.index => {
                self.on_duration(backend, duration)?;
                self.poll(backend)
            }
            TrackSignal::Ended { track } if track == current.index => {
                log::debug!("Music track {} ended", track);
                self.play_next(backend)
            }
            _ => Ok(()),
        }
    }

    /// Advance time-driven transitions and enforce the metadata timeout
    pub fn poll<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), AudioError> {
        let Some(track) = self.current else {
            return Ok(());
        };
        let now = backend.current_time();
        let elapsed = now - track.started_at;

        let Some(duration) = track.duration else {
            if elapsed >= self.config.metadata_timeout_secs {
                log::warn!(
                    "Music track {} duration unknown after {:.1}s, skipping",
                    track.index,
                    elapsed
                );
                backend.stop_track(track.index);
                return self.play_next(backend);
            }
            self.phase = MusicPhase::FadingIn;
            return Ok(());
        };

        let fade = track.fade_window(self.config.fade_secs);
        if elapsed >= duration + ENDED_GRACE_SECS {
            log::debug!("Music track {} overran without ending", track.index);
            backend.stop_track(track.index);
            return self.play_next(backend);
        }
        self.phase = if elapsed < fade {
            MusicPhase::FadingIn
        } else if elapsed < duration - fade {
            MusicPhase::Playing
        } else {
            MusicPhase::FadingOut
        };
        Ok(())
    }
}
