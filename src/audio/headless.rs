//! Audio backend without an audio device
//!
//! Keeps its own clock and records everything it is asked to play. Drives the
//! native demo, and stands in for the browser in tests.

use glam::Vec3;

use super::envelope::GainEnvelope;
use super::music::TrackSignal;
use super::spatial::Voice;
use super::{AudioBackend, AudioError};

/// When a track's duration becomes known after it starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetadataTiming {
    Immediate,
    After(f64),
    Never,
}

/// A simulated music track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessTrack {
    pub duration: f64,
    pub metadata: MetadataTiming,
    /// Starting the track fails as if the asset were missing
    pub broken: bool,
}

impl HeadlessTrack {
    pub fn known(duration: f64) -> Self {
        Self {
            duration,
            metadata: MetadataTiming::Immediate,
            broken: false,
        }
    }

    pub fn delayed(duration: f64, delay: f64) -> Self {
        Self {
            metadata: MetadataTiming::After(delay),
            ..Self::known(duration)
        }
    }

    /// Metadata never loads; playback never reports an end either
    pub fn never() -> Self {
        Self {
            metadata: MetadataTiming::Never,
            ..Self::known(f64::INFINITY)
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::known(0.0)
        }
    }
}

/// Records voices, music gain automation, and track starts
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    time: f64,
    tracks: Vec<HeadlessTrack>,
    voices: Vec<Voice>,
    music_gain: Vec<GainEnvelope>,
    started: Vec<usize>,
    stopped: Vec<usize>,
    /// Signals not yet due, with the time they fire
    scheduled: Vec<(f64, TrackSignal)>,
    master_gain: f32,
    listener: Option<Vec3>,
}

impl HeadlessBackend {
    pub fn new(tracks: Vec<HeadlessTrack>) -> Self {
        Self {
            tracks,
            master_gain: 1.0,
            ..Default::default()
        }
    }

    /// Move the clock forward
    pub fn advance(&mut self, secs: f64) {
        self.time += secs.max(0.0);
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn music_gain(&self) -> &[GainEnvelope] {
        &self.music_gain
    }

    pub fn started(&self) -> &[usize] {
        &self.started
    }

    pub fn stopped(&self) -> &[usize] {
        &self.stopped
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn listener(&self) -> Option<Vec3> {
        self.listener
    }

    fn track_of(signal: &TrackSignal) -> usize {
        match *signal {
            TrackSignal::DurationKnown { track, .. } | TrackSignal::Ended { track } => track,
        }
    }

    fn cancel_signals(&mut self, index: usize) {
        self.scheduled.retain(|(_, s)| Self::track_of(s) != index);
    }
}

impl AudioBackend for HeadlessBackend {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_listener(&mut self, position: Vec3) {
        self.listener = Some(position);
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    fn play_voice(&mut self, voice: &Voice) -> Result<(), AudioError> {
        self.voices.push(voice.clone());
        Ok(())
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn start_track(&mut self, index: usize) -> Result<Option<f64>, AudioError> {
        let track = *self.tracks.get(index).ok_or_else(|| AudioError::AssetUnavailable {
            name: format!("track {}", index),
            reason: "no such track".to_string(),
        })?;
        if track.broken {
            return Err(AudioError::AssetUnavailable {
                name: format!("track {}", index),
                reason: "failed to decode".to_string(),
            });
        }

        self.cancel_signals(index);
        self.started.push(index);

        if track.duration.is_finite() {
            self.scheduled
                .push((self.time + track.duration, TrackSignal::Ended { track: index }));
        }
        match track.metadata {
            MetadataTiming::Immediate => Ok(Some(track.duration)),
            MetadataTiming::After(delay) => {
                self.scheduled.push((
                    self.time + delay,
                    TrackSignal::DurationKnown {
                        track: index,
                        duration: track.duration,
                    },
                ));
                Ok(None)
            }
            MetadataTiming::Never => Ok(None),
        }
    }

    fn stop_track(&mut self, index: usize) {
        self.cancel_signals(index);
        self.stopped.push(index);
    }

    fn schedule_music_gain(&mut self, envelope: &GainEnvelope) -> Result<(), AudioError> {
        self.music_gain.push(envelope.clone());
        Ok(())
    }

    fn drain_signals(&mut self) -> Vec<TrackSignal> {
        let now = self.time;
        let mut due: Vec<(f64, TrackSignal)> = Vec::new();
        self.scheduled.retain(|entry| {
            if entry.0 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.0.total_cmp(&b.0));
        due.into_iter().map(|(_, signal)| signal).collect()
    }
}
