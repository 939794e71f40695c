//! Web Audio backend
//!
//! Graph:
//! - voice: buffer source → panner → gain ┐
//! - music: media element → music bus ────┴→ compressor → master → destination

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::Vec3;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AudioBuffer, AudioContext, AudioParam, DistanceModelType, DynamicsCompressorNode, GainNode,
    HtmlAudioElement, MediaElementAudioSourceNode, PanningModelType, Response,
};

use super::envelope::{Automation, GainEnvelope};
use super::music::TrackSignal;
use super::spatial::{DistanceModel, PanningModel, Voice};
use super::{AudioBackend, AudioError, MixBusConfig};

fn js_err(context: &str, err: JsValue) -> AudioError {
    AudioError::Backend(format!("{}: {:?}", context, err))
}

fn asset_err(name: &str, err: JsValue) -> AudioError {
    AudioError::AssetUnavailable {
        name: name.to_string(),
        reason: format!("{:?}", err),
    }
}

/// Replay an envelope onto a parameter, dropping automation from its start on
fn apply_envelope(param: &AudioParam, envelope: &GainEnvelope) -> Result<(), AudioError> {
    if let Some(start) = envelope.start_time() {
        param
            .cancel_scheduled_values(start)
            .map_err(|e| js_err("cancel automation", e))?;
    }
    for event in envelope.events() {
        let result = match *event {
            Automation::Set { value, time } => param.set_value_at_time(value, time),
            Automation::Linear { value, time } => param.linear_ramp_to_value_at_time(value, time),
            Automation::Exponential { value, time } => {
                param.exponential_ramp_to_value_at_time(value, time)
            }
        };
        result.map_err(|e| js_err("schedule automation", e))?;
    }
    Ok(())
}

/// One background track and the listeners reporting on it
struct WebTrack {
    element: HtmlAudioElement,
    _source: MediaElementAudioSourceNode,
    _on_metadata: Closure<dyn FnMut(web_sys::Event)>,
    _on_ended: Closure<dyn FnMut(web_sys::Event)>,
}

pub struct WebAudioBackend {
    ctx: AudioContext,
    /// Voice and music input of the mix bus
    compressor: DynamicsCompressorNode,
    master: GainNode,
    music_bus: GainNode,
    bounce_buffer: AudioBuffer,
    tracks: Vec<WebTrack>,
    signals: Rc<RefCell<VecDeque<TrackSignal>>>,
}

async fn fetch_array_buffer(url: &str) -> Result<js_sys::ArrayBuffer, AudioError> {
    let window = web_sys::window().ok_or_else(|| AudioError::Backend("no window".into()))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| asset_err(url, e))?;
    let response: Response = response.dyn_into().map_err(|e| asset_err(url, e))?;
    if !response.ok() {
        return Err(AudioError::AssetUnavailable {
            name: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    let promise = response.array_buffer().map_err(|e| asset_err(url, e))?;
    let buffer = JsFuture::from(promise).await.map_err(|e| asset_err(url, e))?;
    buffer.dyn_into().map_err(|e| asset_err(url, e))
}

impl WebAudioBackend {
    /// Build the graph, decode the bounce sample, and prepare music tracks.
    ///
    /// Must run after a user gesture or the context stays suspended.
    pub async fn load(
        sample_url: &str,
        track_urls: &[&str],
        bus: MixBusConfig,
    ) -> Result<Self, AudioError> {
        let ctx = AudioContext::new().map_err(|e| js_err("create AudioContext", e))?;
        match ctx.resume() {
            Ok(promise) => {
                if let Err(err) = JsFuture::from(promise).await {
                    log::warn!("AudioContext resume rejected: {:?}", err);
                }
            }
            Err(err) => log::warn!("AudioContext resume failed: {:?}", err),
        }

        let compressor = ctx
            .create_dynamics_compressor()
            .map_err(|e| js_err("create compressor", e))?;
        compressor.ratio().set_value(bus.ratio);
        compressor.attack().set_value(bus.attack);
        compressor.release().set_value(bus.release);

        let master = ctx.create_gain().map_err(|e| js_err("create master gain", e))?;
        compressor
            .connect_with_audio_node(&master)
            .map_err(|e| js_err("connect compressor", e))?;
        master
            .connect_with_audio_node(&ctx.destination())
            .map_err(|e| js_err("connect master", e))?;

        let music_bus = ctx.create_gain().map_err(|e| js_err("create music bus", e))?;
        music_bus.gain().set_value(0.0);
        music_bus
            .connect_with_audio_node(&compressor)
            .map_err(|e| js_err("connect music bus", e))?;

        let data = fetch_array_buffer(sample_url).await?;
        let decoded = ctx
            .decode_audio_data(&data)
            .map_err(|e| asset_err(sample_url, e))?;
        let bounce_buffer: AudioBuffer = JsFuture::from(decoded)
            .await
            .map_err(|e| asset_err(sample_url, e))?
            .dyn_into()
            .map_err(|e| asset_err(sample_url, e))?;

        let signals = Rc::new(RefCell::new(VecDeque::new()));
        let mut tracks = Vec::with_capacity(track_urls.len());
        for (index, url) in track_urls.iter().enumerate() {
            match Self::create_track(&ctx, &music_bus, index, url, &signals) {
                Ok(track) => tracks.push(track),
                Err(err) => log::warn!("Skipping music track {}: {}", url, err),
            }
        }

        log::info!(
            "Web Audio ready: {} music tracks, sample rate {}",
            tracks.len(),
            ctx.sample_rate()
        );

        Ok(Self {
            ctx,
            compressor,
            master,
            music_bus,
            bounce_buffer,
            tracks,
            signals,
        })
    }

    fn create_track(
        ctx: &AudioContext,
        music_bus: &GainNode,
        index: usize,
        url: &str,
        signals: &Rc<RefCell<VecDeque<TrackSignal>>>,
    ) -> Result<WebTrack, AudioError> {
        let element = HtmlAudioElement::new_with_src(url).map_err(|e| asset_err(url, e))?;
        element.set_preload("auto");

        let source = ctx
            .create_media_element_source(&element)
            .map_err(|e| js_err("create media source", e))?;
        source
            .connect_with_audio_node(music_bus)
            .map_err(|e| js_err("connect track", e))?;

        let on_metadata = {
            let signals = signals.clone();
            let element = element.clone();
            Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let duration = element.duration();
                if duration.is_finite() {
                    signals.borrow_mut().push_back(TrackSignal::DurationKnown {
                        track: index,
                        duration,
                    });
                }
            })
        };
        element
            .add_event_listener_with_callback("loadedmetadata", on_metadata.as_ref().unchecked_ref())
            .map_err(|e| js_err("listen loadedmetadata", e))?;

        let on_ended = {
            let signals = signals.clone();
            Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                signals.borrow_mut().push_back(TrackSignal::Ended { track: index });
            })
        };
        element
            .add_event_listener_with_callback("ended", on_ended.as_ref().unchecked_ref())
            .map_err(|e| js_err("listen ended", e))?;

        Ok(WebTrack {
            element,
            _source: source,
            _on_metadata: on_metadata,
            _on_ended: on_ended,
        })
    }

    /// Resume after the browser suspended the context
    pub fn resume(&self) {
        if self.ctx.state() == web_sys::AudioContextState::Suspended {
            if let Err(err) = self.ctx.resume() {
                log::warn!("AudioContext resume failed: {:?}", err);
            }
        }
    }
}

impl AudioBackend for WebAudioBackend {
    fn current_time(&self) -> f64 {
        self.ctx.current_time()
    }

    fn set_listener(&mut self, position: Vec3) {
        self.ctx
            .listener()
            .set_position(position.x as f64, position.y as f64, position.z as f64);
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master.gain().set_value(gain);
    }

    fn play_voice(&mut self, voice: &Voice) -> Result<(), AudioError> {
        self.resume();

        let source = self
            .ctx
            .create_buffer_source()
            .map_err(|e| js_err("create buffer source", e))?;
        source.set_buffer(Some(&self.bounce_buffer));

        let p = &voice.panner;
        let panner = self.ctx.create_panner().map_err(|e| js_err("create panner", e))?;
        panner.set_panning_model(match p.panning_model {
            PanningModel::EqualPower => PanningModelType::Equalpower,
            PanningModel::Hrtf => PanningModelType::Hrtf,
        });
        panner.set_distance_model(match p.distance_model {
            DistanceModel::Linear => DistanceModelType::Linear,
            DistanceModel::Inverse => DistanceModelType::Inverse,
            DistanceModel::Exponential => DistanceModelType::Exponential,
        });
        panner.set_ref_distance(p.ref_distance as f64);
        panner.set_max_distance(p.max_distance as f64);
        panner.set_rolloff_factor(p.rolloff_factor as f64);
        panner.set_cone_inner_angle(p.cone_inner_angle as f64);
        panner.set_cone_outer_angle(p.cone_outer_angle as f64);
        panner.set_cone_outer_gain(p.cone_outer_gain as f64);
        panner.set_position(
            voice.position.x as f64,
            voice.position.y as f64,
            voice.position.z as f64,
        );
        panner.set_orientation(
            p.orientation.x as f64,
            p.orientation.y as f64,
            p.orientation.z as f64,
        );

        let gain = self.ctx.create_gain().map_err(|e| js_err("create voice gain", e))?;
        apply_envelope(&gain.gain(), &voice.envelope)?;

        source
            .connect_with_audio_node(&panner)
            .and_then(|_| panner.connect_with_audio_node(&gain))
            .and_then(|_| gain.connect_with_audio_node(&self.compressor))
            .map_err(|e| js_err("connect voice", e))?;

        source.start().map_err(|e| js_err("start voice", e))
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn start_track(&mut self, index: usize) -> Result<Option<f64>, AudioError> {
        self.resume();
        let track = self.tracks.get(index).ok_or_else(|| AudioError::AssetUnavailable {
            name: format!("track {}", index),
            reason: "not loaded".to_string(),
        })?;
        track.element.set_current_time(0.0);
        // A rejected play() promise shows up later as a metadata timeout
        let _playing = track.element.play().map_err(|e| js_err("play track", e))?;

        let duration = track.element.duration();
        Ok(duration.is_finite().then_some(duration))
    }

    fn stop_track(&mut self, index: usize) {
        if let Some(track) = self.tracks.get(index) {
            let _ = track.element.pause();
        }
    }

    fn schedule_music_gain(&mut self, envelope: &GainEnvelope) -> Result<(), AudioError> {
        apply_envelope(&self.music_bus.gain(), envelope)
    }

    fn drain_signals(&mut self) -> Vec<TrackSignal> {
        self.signals.borrow_mut().drain(..).collect()
    }
}
