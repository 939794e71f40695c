//! Bounce Shot entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent};

    use bounce_shot::Settings;
    use bounce_shot::audio::web::WebAudioBackend;
    use bounce_shot::audio::{AudioState, AudioSubsystem, MixBusConfig};
    use bounce_shot::consts::TICK_RATE;
    use bounce_shot::renderer::{RenderState, shapes};
    use bounce_shot::sim::{ArcadeState, TickInput, tick};
    use bounce_shot::x_scale_for;

    const SIM_DT: f32 = 1.0 / TICK_RATE as f32;
    const MAX_SUBSTEPS: u32 = 5;

    const BOUNCE_SAMPLE: &str = "./bounce.mp3";
    const MUSIC_TRACKS: &[&str] = &[
        "./music/track1.mp3",
        "./music/track2.mp3",
        "./music/track3.mp3",
    ];

    /// Game instance holding all state
    struct Game {
        state: ArcadeState,
        input: TickInput,
        audio: AudioSubsystem<WebAudioBackend>,
        /// Set on the first gesture; audio loads at most once
        audio_requested: bool,
        render_state: Option<RenderState>,
        settings: Settings,
        focused: bool,
        screen: Vec2,
        x_scale: f32,
        accumulator: f32,
        last_time: f64,
    }

    impl Game {
        fn new(settings: Settings, screen: Vec2, seed: u64) -> Self {
            Self {
                state: ArcadeState::new(settings.max_projectiles),
                input: TickInput::default(),
                audio: AudioSubsystem::new(&settings, screen, seed),
                audio_requested: false,
                render_state: None,
                settings,
                focused: true,
                screen,
                x_scale: x_scale_for(screen.x, screen.y),
                accumulator: 0.0,
                last_time: 0.0,
            }
        }

        /// Run simulation ticks and hand their sounds to the audio layer
        fn update(&mut self, dt: f32) {
            let dt = dt.min(0.1);
            self.accumulator += dt;

            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let events = tick(&mut self.state, &self.input, self.x_scale, self.screen);
                for event in &events {
                    self.audio.play(event.audio());
                }
                self.accumulator -= SIM_DT;
                substeps += 1;

                // Clear one-shot inputs after processing
                self.input.fire = false;
            }

            self.audio.update();
        }

        /// Render the current frame
        fn render(&mut self) {
            if let Some(ref mut render_state) = self.render_state {
                let sprites = shapes::scene(&self.state);
                match render_state.render(&sprites, self.x_scale) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        render_state.resize(render_state.size.0, render_state.size.1);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory!");
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }
            }
        }

        fn resize(&mut self, width: u32, height: u32, client: Vec2) {
            self.screen = client;
            self.x_scale = x_scale_for(client.x, client.y);
            self.audio.set_screen_size(client);
            if let Some(ref mut render_state) = self.render_state {
                render_state.resize(width, height);
            }
        }

        /// Push volume settings, muting while unfocused if configured
        fn apply_audio_settings(&mut self) {
            let mut effective = self.settings.clone();
            if self.settings.mute_on_blur && !self.focused {
                effective.muted = true;
            }
            self.audio.apply_settings(&effective);
        }

        fn toggle_mute(&mut self) {
            self.settings.muted = !self.settings.muted;
            self.settings.save();
            self.apply_audio_settings();
            log::info!("Muted: {}", self.settings.muted);
        }
    }

    /// Load audio on the first user gesture (browser autoplay policy)
    fn request_audio(game: &Rc<RefCell<Game>>) {
        {
            let mut g = game.borrow_mut();
            if g.audio_requested {
                return;
            }
            g.audio_requested = true;
            g.audio.start_music();
        }

        let game = game.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = WebAudioBackend::load(BOUNCE_SAMPLE, MUSIC_TRACKS, MixBusConfig::default()).await;
            let mut g = game.borrow_mut();
            match result {
                Ok(backend) => g.audio.attach(backend),
                Err(err) => g.audio.fail(err),
            }
            // Volume changes made while loading
            if g.audio.state() == AudioState::Ready {
                g.apply_audio_settings();
            }
        });
    }

    fn canvas_size(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> (u32, u32, Vec2) {
        let dpr = window.device_pixel_ratio();
        let client_w = canvas.client_width();
        let client_h = canvas.client_height();
        let width = (client_w as f64 * dpr) as u32;
        let height = (client_h as f64 * dpr) as u32;
        (width, height, Vec2::new(client_w as f32, client_h as f32))
    }

    pub async fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Bounce Shot starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()?;

        let (width, height, client) = canvas_size(&window, &canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(Settings::load(), client, seed)));
        log::info!("Game initialized with seed: {}", seed);

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let render_state = RenderState::new(surface, &adapter, width, height)
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        game.borrow_mut().render_state = Some(render_state);

        setup_input_handlers(&window, &canvas, game.clone())?;
        setup_resize(&window, &canvas, game.clone())?;
        setup_focus(&window, game.clone())?;

        request_animation_frame(game);

        log::info!("Bounce Shot running!");
        Ok(())
    }

    fn setup_input_handlers(
        window: &web_sys::Window,
        canvas: &HtmlCanvasElement,
        game: Rc<RefCell<Game>>,
    ) -> Result<(), JsValue> {
        // Key down
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                request_audio(&game);
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "ArrowLeft" => g.input.turn_left = true,
                    "ArrowRight" => g.input.turn_right = true,
                    "ArrowUp" => g.input.forward = true,
                    "ArrowDown" => g.input.backward = true,
                    " " => {
                        event.prevent_default();
                        g.input.fire = true;
                    }
                    "m" | "M" => g.toggle_mute(),
                    _ => {}
                }
            });
            window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Key up
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "ArrowLeft" => g.input.turn_left = false,
                    "ArrowRight" => g.input.turn_right = false,
                    "ArrowUp" => g.input.forward = false,
                    "ArrowDown" => g.input.backward = false,
                    _ => {}
                }
            });
            window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Click only unlocks audio
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                request_audio(&game);
            });
            canvas.add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        Ok(())
    }

    fn setup_resize(
        window: &web_sys::Window,
        canvas: &HtmlCanvasElement,
        game: Rc<RefCell<Game>>,
    ) -> Result<(), JsValue> {
        let canvas = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Some(window) = web_sys::window() else {
                return;
            };
            let (width, height, client) = canvas_size(&window, &canvas);
            canvas.set_width(width);
            canvas.set_height(height);
            game.borrow_mut().resize(width, height, client);
        });
        window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }

    fn setup_focus(window: &web_sys::Window, game: Rc<RefCell<Game>>) -> Result<(), JsValue> {
        for (name, focused) in [("blur", false), ("focus", true)] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                let mut g = game.borrow_mut();
                g.focused = focused;
                g.apply_audio_settings();
            });
            window.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
            closure.forget();
        }
        Ok(())
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let dt = if g.last_time > 0.0 {
                ((time - g.last_time) / 1000.0) as f32
            } else {
                SIM_DT
            };
            g.last_time = time;

            g.update(dt);
            g.render();
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run().await
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Bounce Shot (native) starting...");
    log::info!("Native mode has no window or audio device - run with `trunk serve` for the web version");

    let seconds = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u32>().ok())
        .unwrap_or(30);
    headless_demo(seconds);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Scripted session against the recording backend
#[cfg(not(target_arch = "wasm32"))]
fn headless_demo(seconds: u32) {
    use bounce_shot::Settings;
    use bounce_shot::audio::{AudioSubsystem, HeadlessBackend, HeadlessTrack};
    use bounce_shot::consts::TICK_RATE;
    use bounce_shot::sim::{ArcadeState, SimEvent, TickInput, tick};
    use bounce_shot::x_scale_for;
    use glam::Vec2;

    let settings = Settings::load();
    let screen = Vec2::new(1280.0, 720.0);
    let x_scale = x_scale_for(screen.x, screen.y);

    let mut state = ArcadeState::new(settings.max_projectiles);
    let mut audio = AudioSubsystem::new(&settings, screen, 42);
    audio.start_music();
    audio.attach(HeadlessBackend::new(vec![
        HeadlessTrack::known(12.0),
        HeadlessTrack::delayed(9.0, 0.5),
        HeadlessTrack::known(15.0),
    ]));

    let dt = 1.0 / TICK_RATE as f64;
    let total_ticks = seconds as u64 * TICK_RATE as u64;
    let mut bounces = 0usize;
    let mut shots = 0usize;

    for t in 0..total_ticks {
        let input = TickInput {
            turn_left: (t / 90) % 2 == 0,
            forward: t % 240 < 40,
            fire: t % 20 == 0,
            ..Default::default()
        };
        for event in tick(&mut state, &input, x_scale, screen) {
            match event {
                SimEvent::Fired(_) => shots += 1,
                SimEvent::Bounce(ref bounce) => {
                    bounces += 1;
                    log::debug!(
                        "tick {}: {:?} bounce at {:?}, volume {:.3}{}",
                        t,
                        bounce.axis,
                        bounce.pixel,
                        bounce.volume,
                        if bounce.corner { " (corner)" } else { "" }
                    );
                }
            }
            audio.play(event.audio());
        }

        if let Some(backend) = audio.backend_mut() {
            backend.advance(dt);
        }
        audio.update();
    }

    log::info!(
        "{} s simulated: {} shots, {} bounces, {} projectiles live",
        seconds,
        shots,
        bounces,
        state.projectiles.len()
    );
    if let Some(backend) = audio.backend() {
        log::info!(
            "{} voices played, tracks started {:?}, music phase {:?}",
            backend.voices().len(),
            backend.started(),
            audio.music().phase()
        );
    }
}
