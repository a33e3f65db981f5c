use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    assets::{AssetManager, AssetManifest, TextureCatalog},
    fonts,
    input::InputState,
    render::{FontHandle, Renderer},
};

/// Frames longer than this are clamped so a stall (window drag, breakpoint) does not
/// arrive as one giant time step.
const MAX_FRAME_TIME: Duration = Duration::from_millis(250);

/// Window and runtime settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub clear_color: [f32; 4],
    /// Fonts tried for HUD text before the bundled face.
    pub font_paths: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Arcade2D".into(),
            width: 800,
            height: 600,
            vsync: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            font_paths: Vec::new(),
        }
    }
}

/// Opens the window and drives a [`Game`] until it exits.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Window size in logical pixels; also the size of the camera viewport.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.config.vsync = vsync;
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.config.clear_color = color;
        self
    }

    /// Prepend font files to the HUD font search list. The bundled face is used when
    /// none of them loads.
    #[must_use]
    pub fn with_font_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.append(&mut self.config.font_paths);
        self.config.font_paths = paths;
        self
    }

    /// Prefer the platform's bold sans-serif over the bundled face when one is installed.
    #[must_use]
    pub fn with_system_fonts(mut self) -> Self {
        self.config.font_paths.extend(fonts::system_font_paths());
        self
    }

    /// Run `game` until the window closes, Escape is pressed or the game asks to exit.
    /// An error from any game hook stops the loop and is returned here.
    pub fn run<G: Game + 'static>(self, game: G) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create the event loop")?;
        let mut app = App {
            config: self.config,
            game,
            ctx: None,
            last_frame: Instant::now(),
            failure: None,
        };
        event_loop.run_app(&mut app)?;
        match app.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// winit application state: the window context appears on the first `resumed`.
struct App<G> {
    config: EngineConfig,
    game: G,
    ctx: Option<EngineContext<'static>>,
    last_frame: Instant,
    failure: Option<anyhow::Error>,
}

impl<G: Game> App<G> {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = event_loop
            .create_window(attributes)
            .context("failed to create the window")?;
        // The window lives until the process exits; the renderer's surface borrows it.
        let window: &'static Window = Box::leak(Box::new(window));

        let mut ctx = EngineContext::new(window, &self.config)?;
        self.game.init(&mut ctx)?;
        log::info!(
            "{} started ({}x{})",
            self.config.title,
            self.config.width,
            self.config.height
        );
        self.last_frame = Instant::now();
        window.request_redraw();
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Record the first error and shut the loop down.
    fn fail(&mut self, event_loop: &ActiveEventLoop, stage: &str, err: anyhow::Error) {
        log::error!("{stage} failed: {err:#}");
        self.failure.get_or_insert(err);
        event_loop.exit();
    }
}

impl<G: Game> ApplicationHandler for App<G> {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.input.begin_frame();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, "startup", err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if is_escape_pressed(&event) {
                    event_loop.exit();
                }
                ctx.input.handle_key(&event);
            }
            WindowEvent::Focused(false) => ctx.input.release_all(),
            WindowEvent::Resized(size) => ctx.renderer.resize(size),
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.game.draw(ctx) {
                    self.fail(event_loop, "draw", err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let now = Instant::now();
        ctx.advance_time((now - self.last_frame).min(MAX_FRAME_TIME));
        self.last_frame = now;

        if let Err(err) = self.game.update(ctx) {
            self.fail(event_loop, "update", err);
            return;
        }
        if ctx.exit_requested {
            event_loop.exit();
            return;
        }
        ctx.window.request_redraw();
    }
}

fn is_escape_pressed(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && matches!(event.physical_key, PhysicalKey::Code(KeyCode::Escape))
}

/// Shared context provided to game code each frame.
pub struct EngineContext<'window> {
    window: &'window Window,
    config: EngineConfig,
    delta_time: Duration,
    elapsed_time: Duration,
    exit_requested: bool,
    input: InputState,
    renderer: Renderer<'window>,
    assets: AssetManager,
    hud_font: Option<FontHandle>,
}

impl<'window> EngineContext<'window> {
    fn new(window: &'window Window, config: &EngineConfig) -> Result<Self> {
        let mut renderer = Renderer::new(window, config.vsync)?;
        let hud_font = fonts::load_hud_font(&mut renderer, &config.font_paths);
        Ok(Self {
            window,
            config: config.clone(),
            delta_time: Duration::ZERO,
            elapsed_time: Duration::ZERO,
            exit_requested: false,
            input: InputState::new(),
            renderer,
            assets: AssetManager::new(),
            hud_font,
        })
    }

    fn advance_time(&mut self, delta: Duration) {
        self.delta_time = delta;
        self.elapsed_time += delta;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Time since the previous update, capped at a quarter second.
    pub fn delta_time(&self) -> Duration {
        self.delta_time
    }

    pub fn elapsed_time(&self) -> Duration {
        self.elapsed_time
    }

    pub fn window(&self) -> &Window {
        self.window
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Stop the loop after the current update.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn renderer(&mut self) -> &mut Renderer<'window> {
        &mut self.renderer
    }

    pub fn assets(&mut self) -> &mut AssetManager {
        &mut self.assets
    }

    /// Font used for HUD text, if one could be found.
    pub fn hud_font(&self) -> Option<FontHandle> {
        self.hud_font
    }

    /// Load everything a manifest declares through the renderer.
    pub fn load_manifest(&mut self, manifest: &AssetManifest) -> Result<TextureCatalog> {
        self.assets.load_manifest(&mut self.renderer, manifest)
    }
}

/// Hooks a game implements to be driven by [`Engine::run`].
pub trait Game {
    /// Called once after the window and renderer exist, before the first update.
    fn init(&mut self, _ctx: &mut EngineContext<'_>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut EngineContext<'_>) -> Result<()>;

    fn draw(&mut self, ctx: &mut EngineContext<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let engine = Engine::new()
            .with_title("Coin Runner")
            .with_size(1024, 768)
            .with_vsync(false)
            .with_font_paths([PathBuf::from("b.ttf")])
            .with_font_paths([PathBuf::from("a.ttf")]);
        let config = engine.config();
        assert_eq!(config.title, "Coin Runner");
        assert_eq!((config.width, config.height), (1024, 768));
        assert!(!config.vsync);
        assert_eq!(config.font_paths, vec![PathBuf::from("a.ttf"), PathBuf::from("b.ttf")]);
    }

    #[test]
    fn system_fonts_rank_after_explicit_paths() {
        let engine = Engine::new()
            .with_font_paths([PathBuf::from("game.ttf")])
            .with_system_fonts();
        let paths = &engine.config().font_paths;
        assert_eq!(paths[0], PathBuf::from("game.ttf"));
        assert_eq!(paths[1..], fonts::system_font_paths()[..]);
    }

    #[test]
    fn default_window_matches_the_viewport() {
        let config = EngineConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.vsync);
    }
}
