// =============================================================================
// LITTLE RENDERER - spinning triangle demo
// =============================================================================
//
// Opens a window, builds the Vulkan device and renderer, and draws a single
// green triangle that turns a little every frame.
//
// MAIN LOOP:
// 1. Poll window events (never blocks)
// 2. begin_frame: acquire an image, or skip if the swap chain was rebuilt
// 3. Record the scene inside the swap chain render pass
// 4. end_frame: submit and present, rebuilding on resize
//
// =============================================================================

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use little_renderer::backend::{VulkanDevice, VulkanFrameBackend};
use little_renderer::config::Config;
use little_renderer::game_object::{GameObject, GameObjectIds};
use little_renderer::model::{Model, Vertex};
use little_renderer::render_system::SimpleRenderSystem;
use little_renderer::window::{DesktopWindow, Window};
use little_renderer::{RenderError, Renderer};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting little renderer");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let mut app = match FirstApp::new(config) {
        Ok(app) => app,
        // Closed while minimized before the first swap chain existed
        Err(e) if matches!(e.downcast_ref::<RenderError>(), Some(RenderError::WindowClosed)) => {
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    app.run()
}

/// Configured level, overridable through RUST_LOG
fn init_logging(config: &Config) {
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! Scene resources go first, the
/// renderer (which owns the window) last, so the surface is destroyed
/// before the window it was created for.
struct FirstApp {
    config: Config,
    object_ids: GameObjectIds,
    game_objects: Vec<GameObject>,
    render_system: SimpleRenderSystem,
    device: Arc<VulkanDevice>,
    renderer: Renderer<VulkanFrameBackend, DesktopWindow>,

    // ─────────────────────────────────────────────────────────────────────────
    // FPS TRACKING
    // ─────────────────────────────────────────────────────────────────────────
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl FirstApp {
    fn new(config: Config) -> Result<Self> {
        // Step 1: Window
        let window = DesktopWindow::new(
            config.window.width,
            config.window.height,
            &config.window.title,
        )
        .context("Failed to create window")?;

        // Step 2: Device
        let device = VulkanDevice::new(&window, &config.window.title, config.debug.validation_layers)
            .context("Failed to create Vulkan device")?;

        // Step 3: Renderer and its first swap chain
        let backend = VulkanFrameBackend::new(
            device.clone(),
            config.present_mode(),
            config.max_frames_in_flight(),
        );
        let renderer = Renderer::new(window, backend, config.clear_values())?;

        // Step 4: Pipeline against the swap chain render pass
        let render_pass = renderer
            .swap_chain_render_pass()
            .context("Renderer has no swap chain")?;
        let render_system = SimpleRenderSystem::new(
            device.clone(),
            render_pass,
            &config.shaders.vertex,
            &config.shaders.fragment,
        )
        .context("Failed to create render system")?;

        let now = Instant::now();
        let mut app = Self {
            config,
            object_ids: GameObjectIds::new(),
            game_objects: Vec::new(),
            render_system,
            device,
            renderer,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        };

        // Step 5: Scene
        app.load_game_objects()?;
        Ok(app)
    }

    fn load_game_objects(&mut self) -> Result<()> {
        let vertices = [
            Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
            Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
        ];
        let model = Arc::new(Model::new(self.device.clone(), &vertices)?);

        let mut triangle = self.object_ids.create_game_object();
        triangle.model = Some(model);
        triangle.color = Vec3::new(0.1, 0.8, 0.1);
        triangle.transform2d.translation.x = 0.0;
        triangle.transform2d.scale = Vec2::new(0.5, 0.5);
        triangle.transform2d.rotation = 0.25 * TAU;

        log::info!("Loaded game object {}", triangle.id());
        self.game_objects.push(triangle);
        Ok(())
    }

    // =========================================================================
    // MAIN LOOP
    // =========================================================================

    fn run(&mut self) -> Result<()> {
        while !self.renderer.window().should_close() {
            self.renderer.window_mut().poll_events();

            match self.draw_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(RenderError::WindowClosed) => {
                    log::info!("Window closed while minimized");
                    break;
                }
                Err(e) => return Err(e).context("Render error"),
            }
        }

        log::info!("Close requested, shutting down...");
        self.device.wait_idle()?;
        Ok(())
    }

    /// Returns false when the frame was skipped for a swap chain rebuild
    fn draw_frame(&mut self) -> little_renderer::Result<bool> {
        let Some(frame) = self.renderer.begin_frame()? else {
            return Ok(false);
        };

        self.renderer.begin_render_pass(&frame)?;
        let mut recorder = self.device.recorder(frame.command_buffer());
        self.render_system
            .render_game_objects(&mut recorder, &mut self.game_objects);
        self.renderer.end_render_pass(&frame)?;
        self.renderer.end_frame()?;
        Ok(true)
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            self.renderer.window().set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms)",
                self.config.window.title,
                fps,
                frame_time * 1000.0
            ));

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for FirstApp {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        // Nothing may still be in flight when the scene is released
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {}", e);
        }
    }
}
