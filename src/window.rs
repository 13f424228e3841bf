// Window - the surface the renderer presents to
//
// The renderer only needs a handful of queries from its window, captured by
// the `Window` trait. `DesktopWindow` implements it on winit, driving the
// event loop by hand (pump_app_events) so the application keeps a plain
// poll/draw loop and the renderer can block while the window is minimized.

use ash::vk;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{WindowAttributes, WindowId},
};

use crate::error::{RenderError, Result};

/// What the renderer needs from a window.
pub trait Window {
    /// Current drawable size in pixels. Zero in either dimension when minimized.
    fn extent(&self) -> vk::Extent2D;

    fn should_close(&self) -> bool;

    /// True once the drawable size changed since the last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Blocks until at least one platform event was processed.
    fn wait_events(&mut self);
}

/// Event-loop side of `DesktopWindow`.
struct WindowState {
    attributes: Option<WindowAttributes>,
    window: Option<winit::window::Window>,
    size: PhysicalSize<u32>,
    resized: bool,
    close_requested: bool,
    creation_error: Option<String>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.size = window.inner_size();
                log::info!("Window created: {}x{}", self.size.width, self.size.height);
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.creation_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.size = size;
                self.resized = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

/// A resizable desktop window backed by winit.
pub struct DesktopWindow {
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl DesktopWindow {
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| RenderError::Window(e.to_string()))?;

        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let mut state = WindowState {
            attributes: Some(attributes),
            window: None,
            size: PhysicalSize::new(width, height),
            resized: false,
            close_requested: false,
            creation_error: None,
        };

        // The window is created from the first `resumed` callback
        while state.window.is_none() {
            if let PumpStatus::Exit(_) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut state)
            {
                let reason = state
                    .creation_error
                    .take()
                    .unwrap_or_else(|| "event loop exited before the window was created".into());
                return Err(RenderError::Window(reason));
            }
        }

        Ok(Self { state, event_loop })
    }

    /// Processes pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    pub fn set_title(&self, title: &str) {
        if let Some(window) = &self.state.window {
            window.set_title(title);
        }
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            self.state.close_requested = true;
        }
    }
}

impl Window for DesktopWindow {
    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.state.size.width,
            height: self.state.size.height,
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }
}

impl HasWindowHandle for DesktopWindow {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .window_handle()
    }
}

impl HasDisplayHandle for DesktopWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.event_loop.display_handle()
    }
}
