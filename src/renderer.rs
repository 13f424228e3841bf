// Renderer - frame lifecycle and swap chain management
//
// Owns the window, the swap chain and one command buffer per swap chain
// image, and enforces the per-frame call order:
//
//   begin_frame -> begin_render_pass -> (record draws) -> end_render_pass -> end_frame
//
// Surface changes are handled here and never reach the caller as errors:
// an out-of-date acquire skips the frame (begin_frame returns None), and an
// out-of-date or suboptimal present, or a window resize, rebuilds the swap
// chain at the end of the frame.

use ash::vk;

use crate::error::{RenderError, Result};
use crate::frame::{
    Acquired, ActiveFrame, FrameBackend, PresentChain, Presentation, SwapChainState,
};
use crate::window::Window;

/// Clear values for the color and depth attachments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.01, 0.1, 0.1, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Drives frames for one window.
///
/// Field order matters for Drop: the swap chain and backend go before the
/// window they present to.
pub struct Renderer<B: FrameBackend, W: Window> {
    swap_chain: Option<B::SwapChain>,
    command_buffers: Vec<B::CommandBuffer>,
    backend: B,
    window: W,

    clear: ClearValues,
    state: SwapChainState,
    current_image_index: u32,
    frame_started: bool,
    /// Serial of the most recently begun frame, 0 before the first one.
    frame_serial: u64,
    frames_presented: u64,
}

impl<B: FrameBackend, W: Window> Renderer<B, W> {
    /// Creates the first swap chain, blocking while the window is minimized.
    pub fn new(window: W, backend: B, clear: ClearValues) -> Result<Self> {
        let mut renderer = Self {
            swap_chain: None,
            command_buffers: Vec::new(),
            backend,
            window,
            clear,
            state: SwapChainState::Uninitialized,
            current_image_index: 0,
            frame_started: false,
            frame_serial: 0,
            frames_presented: 0,
        };

        renderer.recreate_swap_chain()?;
        Ok(renderer)
    }

    // =========================================================================
    // FRAME PROTOCOL
    // =========================================================================

    /// Starts a frame and returns its command buffer, already recording.
    ///
    /// Returns `Ok(None)` when the swap chain was out of date; it has been
    /// rebuilt and the caller should skip this iteration.
    pub fn begin_frame(&mut self) -> Result<Option<ActiveFrame<B::CommandBuffer>>> {
        if self.frame_started {
            return Err(RenderError::protocol(
                "begin_frame called while a frame is already in progress",
            ));
        }

        let swap_chain = self
            .swap_chain
            .as_mut()
            .ok_or(RenderError::InvalidState("no swap chain to render to"))?;

        let image_index = match swap_chain.acquire_next_image()? {
            Acquired::OutOfDate => {
                log::debug!("Swap chain out of date on acquire, rebuilding");
                self.state = SwapChainState::Stale;
                self.recreate_swap_chain()?;
                return Ok(None);
            }
            Acquired::Image { index, suboptimal } => {
                if suboptimal {
                    log::debug!("Swap chain suboptimal on acquire, rebuilding after this frame");
                    self.state = SwapChainState::Stale;
                }
                index
            }
        };

        let command_buffer = *self
            .command_buffers
            .get(image_index as usize)
            .ok_or(RenderError::InvalidState("acquired image has no command buffer"))?;

        self.backend.begin_commands(command_buffer)?;

        self.current_image_index = image_index;
        self.frame_started = true;
        self.frame_serial += 1;

        Ok(Some(ActiveFrame::new(command_buffer, self.frame_serial)))
    }

    /// Begins the swap chain render pass with full-extent viewport and scissor.
    pub fn begin_render_pass(&mut self, frame: &ActiveFrame<B::CommandBuffer>) -> Result<()> {
        self.check_active(
            frame,
            "cannot begin render pass if frame is not in progress",
            "cannot begin render pass on command buffer from a different frame",
        )?;

        let swap_chain = self
            .swap_chain
            .as_ref()
            .ok_or(RenderError::InvalidState("no swap chain to render to"))?;

        self.backend.begin_render_pass(
            frame.command_buffer(),
            swap_chain,
            self.current_image_index,
            &self.clear,
        )
    }

    pub fn end_render_pass(&mut self, frame: &ActiveFrame<B::CommandBuffer>) -> Result<()> {
        self.check_active(
            frame,
            "cannot end render pass if frame is not in progress",
            "cannot end render pass on command buffer from a different frame",
        )?;

        self.backend.end_render_pass(frame.command_buffer());
        Ok(())
    }

    /// Finishes recording, submits and presents the frame.
    pub fn end_frame(&mut self) -> Result<()> {
        if !self.frame_started {
            return Err(RenderError::protocol(
                "end_frame called while no frame is in progress",
            ));
        }
        self.frame_started = false;

        let command_buffer = self.current_command_buffer_unchecked();
        self.backend.end_commands(command_buffer)?;

        let swap_chain = self
            .swap_chain
            .as_mut()
            .ok_or(RenderError::InvalidState("no swap chain to present to"))?;
        let presentation =
            swap_chain.submit_command_buffers(command_buffer, self.current_image_index)?;
        self.frames_presented += 1;

        let resized = self.window.was_resized();
        if presentation.needs_rebuild() || resized || self.state == SwapChainState::Stale {
            if presentation != Presentation::Optimal {
                log::debug!("Present reported {:?}, rebuilding swap chain", presentation);
            }
            self.window.reset_resized_flag();
            self.state = SwapChainState::Stale;
            self.recreate_swap_chain()?;
        }

        Ok(())
    }

    fn check_active(
        &self,
        frame: &ActiveFrame<B::CommandBuffer>,
        not_started: &'static str,
        foreign: &'static str,
    ) -> Result<()> {
        if !self.frame_started {
            return Err(RenderError::protocol(not_started));
        }
        if frame.serial() != self.frame_serial
            || frame.command_buffer() != self.current_command_buffer_unchecked()
        {
            return Err(RenderError::protocol(foreign));
        }
        Ok(())
    }

    // =========================================================================
    // SWAP CHAIN LIFECYCLE
    // =========================================================================

    /// Replaces the swap chain with one matching the window's current size.
    ///
    /// Blocks on window events while either dimension is zero. The new chain
    /// is built from the old one, which is released only afterwards.
    fn recreate_swap_chain(&mut self) -> Result<()> {
        let mut extent = self.window.extent();
        while extent.width == 0 || extent.height == 0 {
            if self.window.should_close() {
                return Err(RenderError::WindowClosed);
            }
            log::debug!("Window minimized, waiting for a drawable size");
            self.window.wait_events();
            extent = self.window.extent();
        }

        self.backend.wait_idle()?;

        let previous = self.swap_chain.take();
        if previous.is_some() {
            self.state = SwapChainState::Rebuilding;
        }

        let swap_chain = self.backend.build_swap_chain(extent, previous)?;
        log::info!(
            "Swap chain ready: {}x{}, {} images",
            swap_chain.extent().width,
            swap_chain.extent().height,
            swap_chain.image_count()
        );

        if swap_chain.image_count() != self.command_buffers.len() {
            self.free_command_buffers();
            self.command_buffers = self
                .backend
                .allocate_command_buffers(swap_chain.image_count())?;
        }

        self.swap_chain = Some(swap_chain);
        self.state = SwapChainState::Ready;
        Ok(())
    }

    fn free_command_buffers(&mut self) {
        if !self.command_buffers.is_empty() {
            self.backend.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }
    }

    /// Waits for the GPU, then releases command buffers and the swap chain.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == SwapChainState::Destroyed {
            return Ok(());
        }

        self.backend.wait_idle()?;
        self.free_command_buffers();
        self.swap_chain = None;
        self.frame_started = false;
        self.state = SwapChainState::Destroyed;
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    pub fn current_command_buffer(&self) -> Result<B::CommandBuffer> {
        if !self.frame_started {
            return Err(RenderError::protocol(
                "cannot get command buffer when frame not in progress",
            ));
        }
        Ok(self.current_command_buffer_unchecked())
    }

    fn current_command_buffer_unchecked(&self) -> B::CommandBuffer {
        self.command_buffers[self.current_image_index as usize]
    }

    pub fn current_image_index(&self) -> u32 {
        self.current_image_index
    }

    pub fn state(&self) -> SwapChainState {
        self.state
    }

    pub fn image_count(&self) -> usize {
        self.swap_chain.as_ref().map_or(0, |s| s.image_count())
    }

    pub fn swap_chain(&self) -> Option<&B::SwapChain> {
        self.swap_chain.as_ref()
    }

    pub fn swap_chain_extent(&self) -> vk::Extent2D {
        self.swap_chain
            .as_ref()
            .map_or(vk::Extent2D::default(), |s| s.extent())
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.swap_chain_extent();
        if extent.height == 0 {
            return 1.0;
        }
        extent.width as f32 / extent.height as f32
    }

    /// Frames submitted and presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: FrameBackend, W: Window> Drop for Renderer<B, W> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Renderer shutdown failed: {}", e);
        }
    }
}
