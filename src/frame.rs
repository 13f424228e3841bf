// Frame seams - what the renderer needs from a graphics backend
//
// The Renderer only talks to the GPU through FrameBackend and the swap chain
// it builds (PresentChain). The Vulkan implementation lives in backend/;
// tests drive the same state machine with a mock.

use ash::vk;
use std::fmt;

use crate::error::Result;
use crate::renderer::ClearValues;

/// Outcome of asking the swap chain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// An image is ready. `suboptimal` means the chain still works but no
    /// longer matches the surface exactly.
    Image { index: u32, suboptimal: bool },
    /// The surface changed and the chain can no longer be presented to.
    OutOfDate,
}

/// Outcome of submitting a frame and presenting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presentation {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl Presentation {
    pub fn needs_rebuild(self) -> bool {
        self != Presentation::Optimal
    }
}

/// Swap chain lifecycle as seen by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapChainState {
    Uninitialized,
    Ready,
    Stale,
    Rebuilding,
    Destroyed,
}

/// A built set of presentable images with their per-frame synchronization.
pub trait PresentChain {
    type CommandBuffer: Copy;

    fn image_count(&self) -> usize;

    fn extent(&self) -> vk::Extent2D;

    /// Blocks until the current in-flight slot is free, then acquires an image
    /// and waits on whatever earlier frame still holds it, so the image's
    /// command buffer can be recorded as soon as this returns.
    /// Failures other than out-of-date surface as `RenderError::Acquire`.
    fn acquire_next_image(&mut self) -> Result<Acquired>;

    /// Submits `command_buffer` for `image_index` and presents it.
    fn submit_command_buffers(
        &mut self,
        command_buffer: Self::CommandBuffer,
        image_index: u32,
    ) -> Result<Presentation>;
}

/// Everything the renderer needs from the graphics API.
pub trait FrameBackend {
    type CommandBuffer: Copy + PartialEq + fmt::Debug;
    type SwapChain: PresentChain<CommandBuffer = Self::CommandBuffer>;

    /// Builds a chain for `extent`. When `previous` is given its handles are
    /// handed to the new chain, and it is released only once the new chain
    /// is complete.
    fn build_swap_chain(
        &mut self,
        extent: vk::Extent2D,
        previous: Option<Self::SwapChain>,
    ) -> Result<Self::SwapChain>;

    fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<Self::CommandBuffer>>;

    fn free_command_buffers(&mut self, buffers: &[Self::CommandBuffer]);

    fn begin_commands(&mut self, command_buffer: Self::CommandBuffer) -> Result<()>;

    fn end_commands(&mut self, command_buffer: Self::CommandBuffer) -> Result<()>;

    /// Begins the chain's render pass on the framebuffer of `image_index` and
    /// sets viewport and scissor to the full chain extent. Fails without
    /// recording anything if the chain has no framebuffer for the image.
    fn begin_render_pass(
        &mut self,
        command_buffer: Self::CommandBuffer,
        swap_chain: &Self::SwapChain,
        image_index: u32,
        clear: &ClearValues,
    ) -> Result<()>;

    fn end_render_pass(&mut self, command_buffer: Self::CommandBuffer);

    fn wait_idle(&self) -> Result<()>;
}

/// Command buffer handed out by `begin_frame`, valid only for that frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveFrame<C> {
    command_buffer: C,
    serial: u64,
}

impl<C: Copy> ActiveFrame<C> {
    pub(crate) fn new(command_buffer: C, serial: u64) -> Self {
        Self {
            command_buffer,
            serial,
        }
    }

    pub fn command_buffer(&self) -> C {
        self.command_buffer
    }

    /// Frame number this handle was issued for, starting at 1.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}
