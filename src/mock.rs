// Test doubles - backend, window, allocator and recorder with no GPU behind them

use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::backend::buffer::BufferAllocator;
use crate::backend::command::CommandRecorder;
use crate::backend::sync::InFlightTracker;
use crate::error::{RenderError, Result};
use crate::frame::{Acquired, FrameBackend, PresentChain, Presentation};
use crate::renderer::ClearValues;
use crate::window::Window;

// ============================================================================
// Mock Backend
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    ChainBuilt {
        id: u64,
        extent: vk::Extent2D,
        image_count: usize,
        previous: Option<u64>,
    },
    ChainReleased {
        id: u64,
    },
    CommandBuffersAllocated(usize),
    CommandBuffersFreed(usize),
    BeginCommands(u64),
    EndCommands(u64),
    BeginRenderPass {
        command_buffer: u64,
        image_index: u32,
        extent: vk::Extent2D,
    },
    EndRenderPass(u64),
    ImageAcquired {
        chain: u64,
        image_index: u32,
        /// In-flight slot whose fence was waited on before reusing the image
        waited_on: Option<usize>,
    },
    Submitted {
        chain: u64,
        command_buffer: u64,
        image_index: u32,
    },
    WaitIdle,
}

/// A one-shot result injected into the next acquire or present.
#[derive(Clone, Copy, Debug)]
pub enum Scripted {
    Suboptimal,
    OutOfDate,
    Fail(vk::Result),
}

pub type EventLog = Rc<RefCell<Vec<BackendEvent>>>;

#[derive(Default)]
struct Script {
    acquire: VecDeque<Scripted>,
    present: VecDeque<Scripted>,
}

pub struct MockBackend {
    log: EventLog,
    script: Rc<RefCell<Script>>,
    image_count: Cell<usize>,
    frames_in_flight: usize,
    missing_framebuffers: RefCell<Vec<u32>>,
    next_chain_id: u64,
    next_command_buffer: u64,
}

impl MockBackend {
    pub fn new(image_count: usize, frames_in_flight: usize) -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            script: Rc::new(RefCell::new(Script::default())),
            image_count: Cell::new(image_count),
            frames_in_flight,
            missing_framebuffers: RefCell::new(Vec::new()),
            next_chain_id: 1,
            next_command_buffer: 1,
        }
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub fn events(&self) -> Vec<BackendEvent> {
        self.log.borrow().clone()
    }

    /// Image count reported by chains built from now on
    pub fn set_image_count(&self, count: usize) {
        self.image_count.set(count);
    }

    /// Chains report no framebuffer for `image_index` from now on
    pub fn remove_framebuffer(&self, image_index: u32) {
        self.missing_framebuffers.borrow_mut().push(image_index);
    }

    pub fn script_acquire(&self, result: Scripted) {
        self.script.borrow_mut().acquire.push_back(result);
    }

    pub fn script_present(&self, result: Scripted) {
        self.script.borrow_mut().present.push_back(result);
    }

    pub fn chains_built(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|e| matches!(e, BackendEvent::ChainBuilt { .. }))
            .count()
    }

    pub fn live_command_buffers(&self) -> usize {
        self.log.borrow().iter().fold(0usize, |live, e| match e {
            BackendEvent::CommandBuffersAllocated(n) => live + n,
            BackendEvent::CommandBuffersFreed(n) => live - n,
            _ => live,
        })
    }

    fn record(&self, event: BackendEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl FrameBackend for MockBackend {
    type CommandBuffer = u64;
    type SwapChain = MockSwapChain;

    fn build_swap_chain(
        &mut self,
        extent: vk::Extent2D,
        previous: Option<MockSwapChain>,
    ) -> Result<MockSwapChain> {
        assert!(
            extent.width > 0 && extent.height > 0,
            "swap chain built with a zero dimension"
        );

        let id = self.next_chain_id;
        self.next_chain_id += 1;
        let image_count = self.image_count.get();

        let chain = MockSwapChain {
            id,
            extent,
            image_count,
            next_image: 0,
            tracker: InFlightTracker::new(image_count, self.frames_in_flight),
            log: self.log.clone(),
            script: self.script.clone(),
        };
        self.record(BackendEvent::ChainBuilt {
            id,
            extent,
            image_count,
            previous: previous.as_ref().map(|p| p.id),
        });

        drop(previous);
        Ok(chain)
    }

    fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<u64>> {
        let first = self.next_command_buffer;
        self.next_command_buffer += count as u64;
        self.record(BackendEvent::CommandBuffersAllocated(count));
        Ok((first..first + count as u64).collect())
    }

    fn free_command_buffers(&mut self, buffers: &[u64]) {
        self.record(BackendEvent::CommandBuffersFreed(buffers.len()));
    }

    fn begin_commands(&mut self, command_buffer: u64) -> Result<()> {
        self.record(BackendEvent::BeginCommands(command_buffer));
        Ok(())
    }

    fn end_commands(&mut self, command_buffer: u64) -> Result<()> {
        self.record(BackendEvent::EndCommands(command_buffer));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        command_buffer: u64,
        swap_chain: &MockSwapChain,
        image_index: u32,
        _clear: &ClearValues,
    ) -> Result<()> {
        if self.missing_framebuffers.borrow().contains(&image_index) {
            return Err(RenderError::InvalidState("acquired image has no framebuffer"));
        }
        self.record(BackendEvent::BeginRenderPass {
            command_buffer,
            image_index,
            extent: swap_chain.extent,
        });
        Ok(())
    }

    fn end_render_pass(&mut self, command_buffer: u64) {
        self.record(BackendEvent::EndRenderPass(command_buffer));
    }

    fn wait_idle(&self) -> Result<()> {
        self.record(BackendEvent::WaitIdle);
        Ok(())
    }
}

pub struct MockSwapChain {
    id: u64,
    extent: vk::Extent2D,
    image_count: usize,
    next_image: u32,
    /// Fences are stood in for by their in-flight slot index
    tracker: InFlightTracker<usize>,
    log: EventLog,
    script: Rc<RefCell<Script>>,
}

impl PresentChain for MockSwapChain {
    type CommandBuffer = u64;

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire_next_image(&mut self) -> Result<Acquired> {
        let scripted = self.script.borrow_mut().acquire.pop_front();
        let suboptimal = match scripted {
            None => false,
            Some(Scripted::Suboptimal) => true,
            Some(Scripted::OutOfDate) => return Ok(Acquired::OutOfDate),
            Some(Scripted::Fail(e)) => return Err(RenderError::Acquire(e)),
        };

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;

        let slot = self.tracker.current_frame();
        let waited_on = self.tracker.claim_image(index as usize, slot);
        self.log.borrow_mut().push(BackendEvent::ImageAcquired {
            chain: self.id,
            image_index: index,
            waited_on,
        });
        Ok(Acquired::Image { index, suboptimal })
    }

    fn submit_command_buffers(&mut self, command_buffer: u64, image_index: u32) -> Result<Presentation> {
        self.tracker.advance();

        self.log.borrow_mut().push(BackendEvent::Submitted {
            chain: self.id,
            command_buffer,
            image_index,
        });

        match self.script.borrow_mut().present.pop_front() {
            None => Ok(Presentation::Optimal),
            Some(Scripted::Suboptimal) => Ok(Presentation::Suboptimal),
            Some(Scripted::OutOfDate) => Ok(Presentation::OutOfDate),
            Some(Scripted::Fail(e)) => Err(RenderError::Present(e)),
        }
    }
}

impl Drop for MockSwapChain {
    fn drop(&mut self) {
        self.log
            .borrow_mut()
            .push(BackendEvent::ChainReleased { id: self.id });
    }
}

// ============================================================================
// Mock Window
// ============================================================================

pub struct MockWindow {
    extent: vk::Extent2D,
    pending: VecDeque<vk::Extent2D>,
    resized: bool,
    close: bool,
    wait_calls: usize,
}

impl MockWindow {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            pending: VecDeque::new(),
            resized: false,
            close: false,
            wait_calls: 0,
        }
    }

    /// Extents the window reports after each successive `wait_events`
    pub fn queue_extents(&mut self, extents: impl IntoIterator<Item = vk::Extent2D>) {
        self.pending.extend(extents);
    }

    pub fn resize(&mut self, extent: vk::Extent2D) {
        self.extent = extent;
        self.resized = true;
    }

    pub fn request_close(&mut self) {
        self.close = true;
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls
    }
}

impl Window for MockWindow {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.wait_calls += 1;
        let next = self
            .pending
            .pop_front()
            .expect("wait_events called with no queued window events");
        self.extent = next;
    }
}

// ============================================================================
// Mock Allocator
// ============================================================================

#[derive(Default)]
pub struct MockAllocator {
    next_handle: Cell<u64>,
    pub created: RefCell<Vec<(vk::DeviceSize, vk::BufferUsageFlags, vk::MemoryPropertyFlags)>>,
    pub uploads: RefCell<Vec<Vec<u8>>>,
    pub destroyed: RefCell<Vec<vk::Buffer>>,
}

impl BufferAllocator for MockAllocator {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        self.created.borrow_mut().push((size, usage, properties));
        Ok((vk::Buffer::from_raw(handle), vk::DeviceMemory::from_raw(handle)))
    }

    fn upload(&self, _memory: vk::DeviceMemory, bytes: &[u8]) -> Result<()> {
        self.uploads.borrow_mut().push(bytes.to_vec());
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, _memory: vk::DeviceMemory) {
        self.destroyed.borrow_mut().push(buffer);
    }
}

// ============================================================================
// Recording encoder
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    BindPipeline(vk::Pipeline),
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<vk::Buffer>,
        offsets: Vec<vk::DeviceSize>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
}

#[derive(Default)]
pub struct RecordingEncoder {
    pub commands: Vec<RecordedCommand>,
}

impl CommandRecorder for RecordingEncoder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.commands.push(RecordedCommand::PushConstants {
            layout,
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        self.commands.push(RecordedCommand::BindVertexBuffers {
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.commands.push(RecordedCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }
}
