// Vulkan frame backend
//
// Implements the renderer's FrameBackend over a VulkanDevice: command buffers
// come from the device's pool, swap chains from SwapChainBuilder.

use ash::vk;
use std::sync::Arc;

use super::swapchain::{SwapChain, SwapChainBuilder};
use super::VulkanDevice;
use crate::error::{RenderError, Result};
use crate::frame::{FrameBackend, PresentChain};
use crate::renderer::{ClearValues, Renderer};
use crate::window::Window;

pub struct VulkanFrameBackend {
    device: Arc<VulkanDevice>,
    present_mode: vk::PresentModeKHR,
    frames_in_flight: usize,
}

impl VulkanFrameBackend {
    pub fn new(
        device: Arc<VulkanDevice>,
        present_mode: vk::PresentModeKHR,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            device,
            present_mode,
            frames_in_flight,
        }
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }
}

impl FrameBackend for VulkanFrameBackend {
    type CommandBuffer = vk::CommandBuffer;
    type SwapChain = SwapChain;

    fn build_swap_chain(
        &mut self,
        extent: vk::Extent2D,
        previous: Option<SwapChain>,
    ) -> Result<SwapChain> {
        SwapChainBuilder::new(self.device.clone(), extent)
            .present_mode(self.present_mode)
            .frames_in_flight(self.frames_in_flight)
            .previous(previous)
            .build()
    }

    fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.device.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let buffers = unsafe { self.device.device.allocate_command_buffers(&alloc_info) }?;
        log::debug!("Allocated {} command buffers", buffers.len());
        Ok(buffers)
    }

    fn free_command_buffers(&mut self, buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.device
                .device
                .free_command_buffers(self.device.command_pool, buffers);
        }
    }

    fn begin_commands(&mut self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            self.device
                .device
                .begin_command_buffer(command_buffer, &begin_info)?;
        }
        Ok(())
    }

    fn end_commands(&mut self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device.device.end_command_buffer(command_buffer)?;
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        swap_chain: &SwapChain,
        image_index: u32,
        clear: &ClearValues,
    ) -> Result<()> {
        let Some(framebuffer) = swap_chain.framebuffer(image_index) else {
            log::error!("No framebuffer for swap chain image {}", image_index);
            return Err(RenderError::InvalidState("acquired image has no framebuffer"));
        };
        let extent = swap_chain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear.color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: clear.depth,
                    stencil: clear.stencil,
                },
            },
        ];

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(swap_chain.render_pass())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        // Viewport and scissor are dynamic so pipelines survive a resize
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let device = &self.device.device;
        unsafe {
            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[render_area]);
        }
        Ok(())
    }

    fn end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.device.cmd_end_render_pass(command_buffer);
        }
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl<W: Window> Renderer<VulkanFrameBackend, W> {
    /// Render pass of the current swap chain, for building compatible pipelines
    pub fn swap_chain_render_pass(&self) -> Option<vk::RenderPass> {
        self.swap_chain().map(SwapChain::render_pass)
    }
}
