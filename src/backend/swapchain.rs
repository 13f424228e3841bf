// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen, with
// one depth attachment and framebuffer per image, the render pass they are
// compatible with, and the per-frame sync objects that throttle the CPU.
//
// A replacement chain is built from its predecessor: the old handle is
// passed as `old_swapchain` and the old chain is only dropped once the new
// one is complete.

use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

use super::buffer::{create_depth_attachment, ImageAttachment};
use super::sync::{FrameSync, InFlightTracker};
use super::VulkanDevice;
use crate::error::{RenderError, Result};
use crate::frame::{Acquired, PresentChain, Presentation};

const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

pub struct SwapChain {
    device: Arc<VulkanDevice>,
    swap_chain: vk::SwapchainKHR,
    image_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_attachments: Vec<ImageAttachment>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    frame_sync: Vec<FrameSync>,
    in_flight: InFlightTracker<vk::Fence>,
}

/// Configures and builds a [`SwapChain`].
pub struct SwapChainBuilder {
    device: Arc<VulkanDevice>,
    window_extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    frames_in_flight: usize,
    previous: Option<SwapChain>,
}

impl SwapChainBuilder {
    pub fn new(device: Arc<VulkanDevice>, window_extent: vk::Extent2D) -> Self {
        Self {
            device,
            window_extent,
            present_mode: vk::PresentModeKHR::FIFO,
            frames_in_flight: 2,
            previous: None,
        }
    }

    /// Preferred present mode, used when the surface supports it
    pub fn present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.present_mode = present_mode;
        self
    }

    pub fn frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight.max(1);
        self
    }

    /// Chain being replaced. It is released after the new chain is built.
    pub fn previous(mut self, previous: Option<SwapChain>) -> Self {
        self.previous = previous;
        self
    }

    pub fn build(self) -> Result<SwapChain> {
        let device = self.device;

        // Step 1: Query what the surface supports right now
        let support = device.swap_chain_support()?;
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, self.present_mode);
        let extent = choose_extent(&support.capabilities, self.window_extent);
        let image_count = choose_image_count(&support.capabilities);
        let depth_format = device
            .find_supported_format(
                &DEPTH_FORMAT_CANDIDATES,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or(RenderError::NoSupportedDepthFormat)?;

        // Pipelines built against the old render pass must stay compatible
        if let Some(previous) = &self.previous {
            if previous.image_format != surface_format.format
                || previous.depth_format != depth_format
            {
                log::error!(
                    "Swap chain format changed from {:?}/{:?} to {:?}/{:?}",
                    previous.image_format,
                    previous.depth_format,
                    surface_format.format,
                    depth_format
                );
                return Err(RenderError::SwapChainFormatChanged);
            }
        }

        log::info!(
            "Creating swap chain: {}x{}, present mode {:?}",
            extent.width,
            extent.height,
            present_mode
        );

        // Every handle starts null so Drop releases a partial build
        let mut chain = SwapChain {
            device: device.clone(),
            swap_chain: vk::SwapchainKHR::null(),
            image_format: surface_format.format,
            depth_format,
            extent,
            present_mode,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_attachments: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            frame_sync: Vec::new(),
            in_flight: InFlightTracker::new(0, self.frames_in_flight),
        };

        // Step 2: Swap chain images
        let old_swap_chain = self
            .previous
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |p| p.swap_chain);
        chain.create_swap_chain(
            surface_format,
            &support.capabilities,
            image_count,
            old_swap_chain,
        )?;

        // Step 3: Views, render pass, depth and framebuffers
        chain.create_image_views()?;
        chain.create_render_pass()?;
        chain.create_depth_resources()?;
        chain.create_framebuffers()?;

        // Step 4: Per-frame sync objects
        chain.create_sync_objects(self.frames_in_flight)?;

        log::info!("Created swap chain with {} images", chain.images.len());

        if let Some(previous) = self.previous {
            log::debug!("Releasing previous swap chain");
            drop(previous);
        }

        Ok(chain)
    }
}

impl SwapChain {
    fn create_swap_chain(
        &mut self,
        surface_format: vk::SurfaceFormatKHR,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        image_count: u32,
        old_swap_chain: vk::SwapchainKHR,
    ) -> Result<()> {
        let families = self.device.queue_families;
        let family_indices = [families.graphics, families.present];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.device.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swap_chain);

        create_info = if families.graphics != families.present {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = self.device.swapchain_loader();
        self.swap_chain = unsafe { loader.create_swapchain(&create_info, None) }?;
        self.images = unsafe { loader.get_swapchain_images(self.swap_chain) }?;
        Ok(())
    }

    fn create_image_views(&mut self) -> Result<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.image_format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { self.device.device.create_image_view(&create_info, None) }?;
            self.image_views.push(view);
        }
        Ok(())
    }

    fn create_render_pass(&mut self) -> Result<()> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(self.image_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(self.depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        // Wait for the previous use of the attachments before writing them
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        self.render_pass = unsafe { self.device.device.create_render_pass(&create_info, None) }?;
        Ok(())
    }

    fn create_depth_resources(&mut self) -> Result<()> {
        for _ in 0..self.images.len() {
            let depth = create_depth_attachment(&self.device, self.extent, self.depth_format)?;
            self.depth_attachments.push(depth);
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        for (view, depth) in self.image_views.iter().zip(&self.depth_attachments) {
            let attachments = [*view, depth.view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer =
                unsafe { self.device.device.create_framebuffer(&create_info, None) }?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn create_sync_objects(&mut self, frames_in_flight: usize) -> Result<()> {
        for _ in 0..frames_in_flight {
            let sync = FrameSync::new(&self.device)?;
            self.frame_sync.push(sync);
        }
        self.in_flight = InFlightTracker::new(self.images.len(), frames_in_flight);
        Ok(())
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swap_chain
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent_aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }
}

impl PresentChain for SwapChain {
    type CommandBuffer = vk::CommandBuffer;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire_next_image(&mut self) -> Result<Acquired> {
        let sync = &self.frame_sync[self.in_flight.current_frame()];
        let fence = sync.in_flight_fence;

        unsafe {
            self.device
                .device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(RenderError::Acquire)?;
        }

        let result = unsafe {
            self.device.swapchain_loader().acquire_next_image(
                self.swap_chain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        let acquired = classify_acquire(result)?;

        // The image and its command buffer may still belong to an earlier
        // frame; that frame must finish before recording starts
        if let Acquired::Image { index, .. } = acquired {
            if let Some(previous) = self.in_flight.claim_image(index as usize, fence) {
                if previous != fence {
                    unsafe {
                        self.device
                            .device
                            .wait_for_fences(&[previous], true, u64::MAX)
                            .map_err(RenderError::Acquire)?;
                    }
                }
            }
        }
        Ok(acquired)
    }

    fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<Presentation> {
        let frame = self.in_flight.current_frame();
        let fence = self.frame_sync[frame].in_flight_fence;
        let device = &self.device.device;

        let sync = &self.frame_sync[frame];
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.reset_fences(&[fence]).map_err(RenderError::Submit)?;
            device
                .queue_submit(self.device.graphics_queue, &[submit_info], fence)
                .map_err(RenderError::Submit)?;
        }

        let swap_chains = [self.swap_chain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swap_chains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.device
                .swapchain_loader()
                .queue_present(self.device.present_queue, &present_info)
        };

        self.in_flight.advance();
        classify_present(result)
    }
}

impl Drop for SwapChain {
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);

            for depth in &self.depth_attachments {
                depth.destroy(device);
            }
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }

            self.device
                .swapchain_loader()
                .destroy_swapchain(self.swap_chain, None);
        }

        for sync in &self.frame_sync {
            sync.destroy(device);
        }
    }
}

// ============================================================================
// Surface negotiation
// ============================================================================

/// Prefer B8G8R8A8_SRGB with a non-linear sRGB color space, else the first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or(RenderError::NoSurfaceFormat)
}

// FIFO: Vsync enabled, guaranteed available
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's extent when it dictates one, else the window's clamped
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Driver minimum, bounded by the maximum when there is one (0 = no limit)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count.max(1);
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquired> {
    match result {
        Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
        Err(e) => Err(RenderError::Acquire(e)),
    }
}

fn classify_present(result: VkResult<bool>) -> Result<Presentation> {
    match result {
        Ok(false) => Ok(Presentation::Optimal),
        Ok(true) => Ok(Presentation::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Presentation::OutOfDate),
        Err(e) => Err(RenderError::Present(e)),
    }
}
