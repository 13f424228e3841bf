// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync, plus the bookkeeping that
// decides which fence must be waited on before a swap chain image is reused.

use ash::vk;

use super::VulkanDevice;
use crate::error::Result;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        // Build piecewise so a failure part way through releases what exists
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
        };

        let created = unsafe { sync.create_handles(&device.device, &semaphore_info, &fence_info) };

        if let Err(e) = created {
            sync.destroy(&device.device);
            return Err(e.into());
        }
        Ok(sync)
    }

    unsafe fn create_handles(
        &mut self,
        device: &ash::Device,
        semaphore_info: &vk::SemaphoreCreateInfo,
        fence_info: &vk::FenceCreateInfo,
    ) -> ash::prelude::VkResult<()> {
        self.image_available = device.create_semaphore(semaphore_info, None)?;
        self.render_finished = device.create_semaphore(semaphore_info, None)?;
        self.in_flight_fence = device.create_fence(fence_info, None)?;
        Ok(())
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Tracks which in-flight slot is current and which fence last used each
/// swap chain image.
///
/// The current slot cycles modulo the in-flight count regardless of which
/// image the swap chain hands out, so the two counts are independent.
#[derive(Debug, Clone)]
pub struct InFlightTracker<F> {
    frames_in_flight: usize,
    current_frame: usize,
    images_in_flight: Vec<Option<F>>,
}

impl<F: Copy> InFlightTracker<F> {
    pub fn new(image_count: usize, frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "need at least one frame in flight");
        Self {
            frames_in_flight,
            current_frame: 0,
            images_in_flight: vec![None; image_count],
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Marks `image_index` as used by `fence` and returns the fence of the
    /// frame that used it before, which must complete before the image is
    /// written again.
    pub fn claim_image(&mut self, image_index: usize, fence: F) -> Option<F> {
        self.images_in_flight[image_index].replace(fence)
    }

    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
    }
}
