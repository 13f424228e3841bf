// Buffer and image memory utilities
//
// Provides helpers for creating GPU-accessible memory buffers and
// device-local images.

use ash::vk;

use super::VulkanDevice;
use crate::error::Result;

/// Creates buffers with bound memory and fills host-visible ones.
pub trait BufferAllocator {
    /// Create a buffer of `size` bytes backed by memory with `properties`
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)>;

    /// Map `memory`, copy `bytes` to its start and unmap it again.
    /// The memory must be host visible and host coherent.
    fn upload(&self, memory: vk::DeviceMemory, bytes: &[u8]) -> Result<()>;

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory);
}

impl BufferAllocator for VulkanDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }?;

        let mem_requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory = self
            .find_memory_type(mem_requirements.memory_type_bits, properties)
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::default()
                    .allocation_size(mem_requirements.size)
                    .memory_type_index(memory_type_index);
                Ok(unsafe { self.device.allocate_memory(&alloc_info, None) }?)
            });

        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            self.destroy_buffer(buffer, memory);
            return Err(e.into());
        }

        Ok((buffer, memory))
    }

    fn upload(&self, memory: vk::DeviceMemory, bytes: &[u8]) -> Result<()> {
        unsafe {
            let ptr = self.device.map_memory(
                memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )? as *mut u8;

            ptr.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) {
        unsafe {
            self.device.destroy_buffer(buffer, None);
            self.device.free_memory(memory, None);
        }
    }
}

/// Device-local image with its memory and a full view
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAttachment {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl ImageAttachment {
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Create a depth image, memory, and view covering `extent`
pub fn create_depth_attachment(
    device: &VulkanDevice,
    extent: vk::Extent2D,
    format: vk::Format,
) -> Result<ImageAttachment> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let mut attachment = ImageAttachment::default();
    let created = fill_depth_attachment(device, &mut attachment, &image_info, format);
    if let Err(e) = created {
        attachment.destroy(&device.device);
        return Err(e);
    }
    Ok(attachment)
}

fn fill_depth_attachment(
    device: &VulkanDevice,
    attachment: &mut ImageAttachment,
    image_info: &vk::ImageCreateInfo,
    format: vk::Format,
) -> Result<()> {
    attachment.image = unsafe { device.device.create_image(image_info, None) }?;

    let mem_requirements = unsafe { device.device.get_image_memory_requirements(attachment.image) };
    let memory_type_index = device.find_memory_type(
        mem_requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(mem_requirements.size)
        .memory_type_index(memory_type_index);
    attachment.memory = unsafe { device.device.allocate_memory(&alloc_info, None) }?;

    unsafe {
        device
            .device
            .bind_image_memory(attachment.image, attachment.memory, 0)?;
    }

    let view_info = vk::ImageViewCreateInfo::default()
        .image(attachment.image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    attachment.view = unsafe { device.device.create_image_view(&view_info, None) }?;

    Ok(())
}
