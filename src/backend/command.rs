// Draw command recording
//
// Models and pipelines record into a `CommandRecorder` rather than a raw
// command buffer, so draw logic does not depend on a live device.

use ash::vk;

/// The subset of command recording used by draw code.
pub trait CommandRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
}

/// Records into a Vulkan command buffer that is in the recording state.
pub struct DeviceRecorder<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> DeviceRecorder<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
        }
    }
}

impl CommandRecorder for DeviceRecorder<'_> {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stages, offset, data);
        }
    }

    fn bind_vertex_buffers(
        &mut self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                first_binding,
                buffers,
                offsets,
            );
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }
}
