// Model - a vertex buffer uploaded once
//
// Vertices are written to host-visible, host-coherent memory at construction
// and never change afterwards. Scene objects share models through `Arc`.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::sync::Arc;

use crate::backend::buffer::BufferAllocator;
use crate::backend::command::CommandRecorder;
use crate::error::{RenderError, Result};

/// 2D vertex with a per-vertex color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec2, color: Vec3) -> Self {
        Self { position, color }
    }

    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            // Position (location 0)
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            // Color (location 1)
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

pub struct Model {
    allocator: Arc<dyn BufferAllocator>,
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    vertex_count: u32,
}

impl Model {
    /// Upload `vertices` into a new vertex buffer. At least 3 are required.
    pub fn new(allocator: Arc<dyn BufferAllocator>, vertices: &[Vertex]) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(RenderError::InvalidGeometry {
                vertex_count: vertices.len(),
            });
        }

        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let (vertex_buffer, vertex_memory) = allocator.create_buffer(
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        if let Err(e) = allocator.upload(vertex_memory, bytes) {
            allocator.destroy_buffer(vertex_buffer, vertex_memory);
            return Err(e);
        }

        log::debug!("Created model with {} vertices", vertices.len());

        Ok(Self {
            allocator,
            vertex_buffer,
            vertex_memory,
            vertex_count: vertices.len() as u32,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Attach the vertex buffer at binding 0
    pub fn bind(&self, recorder: &mut dyn CommandRecorder) {
        recorder.bind_vertex_buffers(0, &[self.vertex_buffer], &[0]);
    }

    pub fn draw(&self, recorder: &mut dyn CommandRecorder) {
        recorder.draw(self.vertex_count, 1, 0, 0);
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.allocator
            .destroy_buffer(self.vertex_buffer, self.vertex_memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAllocator, RecordedCommand, RecordingEncoder};

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
            Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
        ]
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 8);
    }

    #[test]
    fn two_vertices_are_rejected_before_allocating() {
        let allocator = Arc::new(MockAllocator::default());
        let result = Model::new(allocator.clone(), &triangle()[..2]);

        assert!(matches!(
            result,
            Err(RenderError::InvalidGeometry { vertex_count: 2 })
        ));
        assert!(allocator.created.borrow().is_empty());
    }

    #[test]
    fn vertices_are_uploaded_to_host_coherent_memory() {
        let allocator = Arc::new(MockAllocator::default());
        let vertices = triangle();
        let model = Model::new(allocator.clone(), &vertices).unwrap();

        assert_eq!(model.vertex_count(), 3);
        let created = allocator.created.borrow();
        assert_eq!(created.len(), 1);
        let (size, usage, properties) = created[0];
        assert_eq!(size, 60);
        assert_eq!(usage, vk::BufferUsageFlags::VERTEX_BUFFER);
        assert!(properties.contains(
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        ));
        assert_eq!(
            allocator.uploads.borrow()[0],
            bytemuck::cast_slice::<Vertex, u8>(&vertices).to_vec()
        );
    }

    #[test]
    fn bind_and_draw_record_one_non_indexed_draw() {
        let allocator = Arc::new(MockAllocator::default());
        let model = Model::new(allocator, &triangle()).unwrap();
        let mut encoder = RecordingEncoder::default();

        model.bind(&mut encoder);
        model.draw(&mut encoder);

        assert!(matches!(
            &encoder.commands[0],
            RecordedCommand::BindVertexBuffers { first_binding: 0, buffers, offsets }
                if buffers.len() == 1 && offsets == &[0]
        ));
        assert_eq!(
            encoder.commands[1],
            RecordedCommand::Draw {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }
        );
    }

    #[test]
    fn shared_model_is_released_by_its_last_holder() {
        let allocator = Arc::new(MockAllocator::default());
        let model = Arc::new(Model::new(allocator.clone(), &triangle()).unwrap());
        let second_holder = model.clone();

        drop(model);
        assert!(allocator.destroyed.borrow().is_empty());

        drop(second_holder);
        assert_eq!(allocator.destroyed.borrow().len(), 1);
    }
}
