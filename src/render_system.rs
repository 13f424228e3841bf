// Simple render system
//
// Draws every game object with one pipeline, passing its transform, offset
// and color as push constants.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec2, Vec3};
use std::path::Path;
use std::sync::Arc;

use crate::backend::command::CommandRecorder;
use crate::backend::pipeline::{Pipeline, PipelineConfig};
use crate::backend::VulkanDevice;
use crate::error::Result;
use crate::game_object::GameObject;

/// Radians each object turns per recorded frame
pub const ROTATION_STEP: f32 = 0.01;

const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Push constant block, laid out as the shaders' std430 `Push` block:
/// mat2 at 0, vec2 at 16, vec3 at 32.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    pub transform: Mat2,
    pub offset: Vec2,
    _offset_padding: [f32; 2],
    pub color: Vec3,
    _color_padding: f32,
}

// Vulkan guarantees at least 128 bytes of push constants
const _: () = assert!(std::mem::size_of::<SimplePushConstantData>() <= 128);

impl SimplePushConstantData {
    pub fn new(transform: Mat2, offset: Vec2, color: Vec3) -> Self {
        Self {
            transform,
            offset,
            color,
            ..Self::default()
        }
    }
}

/// Advance each object's rotation and record its draw.
///
/// Objects without a model still rotate but record nothing.
pub fn record_game_objects(
    recorder: &mut dyn CommandRecorder,
    pipeline_layout: vk::PipelineLayout,
    game_objects: &mut [GameObject],
) {
    for object in game_objects.iter_mut() {
        object.transform2d.advance_rotation(ROTATION_STEP);

        let Some(model) = &object.model else {
            continue;
        };

        let push = SimplePushConstantData::new(
            object.transform2d.mat2(),
            object.transform2d.translation,
            object.color,
        );
        recorder.push_constants(pipeline_layout, PUSH_STAGES, 0, bytemuck::bytes_of(&push));
        model.bind(recorder);
        model.draw(recorder);
    }
}

pub struct SimpleRenderSystem {
    device: Arc<VulkanDevice>,
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl SimpleRenderSystem {
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        vert_path: &Path,
        frag_path: &Path,
    ) -> Result<Self> {
        let pipeline_layout = Self::create_pipeline_layout(&device)?;

        let config = PipelineConfig::default_for(render_pass, pipeline_layout);
        let pipeline = match Pipeline::new(device.clone(), vert_path, frag_path, &config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { device.device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    fn create_pipeline_layout(device: &VulkanDevice) -> Result<vk::PipelineLayout> {
        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: PUSH_STAGES,
            offset: 0,
            size: std::mem::size_of::<SimplePushConstantData>() as u32,
        }];

        let layout_info =
            vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges);

        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }?;
        Ok(layout)
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn render_game_objects(
        &self,
        recorder: &mut dyn CommandRecorder,
        game_objects: &mut [GameObject],
    ) {
        self.pipeline.bind(recorder);
        record_game_objects(recorder, self.pipeline_layout, game_objects);
    }
}

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        unsafe {
            self.device
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}
