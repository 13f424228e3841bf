// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// It includes: vertex input, shaders, rasterization, depth/stencil, blending.
// Viewport and scissor are dynamic state, so a pipeline only depends on the
// render pass format and never has to be rebuilt when the window resizes.

use ash::vk;
use std::path::Path;
use std::sync::Arc;

use super::command::CommandRecorder;
use super::shader::{create_shader_module, read_shader_file};
use super::VulkanDevice;
use crate::error::{RenderError, Result};
use crate::model::Vertex;

/// Fixed-function state for one pipeline.
///
/// The create-info members carry no pointers; arrays they would point to
/// (vertex descriptions, blend attachments, dynamic states) are stored as
/// plain values and linked up in [`Pipeline::new`].
#[derive(Clone)]
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    pub rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    pub multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub pipeline_layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl PipelineConfig {
    /// Opaque, depth-tested triangles with counter-clockwise front faces
    pub fn default_for(render_pass: vk::RenderPass, pipeline_layout: vk::PipelineLayout) -> Self {
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        // Multisampling (disabled)
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false);

        // Color blending (no blending, opaque)
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS) // Closer objects win
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        Self {
            binding_descriptions: Vertex::binding_descriptions(),
            attribute_descriptions: Vertex::attribute_descriptions(),
            input_assembly,
            rasterization,
            multisample,
            color_blend_attachment,
            depth_stencil,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            pipeline_layout,
            render_pass,
            subpass: 0,
        }
    }
}

/// A graphics pipeline and the shader modules it was built from.
pub struct Pipeline {
    device: Arc<VulkanDevice>,
    pipeline: vk::Pipeline,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
}

impl Pipeline {
    pub fn new(
        device: Arc<VulkanDevice>,
        vert_path: &Path,
        frag_path: &Path,
        config: &PipelineConfig,
    ) -> Result<Self> {
        if config.pipeline_layout == vk::PipelineLayout::null() {
            return Err(RenderError::InvalidState(
                "cannot create graphics pipeline without a pipeline layout",
            ));
        }
        if config.render_pass == vk::RenderPass::null() {
            return Err(RenderError::InvalidState(
                "cannot create graphics pipeline without a render pass",
            ));
        }

        // Step 1: Read both shaders before creating anything
        let vert_code = read_shader_file(vert_path)?;
        let frag_code = read_shader_file(frag_path)?;

        // Step 2: Shader modules, owned by `pipeline` from here on
        let mut pipeline = Self {
            device: device.clone(),
            pipeline: vk::Pipeline::null(),
            vert_module: vk::ShaderModule::null(),
            frag_module: vk::ShaderModule::null(),
        };
        pipeline.vert_module = create_shader_module(&device, &vert_code)?;
        pipeline.frag_module = create_shader_module(&device, &frag_code)?;

        // Step 3: The pipeline itself
        pipeline.pipeline = pipeline.create_graphics_pipeline(config)?;

        log::info!(
            "Created graphics pipeline from {} and {}",
            vert_path.display(),
            frag_path.display()
        );
        Ok(pipeline)
    }

    fn create_graphics_pipeline(&self, config: &PipelineConfig) -> Result<vk::Pipeline> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.frag_module)
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.binding_descriptions)
            .vertex_attribute_descriptions(&config.attribute_descriptions);

        // Counts only, the values are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let color_blend_attachments = [config.color_blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0; 4]);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&config.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&config.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&config.rasterization)
            .multisample_state(&config.multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&config.depth_stencil)
            .dynamic_state(&dynamic_state)
            .layout(config.pipeline_layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass)
            .base_pipeline_index(-1);

        let pipelines = unsafe {
            self.device.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        }
        .map_err(|(_, e)| RenderError::PipelineCreate(e))?;

        pipelines
            .into_iter()
            .next()
            .ok_or(RenderError::PipelineCreate(vk::Result::ERROR_UNKNOWN))
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn bind(&self, recorder: &mut dyn CommandRecorder) {
        recorder.bind_pipeline(self.pipeline);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device
                .device
                .destroy_shader_module(self.frag_module, None);
            self.device
                .device
                .destroy_shader_module(self.vert_module, None);
        }
    }
}
