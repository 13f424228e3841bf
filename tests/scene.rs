// Scene and configuration checks that need no GPU

use approx::assert_relative_eq;
use ash::vk;
use glam::{Mat2, Vec2, Vec3};
use little_renderer::backend::pipeline::PipelineConfig;
use little_renderer::backend::swapchain::{choose_extent, choose_image_count, choose_present_mode};
use little_renderer::backend::sync::InFlightTracker;
use little_renderer::config::Config;
use little_renderer::game_object::{GameObjectIds, Transform2dComponent};
use little_renderer::model::Vertex;
use little_renderer::render_system::{SimplePushConstantData, ROTATION_STEP};
use little_renderer::ClearValues;
use std::f32::consts::TAU;

#[test]
fn sample_config_file_parses() {
    let text = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml"))
        .expect("config.toml ships with the crate");
    let config = Config::parse(&text).unwrap();

    assert!(config.window.width > 0 && config.window.height > 0);
    assert!(config.max_frames_in_flight() >= 1);
    assert_eq!(config.clear_values().depth, ClearValues::default().depth);
}

#[test]
fn triangle_spins_one_step_per_frame() {
    let mut ids = GameObjectIds::new();
    let mut triangle = ids.create_game_object();
    triangle.transform2d.scale = Vec2::new(0.5, 0.5);
    triangle.transform2d.rotation = 0.25 * TAU;

    for _ in 0..100 {
        triangle.transform2d.advance_rotation(ROTATION_STEP);
    }

    assert_relative_eq!(
        triangle.transform2d.rotation,
        0.25 * TAU + 1.0,
        epsilon = 1e-4
    );
}

#[test]
fn push_constants_carry_the_object_transform() {
    let transform = Transform2dComponent {
        translation: Vec2::new(0.2, -0.1),
        scale: Vec2::splat(0.5),
        rotation: 0.0,
    };
    let push = SimplePushConstantData::new(
        transform.mat2(),
        transform.translation,
        Vec3::new(0.1, 0.8, 0.1),
    );

    let bytes = bytemuck::bytes_of(&push);
    assert_eq!(bytes.len(), 48);

    let words: &[f32] = bytemuck::cast_slice(bytes);
    assert_eq!(&words[0..4], &Mat2::from_diagonal(Vec2::splat(0.5)).to_cols_array());
    assert_eq!(&words[4..6], &[0.2, -0.1]);
    assert_eq!(&words[8..11], &[0.1, 0.8, 0.1]);
}

#[test]
fn default_pipeline_reads_vertices_at_binding_zero() {
    let config = PipelineConfig::default_for(vk::RenderPass::null(), vk::PipelineLayout::null());
    let binding = config.binding_descriptions[0];
    assert_eq!(config.binding_descriptions.len(), 1);
    assert_eq!(binding.binding, 0);
    assert_eq!(binding.stride, Vertex::binding_descriptions()[0].stride);
    assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    assert!(config
        .attribute_descriptions
        .iter()
        .all(|attribute| attribute.binding == 0));
}

#[test]
fn surface_negotiation_respects_driver_limits() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 0,
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D {
            width: 16,
            height: 16,
        },
        max_image_extent: vk::Extent2D {
            width: 1920,
            height: 1080,
        },
        ..Default::default()
    };

    assert_eq!(choose_image_count(&capabilities), 2);
    assert_eq!(
        choose_extent(&capabilities, vk::Extent2D { width: 8, height: 600 }),
        vk::Extent2D {
            width: 16,
            height: 600
        }
    );
    assert_eq!(
        choose_present_mode(&[vk::PresentModeKHR::FIFO], vk::PresentModeKHR::MAILBOX),
        vk::PresentModeKHR::FIFO
    );
}

#[test]
fn in_flight_slots_bound_how_far_the_cpu_runs_ahead() {
    let image_count = 3;
    let mut tracker = InFlightTracker::new(image_count, 2);

    let mut waits = Vec::new();
    for frame in 0..6 {
        let slot = tracker.current_frame();
        waits.push(tracker.claim_image(frame % image_count, slot));
        tracker.advance();
    }

    assert_eq!(waits, vec![None, None, None, Some(0), Some(1), Some(0)]);
}
