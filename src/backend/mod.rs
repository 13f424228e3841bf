// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics
// The renderer reaches it through the FrameBackend seam; draw code through
// CommandRecorder and BufferAllocator.

pub mod buffer;
pub mod command;
pub mod device;
pub mod frame_backend;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::BufferAllocator;
pub use command::{CommandRecorder, DeviceRecorder};
pub use device::VulkanDevice;
pub use frame_backend::VulkanFrameBackend;
pub use pipeline::{Pipeline, PipelineConfig};
pub use swapchain::{SwapChain, SwapChainBuilder};
