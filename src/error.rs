// Error types for the renderer library
//
// Construction failures are fatal to startup, transient presentation
// results never show up here (the renderer rebuilds the swap chain instead),
// and protocol violations are programming errors reported as InvalidState.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Frame protocol violated (begin/end out of order, foreign command buffer)
    #[error("invalid renderer state: {0}")]
    InvalidState(&'static str),

    #[error("failed to acquire swap chain image: {0}")]
    Acquire(vk::Result),

    #[error("failed to present swap chain image: {0}")]
    Present(vk::Result),

    #[error("failed to submit draw command buffer: {0}")]
    Submit(vk::Result),

    #[error("failed to load shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create graphics pipeline: {0}")]
    PipelineCreate(vk::Result),

    #[error("a model needs at least 3 vertices, got {vertex_count}")]
    InvalidGeometry { vertex_count: usize },

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("no suitable GPU found")]
    NoSuitableGpu,

    #[error("failed to find suitable memory type")]
    NoSuitableMemoryType,

    #[error("surface reports no formats")]
    NoSurfaceFormat,

    #[error("no supported depth attachment format")]
    NoSupportedDepthFormat,

    #[error("swap chain image or depth format changed on rebuild")]
    SwapChainFormatChanged,

    #[error("window error: {0}")]
    Window(String),

    #[error("window was closed")]
    WindowClosed,
}

impl RenderError {
    /// Report a frame-protocol violation loudly and hand back the error.
    pub(crate) fn protocol(message: &'static str) -> Self {
        log::error!("Frame protocol violation: {}", message);
        RenderError::InvalidState(message)
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
