// =============================================================================
// LITTLE RENDERER - a minimal Vulkan renderer
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Application loop (poll events, record scene)                   │
// │    └── Renderer (frame protocol, swap chain lifecycle)          │
// │          └── FrameBackend: Vulkan Device + SwapChain            │
// │                └── Command Buffers (one per swap image)         │
// │                      └── Synchronization (fences, semaphores)   │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Acquire swap chain image (wait for the in-flight slot first)
// 2. Begin command buffer and render pass
// 3. Record draws for every game object
// 4. End render pass, submit, present
// 5. Rebuild the swap chain if the surface changed
//
// =============================================================================

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod game_object;
pub mod model;
pub mod render_system;
pub mod renderer;
pub mod window;

#[cfg(test)]
mod mock;

pub use error::{RenderError, Result};
pub use frame::{ActiveFrame, SwapChainState};
pub use renderer::{ClearValues, Renderer};
