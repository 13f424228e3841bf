// Shader module loading and management
//
// Vulkan uses SPIR-V bytecode for shaders. This module reads compiled
// shaders from disk and wraps them in shader modules.

use ash::vk;
use std::fs::File;
use std::path::Path;

use super::VulkanDevice;
use crate::error::{RenderError, Result};

/// Read a SPIR-V binary as 32-bit words.
///
/// `read_spv` rejects files whose length is not a multiple of four or that
/// lack the SPIR-V magic number.
pub fn read_shader_file(path: &Path) -> Result<Vec<u32>> {
    let shader_load = |source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(shader_load)?;
    let code = ash::util::read_spv(&mut file).map_err(shader_load)?;

    log::debug!("Loaded shader {} ({} words)", path.display(), code.len());
    Ok(code)
}

pub fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    let module = unsafe { device.device.create_shader_module(&create_info, None) }?;
    Ok(module)
}
