//! Shader module management.
//!
//! This module handles SPIR-V loading and VkShaderModule creation for the
//! vertex and fragment stages of the shape pipelines.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use shapes_rhi::device::Device;
//! use shapes_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), shapes_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/color.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//!
//! let _stage_info = vertex_shader.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// SPIR-V magic number, first word of every module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage.
    Vertex,
    /// Fragment shader stage.
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts raw SPIR-V bytes into little-endian code words.
///
/// # Errors
///
/// Returns [`RhiError::ShaderError`] if the length is not a multiple of four
/// or the first word is not the SPIR-V magic number.
pub fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match code.first() {
        Some(&SPIRV_MAGIC) => Ok(code),
        Some(other) => Err(RhiError::ShaderError(format!(
            "Bad SPIR-V magic number {:#010x}",
            other
        ))),
        None => Err(RhiError::ShaderError("SPIR-V code is empty".to_string())),
    }
}

/// Vulkan shader module wrapper.
///
/// Owns a VkShaderModule together with its stage and entry point.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Shader stage type.
    stage: ShaderStage,
    /// Entry point function name.
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `path` - Path to the compiled `.spv` file
    /// * `stage` - The shader stage
    /// * `entry_point` - Entry point function name (typically "main")
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the SPIR-V data is
    /// malformed, or module creation fails.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid SPIR-V words, the entry
    /// point contains a null byte, or module creation fails.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;

        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        debug!(
            "Created {} shader module with entry point '{}'",
            stage, entry_point
        );

        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the entry point function name.
    #[inline]
    pub fn entry_point(&self) -> &CStr {
        &self.entry_point
    }

    /// Creates the pipeline shader stage info for this module.
    ///
    /// The returned structure borrows from this shader and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_spirv_words_rejects_misaligned() {
        let result = spirv_words(&[0u8; 5]);
        assert!(matches!(result, Err(RhiError::ShaderError(_))));
    }

    #[test]
    fn test_spirv_words_rejects_bad_magic() {
        let result = spirv_words(&[0u8; 8]);
        assert!(matches!(result, Err(RhiError::ShaderError(_))));
    }

    #[test]
    fn test_spirv_words_rejects_empty() {
        assert!(spirv_words(&[]).is_err());
    }

    #[test]
    fn test_spirv_words_little_endian() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0600u32.to_le_bytes());
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0600]);
    }
}
