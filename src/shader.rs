//! Provide shader handler type

use ash::vk;

use crate::dev;
use crate::on_error_ret;

use std::ffi::CString;
use std::marker::PhantomData;
use std::sync::Arc;
use std::{error, fmt, mem, ptr};

/// Stages a shader module can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
    Compute,
    Task,
    Mesh,
}

impl Stage {
    /// Corresponding single stage bit
    pub fn flags(&self) -> vk::ShaderStageFlags {
        match self {
            Stage::Vertex => vk::ShaderStageFlags::VERTEX,
            Stage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Stage::Compute => vk::ShaderStageFlags::COMPUTE,
            Stage::Task => vk::ShaderStageFlags::TASK_EXT,
            Stage::Mesh => vk::ShaderStageFlags::MESH_EXT,
        }
    }

    pub(crate) fn shaderc_kind(&self) -> shaderc::ShaderKind {
        match self {
            Stage::Vertex => shaderc::ShaderKind::Vertex,
            Stage::Fragment => shaderc::ShaderKind::Fragment,
            Stage::Compute => shaderc::ShaderKind::Compute,
            Stage::Task => shaderc::ShaderKind::Task,
            Stage::Mesh => shaderc::ShaderKind::Mesh,
        }
    }
}

pub struct ShaderCfg<'a> {
    pub stage: Stage,
    /// Name of the entry point in the bytecode
    pub entry: &'a str,
}

#[derive(Debug)]
pub enum ShaderError {
    EntryName,
    Creating,
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            ShaderError::EntryName => "Invalid entry point name (interior NUL byte)",
            ShaderError::Creating => {
                "Failed to create shader module (vkCreateShaderModule call failed)"
            }
        };

        write!(f, "{}", err_msg)
    }
}

impl error::Error for ShaderError {}

/// Shader module created from SPIR-V words
pub struct Shader {
    i_core: Arc<dev::Core>,
    i_module: vk::ShaderModule,
    i_entry: CString,
    i_stage: Stage,
}

impl Shader {
    pub fn new(device: &dev::Device, cfg: &ShaderCfg, code: &[u32]) -> Result<Shader, ShaderError> {
        let entry = on_error_ret!(CString::new(cfg.entry), ShaderError::EntryName);

        let shader_info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::ShaderModuleCreateFlags::empty(),
            code_size: code.len() * mem::size_of::<u32>(),
            p_code: code.as_ptr(),
            _marker: PhantomData,
        };

        let shader_module: vk::ShaderModule = on_error_ret!(
            unsafe { device.device().create_shader_module(&shader_info, device.allocator()) },
            ShaderError::Creating
        );

        Ok(Shader {
            i_core: device.core().clone(),
            i_module: shader_module,
            i_entry: entry,
            i_stage: cfg.stage,
        })
    }

    /// Return reference to name of entry function (point) in shader
    pub fn entry(&self) -> &CString {
        &self.i_entry
    }

    pub fn stage(&self) -> Stage {
        self.i_stage
    }

    #[doc(hidden)]
    pub fn module(&self) -> vk::ShaderModule {
        self.i_module
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_shader_module(self.i_module, self.i_core.allocator());
        }
    }
}
