//! Shared per-run device context
//!
//! One [`Context`] is created per runner invocation and handed to every
//! case in sequence. It owns the instance, the selected physical device,
//! a logical device with all supported optional features enabled, one
//! universal (graphics + compute) queue and the GLSL compiler.

use ash::vk;
use ash::{ext, khr};

use crate::{dev, hw, layers, libvk, queue, shader};
use crate::extensions;
use crate::on_option;

use std::error::Error;
use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::ptr;

/// Context configuration, maps to the runner CLI
pub struct ContextCfg {
    /// Index into the physical device enumeration order
    pub device_index: usize,
    /// Enable the validation layer and the debug messenger
    pub validation: bool,
}

impl Default for ContextCfg {
    fn default() -> ContextCfg {
        ContextCfg {
            device_index: 0,
            validation: false,
        }
    }
}

/// Optional device features the context was created with
///
/// Each flag is `true` only when the owning extension was enabled
/// and the driver reported the feature
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextFeatures {
    pub pipeline_executable_info: bool,
    pub primitives_generated_query: bool,
    pub primitives_generated_query_with_rasterizer_discard: bool,
    pub primitives_generated_query_with_non_zero_streams: bool,
    pub task_shader: bool,
    pub mesh_shader: bool,
    /// `minImportedHostPointerAlignment`, present when
    /// the external memory host extension is enabled
    pub min_imported_host_pointer_alignment: Option<u64>,
}

#[derive(Debug)]
pub enum ContextError {
    Instance,
    Hardware,
    NoDevice(usize),
    NoQueue,
    Device,
    Compiler,
    Compile(String),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Instance => write!(f, "Failed to create Vulkan instance"),
            ContextError::Hardware => write!(f, "Failed to enumerate physical devices"),
            ContextError::NoDevice(index) => {
                write!(f, "No physical device with index {}", index)
            }
            ContextError::NoQueue => {
                write!(f, "No queue family with graphics and compute support")
            }
            ContextError::Device => write!(f, "Failed to create logical device"),
            ContextError::Compiler => write!(f, "Failed to initialize shader compiler"),
            ContextError::Compile(what) => write!(f, "Shader compilation failed: {}", what),
        }
    }
}

impl Error for ContextError {}

/// Device extensions the context tries to enable when the driver offers them
const WANTED_EXTENSIONS: [&CStr; 4] = [
    khr::pipeline_executable_properties::NAME,
    ext::primitives_generated_query::NAME,
    ext::external_memory_host::NAME,
    ext::mesh_shader::NAME,
];

pub struct Context {
    i_features: ContextFeatures,
    i_extensions: Vec<&'static CStr>,
    i_queue_family: u32,
    i_compiler: shaderc::Compiler,
    i_queue: queue::Queue,
    i_device: dev::Device,
    i_hw: hw::HWDevice,
    i_lib: libvk::Instance,
}

impl Context {
    pub fn new(cfg: &ContextCfg) -> Result<Context, ContextError> {
        let instance_extensions: &[*const c_char] = if cfg.validation {
            &[extensions::DEBUG_EXT_NAME]
        } else {
            &[]
        };

        let lib = libvk::Instance::new(&libvk::InstanceCfg {
            version_major: 1,
            version_minor: 2,
            version_patch: 0,
            debug_layer: if cfg.validation {
                Some(layers::DebugLayer::default())
            } else {
                None
            },
            extensions: instance_extensions,
        })
        .map_err(|_| ContextError::Instance)?;

        let description = hw::Description::poll(&lib).map_err(|_| ContextError::Hardware)?;

        let hw_device = on_option!(
            description.list().nth(cfg.device_index).cloned(),
            return Err(ContextError::NoDevice(cfg.device_index))
        );

        log::info!("using device {}", hw_device.name());

        let family = on_option!(
            hw_device
                .queues()
                .find(|family| family.is_graphics() && family.is_compute()),
            return Err(ContextError::NoQueue)
        );

        let queue_family = family.index();

        let enabled: Vec<&'static CStr> = WANTED_EXTENSIONS
            .iter()
            .copied()
            .filter(|name| hw_device.supports_extension(name))
            .collect();

        for name in &enabled {
            log::debug!("enabling device extension {:?}", name);
        }

        let extension_ptrs: Vec<*const c_char> =
            enabled.iter().map(|name| name.as_ptr()).collect();

        // Feature structs are chained only for extensions the driver offers,
        // first into the query and then unchanged into device creation
        let mut exec_features = vk::PhysicalDevicePipelineExecutablePropertiesFeaturesKHR::default();
        let mut pgq_features = vk::PhysicalDevicePrimitivesGeneratedQueryFeaturesEXT::default();
        let mut mesh_features = vk::PhysicalDeviceMeshShaderFeaturesEXT::default();

        let mut chain_head: *mut c_void = ptr::null_mut();

        if enabled.contains(&khr::pipeline_executable_properties::NAME) {
            exec_features.p_next = chain_head;
            chain_head = &mut exec_features as *mut _ as *mut c_void;
        }

        if enabled.contains(&ext::primitives_generated_query::NAME) {
            pgq_features.p_next = chain_head;
            chain_head = &mut pgq_features as *mut _ as *mut c_void;
        }

        if enabled.contains(&ext::mesh_shader::NAME) {
            mesh_features.p_next = chain_head;
            chain_head = &mut mesh_features as *mut _ as *mut c_void;
        }

        let mut features2 = vk::PhysicalDeviceFeatures2::default();
        features2.p_next = chain_head;

        unsafe {
            lib.instance()
                .get_physical_device_features2(hw_device.device(), &mut features2)
        };

        // These two would require further extensions and features at device
        // creation, and no case here uses them
        mesh_features.multiview_mesh_shader = vk::FALSE;
        mesh_features.primitive_fragment_shading_rate_mesh_shader = vk::FALSE;

        let min_host_alignment = if enabled.contains(&ext::external_memory_host::NAME) {
            let mut host_props = vk::PhysicalDeviceExternalMemoryHostPropertiesEXT::default();
            let mut props2 = vk::PhysicalDeviceProperties2::default();
            props2.p_next = &mut host_props as *mut _ as *mut c_void;

            unsafe {
                lib.instance()
                    .get_physical_device_properties2(hw_device.device(), &mut props2)
            };

            Some(host_props.min_imported_host_pointer_alignment)
        } else {
            None
        };

        let context_features = ContextFeatures {
            pipeline_executable_info: exec_features.pipeline_executable_info == vk::TRUE,
            primitives_generated_query: pgq_features.primitives_generated_query == vk::TRUE,
            primitives_generated_query_with_rasterizer_discard: pgq_features
                .primitives_generated_query_with_rasterizer_discard
                == vk::TRUE,
            primitives_generated_query_with_non_zero_streams: pgq_features
                .primitives_generated_query_with_non_zero_streams
                == vk::TRUE,
            task_shader: mesh_features.task_shader == vk::TRUE,
            mesh_shader: mesh_features.mesh_shader == vk::TRUE,
            min_imported_host_pointer_alignment: min_host_alignment,
        };

        let device = dev::Device::new(&dev::DeviceCfg {
            lib: &lib,
            hw: &hw_device,
            queues_cfg: &[dev::QueueFamilyCfg {
                queue_family_index: queue_family,
                priorities: &[1.0],
            }],
            extensions: &extension_ptrs,
            features: None,
            next: &features2 as *const _ as *const c_void,
            allocator: None,
        })
        .map_err(|_| ContextError::Device)?;

        let universal_queue = queue::Queue::new(
            &device,
            &queue::QueueCfg {
                family_index: queue_family,
                queue_index: 0,
            },
        );

        let compiler = on_option!(shaderc::Compiler::new(), return Err(ContextError::Compiler));

        Ok(Context {
            i_features: context_features,
            i_extensions: enabled,
            i_queue_family: queue_family,
            i_compiler: compiler,
            i_queue: universal_queue,
            i_device: device,
            i_hw: hw_device,
            i_lib: lib,
        })
    }

    pub fn lib(&self) -> &libvk::Instance {
        &self.i_lib
    }

    pub fn hw(&self) -> &hw::HWDevice {
        &self.i_hw
    }

    pub fn device(&self) -> &dev::Device {
        &self.i_device
    }

    /// Universal graphics + compute queue
    pub fn queue(&self) -> &queue::Queue {
        &self.i_queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.i_queue_family
    }

    pub fn features(&self) -> &ContextFeatures {
        &self.i_features
    }

    /// Was the extension enabled at device creation
    pub fn has_device_extension(&self, name: &CStr) -> bool {
        self.i_extensions.iter().any(|ext_name| *ext_name == name)
    }

    /// Compile GLSL into SPIR-V
    ///
    /// Task and mesh stages are compiled as SPIR-V 1.4,
    /// everything else targets the Vulkan 1.2 default
    pub fn compile(
        &self,
        name: &str,
        stage: shader::Stage,
        source: &str,
    ) -> Result<Vec<u32>, ContextError> {
        let mut options = on_option!(
            shaderc::CompileOptions::new(),
            return Err(ContextError::Compiler)
        );

        options.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_2 as u32,
        );

        if matches!(stage, shader::Stage::Task | shader::Stage::Mesh) {
            options.set_target_spirv(shaderc::SpirvVersion::V1_4);
        }

        let artifact = self
            .i_compiler
            .compile_into_spirv(source, stage.shaderc_kind(), name, "main", Some(&options))
            .map_err(|err| ContextError::Compile(err.to_string()))?;

        Ok(artifact.as_binary().to_vec())
    }
}
