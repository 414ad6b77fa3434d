//! Graphics pipeline and render pass
//!
//! # RenderPass
//! [`RenderPass`] represents context within graphics pipeline is executed
//!
//! It is defined by 3 components:
//! 1) [subpasses](SubpassInfo)
//! 2) [synchronization between subpasses](SubpassSync)
//! 3) [attachments](AttachmentInfo) which defines what for *all* images are used for

use ash::vk;

use crate::{
    dev,
    memory,
    data_ptr,
    on_error,
    on_error_ret,
    shader
};

use std::convert::Into;
use std::error::Error;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

/// Specify how contents of an attachment are treated at the beginning of a subpass
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.AttachmentLoadOp.html>"]
pub type AttachmentLoadOp = vk::AttachmentLoadOp;

/// Specify how contents of an attachment are treated at the end of a subpass
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.AttachmentStoreOp.html>"]
pub type AttachmentStoreOp = vk::AttachmentStoreOp;

/// Layout of image and image subresources
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.ImageLayout.html>"]
pub type ImageLayout = vk::ImageLayout;

/// Structure specifying an attachment description
#[derive(Debug)]
pub struct AttachmentInfo {
    pub format: memory::ImageFormat,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub stencil_load_op: AttachmentLoadOp,
    pub stencil_store_op: AttachmentStoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl Default for AttachmentInfo {
    fn default() -> Self {
        AttachmentInfo {
            format: memory::ImageFormat::UNDEFINED,
            load_op: AttachmentLoadOp::DONT_CARE,
            store_op: AttachmentStoreOp::DONT_CARE,
            stencil_load_op: AttachmentLoadOp::DONT_CARE,
            stencil_store_op: AttachmentStoreOp::DONT_CARE,
            initial_layout: ImageLayout::UNDEFINED,
            final_layout: ImageLayout::GENERAL,
        }
    }
}

#[doc(hidden)]
impl From<&AttachmentInfo> for vk::AttachmentDescription {
    fn from(info: &AttachmentInfo) -> vk::AttachmentDescription {
        vk::AttachmentDescription {
            flags: vk::AttachmentDescriptionFlags::empty(),
            format: info.format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: info.load_op,
            store_op: info.store_op,
            stencil_load_op: info.stencil_load_op,
            stencil_store_op: info.stencil_store_op,
            initial_layout: info.initial_layout,
            final_layout: info.final_layout,
        }
    }
}

/// Pipeline stages
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.PipelineStageFlags.html>"]
pub type PipelineStage = vk::PipelineStageFlags;

/// Bitmask specifying memory access types that will participate in a memory dependency
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.AccessFlags.html>"]
pub type AccessFlags = vk::AccessFlags;

pub const SUBPASS_EXTERNAL: u32 = vk::SUBPASS_EXTERNAL;

pub const NO_ATTACHMENT: u32 = vk::ATTACHMENT_UNUSED;

/// Essentially SubpassSync acts like a memory barrier between two (previous and next) subpasses
#[derive(Debug)]
pub struct SubpassSync {
    /// Index of previous subpass in [`RenderPassCfg::subpasses`] or [`SUBPASS_EXTERNAL`]
    pub src_subpass: u32,
    /// Index of next subpass in [`RenderPassCfg::subpasses`] or [`SUBPASS_EXTERNAL`]
    pub dst_subpass: u32,
    /// Pipeline stage during which a given attachment was used before
    pub src_stage: PipelineStage,
    /// Pipeline stage during which a given attachment will be used later
    pub dst_stage: PipelineStage,
    /// Types of memory operations that occurred in a src subpass or before a render pass
    pub src_access: AccessFlags,
    /// Types of memory operations that occurred in a dst subpass or after a render pass
    pub dst_access: AccessFlags,
}

#[doc(hidden)]
impl From<&SubpassSync> for vk::SubpassDependency {
    fn from(sync: &SubpassSync) -> vk::SubpassDependency {
        vk::SubpassDependency {
            src_subpass: sync.src_subpass,
            dst_subpass: sync.dst_subpass,
            src_stage_mask: sync.src_stage,
            dst_stage_mask: sync.dst_stage,
            src_access_mask: sync.src_access,
            dst_access_mask: sync.dst_access,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        }
    }
}

#[derive(Debug)]
struct SubpassView {
    pub depth_attachment: vk::AttachmentReference,
    pub resolve_attachment: Vec<vk::AttachmentReference>,
    pub color_attachment: Vec<vk::AttachmentReference>,
    pub input_attachment: Vec<vk::AttachmentReference>,
    pub preserve_attachments: Vec<u32>,
}

#[doc(hidden)]
impl<'a> From<&'a SubpassView> for vk::SubpassDescription<'a> {
    fn from(view: &'a SubpassView) -> Self {
        vk::SubpassDescription {
            flags: vk::SubpassDescriptionFlags::empty(),
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            input_attachment_count: view.input_attachment.len() as u32,
            p_input_attachments: data_ptr!(view.input_attachment),
            color_attachment_count: view.color_attachment.len() as u32,
            p_color_attachments: data_ptr!(view.color_attachment),
            p_resolve_attachments: data_ptr!(view.resolve_attachment),
            p_depth_stencil_attachment: &view.depth_attachment,
            preserve_attachment_count: view.preserve_attachments.len() as u32,
            p_preserve_attachments: data_ptr!(view.preserve_attachments),
            _marker: PhantomData,
        }
    }
}

/// `Subpass` configuration
///
/// All information about [valid usage](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkSubpassDescription.html)
///
/// Note: [`SubpassInfo::resolve_attachments`] **must be** `&[]` or same length as [`SubpassInfo::color_attachments`]
#[derive(Debug)]
pub struct SubpassInfo<'a> {
    pub input_attachments: &'a [u32],
    pub color_attachments: &'a [u32],
    pub resolve_attachments: &'a [u32],
    pub depth_stencil_attachment: u32,
    pub preserve_attachments: &'a [u32],
}

impl<'a> Default for SubpassInfo<'a> {
    fn default() -> SubpassInfo<'a> {
        SubpassInfo {
            input_attachments: &[],
            color_attachments: &[],
            resolve_attachments: &[],
            depth_stencil_attachment: NO_ATTACHMENT,
            preserve_attachments: &[],
        }
    }
}

#[doc(hidden)]
impl From<&SubpassInfo<'_>> for SubpassView {
    fn from(info: &SubpassInfo) -> Self {
        let input_attch: Vec<vk::AttachmentReference> = info
            .input_attachments
            .iter()
            .map(|&i| vk::AttachmentReference {
                attachment: i,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();

        let color_attch: Vec<vk::AttachmentReference> = info
            .color_attachments
            .iter()
            .map(|&i| vk::AttachmentReference {
                attachment: i,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();

        let resolve_attch: Vec<vk::AttachmentReference> = info
            .resolve_attachments
            .iter()
            .map(|&i| vk::AttachmentReference {
                attachment: i,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();

        let depth_attch = vk::AttachmentReference {
            attachment: info.depth_stencil_attachment,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        SubpassView {
            depth_attachment: depth_attch,
            resolve_attachment: resolve_attch,
            color_attachment: color_attch,
            input_attachment: input_attch,
            preserve_attachments: info.preserve_attachments.to_vec(),
        }
    }
}

#[derive(Debug)]
pub enum RenderPassError {
    /// Error was returned as a result of `vkCreateRenderPass`
    /// [call](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCreateRenderPass.html)
    Creation,
}

impl fmt::Display for RenderPassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vkCreateRenderPass call failed")
    }
}

impl Error for RenderPassError { }

/// [`RenderPass`] configuration
pub struct RenderPassCfg<'a, 'b: 'a> {
    pub device: &'b dev::Device,
    pub attachments: &'a [AttachmentInfo],
    pub sync_info: &'a [SubpassSync],
    pub subpasses: &'a [SubpassInfo<'b>],
}

/// Context for executing graphics pipeline
pub struct RenderPass {
    i_core: Arc<dev::Core>,
    i_rp: vk::RenderPass,
}

impl RenderPass {
    pub fn new(cfg: &RenderPassCfg) -> Result<RenderPass, RenderPassError> {
        let dependencies: Vec<vk::SubpassDependency> = cfg
            .sync_info
            .iter()
            .map(|x| x.into())
            .collect();

        let attachments: Vec<vk::AttachmentDescription> = cfg
            .attachments
            .iter()
            .map(|x| x.into())
            .collect();

        let subpasses_slice: Vec<SubpassView> = cfg
            .subpasses
            .iter()
            .map(|x| x.into())
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = subpasses_slice
            .iter()
            .map(|x| x.into())
            .collect();

        let render_pass_create_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::RenderPassCreateFlags::empty(),
            attachment_count: attachments.len() as u32,
            p_attachments: data_ptr!(attachments),
            subpass_count: subpasses.len() as u32,
            p_subpasses: data_ptr!(subpasses),
            dependency_count: dependencies.len() as u32,
            p_dependencies: data_ptr!(dependencies),
            _marker: PhantomData,
        };

        let rp = on_error_ret!(
            unsafe {
                cfg.device
                    .device()
                    .create_render_pass(&render_pass_create_info, cfg.device.allocator())
            },
            RenderPassError::Creation
        );

        Ok(RenderPass {
            i_core: cfg.device.core().clone(),
            i_rp: rp,
        })
    }

    /// [`RenderPass`] with a single subpass over a color attachment
    /// and an optional depth attachment
    ///
    /// Both are cleared on load; the color attachment keeps its content
    /// and ends up in `final_layout`
    pub fn single_pass(
        dev: &dev::Device,
        color_format: memory::ImageFormat,
        depth_format: Option<memory::ImageFormat>,
        final_layout: ImageLayout,
    ) -> Result<RenderPass, RenderPassError> {
        let mut attachments = vec![AttachmentInfo {
            format: color_format,
            load_op: AttachmentLoadOp::CLEAR,
            store_op: AttachmentStoreOp::STORE,
            initial_layout: ImageLayout::UNDEFINED,
            final_layout,
            ..AttachmentInfo::default()
        }];

        if let Some(format) = depth_format {
            attachments.push(AttachmentInfo {
                format,
                load_op: AttachmentLoadOp::CLEAR,
                store_op: AttachmentStoreOp::DONT_CARE,
                initial_layout: ImageLayout::UNDEFINED,
                final_layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..AttachmentInfo::default()
            });
        }

        let sync_info = [
            SubpassSync {
                src_subpass: SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage: PipelineStage::BOTTOM_OF_PIPE,
                dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStage::EARLY_FRAGMENT_TESTS,
                src_access: AccessFlags::MEMORY_READ,
                dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            },
            SubpassSync {
                src_subpass: 0,
                dst_subpass: SUBPASS_EXTERNAL,
                src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStage::LATE_FRAGMENT_TESTS,
                dst_stage: PipelineStage::TRANSFER,
                src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access: AccessFlags::TRANSFER_READ,
            },
        ];

        let subpasses = [SubpassInfo {
            color_attachments: &[0],
            depth_stencil_attachment: if depth_format.is_some() { 1 } else { NO_ATTACHMENT },
            ..SubpassInfo::default()
        }];

        RenderPass::new(&RenderPassCfg {
            device: dev,
            attachments: &attachments,
            sync_info: &sync_info,
            subpasses: &subpasses,
        })
    }

    #[doc(hidden)]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.i_rp
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_render_pass(self.i_rp, self.i_core.allocator());
        }
    }
}

#[derive(Debug)]
pub enum FramebufferError {
    Creating,
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to create framebuffer (vkCreateFramebuffer call failed)")
    }
}

impl Error for FramebufferError {}

/// Attachments for one [`RenderPass`] execution
///
/// Images **must match** what the render pass was created with
pub struct FramebufferCfg<'a> {
    pub render_pass: &'a RenderPass,
    pub color: &'a memory::Image,
    pub depth: Option<&'a memory::Image>,
}

pub struct Framebuffer {
    i_core: Arc<dev::Core>,
    i_fb: vk::Framebuffer,
    i_extent: vk::Extent2D,
}

impl Framebuffer {
    pub fn new(device: &dev::Device, cfg: &FramebufferCfg) -> Result<Framebuffer, FramebufferError> {
        let mut views = vec![cfg.color.view()];

        if let Some(depth) = cfg.depth {
            views.push(depth.view());
        }

        let extent = cfg.color.extent();

        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::FramebufferCreateFlags::empty(),
            render_pass: cfg.render_pass.render_pass(),
            attachment_count: views.len() as u32,
            p_attachments: views.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            _marker: PhantomData,
        };

        let fb = on_error_ret!(
            unsafe { device.device().create_framebuffer(&fb_info, device.allocator()) },
            FramebufferError::Creating
        );

        Ok(Framebuffer {
            i_core: device.core().clone(),
            i_fb: fb,
            i_extent: extent,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.i_extent
    }

    #[doc(hidden)]
    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.i_fb
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_framebuffer(self.i_fb, self.i_core.allocator());
        }
    }
}

#[derive(Debug)]
pub enum CacheError {
    Creating,
    Data,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            CacheError::Creating => {
                "Failed to create pipeline cache (vkCreatePipelineCache call failed)"
            }
            CacheError::Data => {
                "Failed to read pipeline cache (vkGetPipelineCacheData call failed)"
            }
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for CacheError {}

/// Driver managed pipeline cache
///
/// Pass empty `initial_data` for a cold cache
pub struct PipelineCache {
    i_core: Arc<dev::Core>,
    i_cache: vk::PipelineCache,
}

impl PipelineCache {
    pub fn new(device: &dev::Device, initial_data: &[u8]) -> Result<PipelineCache, CacheError> {
        let cache_info = vk::PipelineCacheCreateInfo {
            s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineCacheCreateFlags::empty(),
            initial_data_size: initial_data.len(),
            p_initial_data: if initial_data.is_empty() {
                ptr::null()
            } else {
                initial_data.as_ptr() as *const c_void
            },
            _marker: PhantomData,
        };

        let cache = on_error_ret!(
            unsafe { device.device().create_pipeline_cache(&cache_info, device.allocator()) },
            CacheError::Creating
        );

        Ok(PipelineCache {
            i_core: device.core().clone(),
            i_cache: cache,
        })
    }

    /// Serialized cache content
    pub fn data(&self) -> Result<Vec<u8>, CacheError> {
        let data = on_error_ret!(
            unsafe { self.i_core.device().get_pipeline_cache_data(self.i_cache) },
            CacheError::Data
        );

        Ok(data)
    }

    #[doc(hidden)]
    pub fn cache(&self) -> vk::PipelineCache {
        self.i_cache
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_pipeline_cache(self.i_cache, self.i_core.allocator());
        }
    }
}

/// Configuration of pipeline's vertex stage input
///
/// Example
///
/// ```ignore
///     // part of vertex shader code
///     layout(location = 0) in vec4 Position;
///     layout(location = 1) in vec4 Color;
///
///     // ...
/// ```
/// And corresponding configuration
/// ```
/// // Vertex
/// use vkcts::memory::ImageFormat;
/// use vkcts::graphics::VertexInputCfg;
///
/// struct Vertex {
///     pos: [f32; 4],
///     color: [f32; 4],
/// }
///
/// let cfg = [
///     // Position
///     VertexInputCfg {
///         location: 0,
///         binding: 0,
///         format: ImageFormat::R32G32B32A32_SFLOAT,
///         offset: 0,
///     },
///     // Color
///     VertexInputCfg {
///         location: 1,
///         binding: 0,
///         format: ImageFormat::R32G32B32A32_SFLOAT,
///         offset: std::mem::size_of::<[f32; 4]>() as u32,
///     }
/// ];
///
/// ```
pub struct VertexInputCfg {
    /// Index of an attribute, the same as defined by the location layout specifier in a shader source code
    pub location: u32,
    /// The number of the slot from which data should be read
    pub binding: u32,
    /// Data type and number of components per attribute
    pub format: memory::ImageFormat,
    /// Beginning of data for a given attribute
    pub offset: u32,
}

impl Default for VertexInputCfg {
    fn default() -> VertexInputCfg {
        VertexInputCfg {
            location: 0,
            binding: 0,
            format: memory::ImageFormat::UNDEFINED,
            offset: 0,
        }
    }
}

#[doc(hidden)]
impl From<&VertexInputCfg> for vk::VertexInputAttributeDescription {
    fn from(cfg: &VertexInputCfg) -> Self {
        vk::VertexInputAttributeDescription {
            location: cfg.location,
            binding: cfg.binding,
            format: cfg.format,
            offset: cfg.offset,
        }
    }
}

/// Describe how vertices should be assembled into primitives
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.PrimitiveTopology.html>"]
pub type Topology = vk::PrimitiveTopology;

pub struct PipelineCfg<'a> {
    pub device: &'a dev::Device,
    pub vertex_shader: &'a shader::Shader,
    /// Size of every vertex in bytes, `0` for a pipeline without vertex input
    pub vertex_size: u32,
    pub vert_input: &'a [VertexInputCfg],
    /// `None` for a vertex-only pipeline (e.g. with rasterizer discard)
    pub frag_shader: Option<&'a shader::Shader>,
    pub topology: Topology,
    pub extent: memory::Extent2D,
    pub render_pass: &'a RenderPass,
    /// Subpass index inside [`RenderPass`](PipelineCfg::render_pass)
    pub subpass_index: u32,
    /// Depth test and write against the render pass depth attachment
    pub enable_depth_test: bool,
    /// Cut the pipeline before rasterization
    pub rasterizer_discard: bool,
    pub flags: vk::PipelineCreateFlags,
    pub cache: Option<&'a PipelineCache>,
}

#[derive(Debug)]
pub enum PipelineError {
    /// Failed to create pipeline layout
    Layout,
    /// Failed to create pipeline
    Pipeline
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Layout => write!(f, "vkCreatePipelineLayout call failed"),
            PipelineError::Pipeline => write!(f, "vkCreateGraphicsPipelines call failed"),
        }
    }
}

impl Error for PipelineError { }

pub struct Pipeline {
    i_core: Arc<dev::Core>,
    i_layout: vk::PipelineLayout,
    i_pipeline: vk::Pipeline,
}

impl Pipeline {
    pub fn new(pipe_cfg: &PipelineCfg) -> Result<Pipeline, PipelineError> {
        let mut shader_stage_create_infos = vec![vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineShaderStageCreateFlags::empty(),
            stage: pipe_cfg.vertex_shader.stage().flags(),
            module: pipe_cfg.vertex_shader.module(),
            p_name: pipe_cfg.vertex_shader.entry().as_ptr(),
            p_specialization_info: ptr::null(),
            _marker: PhantomData,
        }];

        if let Some(frag_shader) = pipe_cfg.frag_shader {
            shader_stage_create_infos.push(vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                p_next: ptr::null(),
                flags: vk::PipelineShaderStageCreateFlags::empty(),
                stage: frag_shader.stage().flags(),
                module: frag_shader.module(),
                p_name: frag_shader.entry().as_ptr(),
                p_specialization_info: ptr::null(),
                _marker: PhantomData,
            });
        }

        let vertex_binding_descriptions: Vec<vk::VertexInputBindingDescription> =
            if pipe_cfg.vertex_size != 0 {
                vec![vk::VertexInputBindingDescription {
                    binding: 0,
                    stride: pipe_cfg.vertex_size,
                    input_rate: vk::VertexInputRate::VERTEX,
                }]
            } else {
                Vec::new()
            };

        let vertex_attribute_descriptions: Vec<vk::VertexInputAttributeDescription> =
            pipe_cfg.vert_input.iter().map(|x| x.into()).collect();

        let vertex_input_state_create_info = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineVertexInputStateCreateFlags::empty(),
            vertex_binding_description_count: vertex_binding_descriptions.len() as u32,
            p_vertex_binding_descriptions: data_ptr!(vertex_binding_descriptions),
            vertex_attribute_description_count: vertex_attribute_descriptions.len() as u32,
            p_vertex_attribute_descriptions: data_ptr!(vertex_attribute_descriptions),
            _marker: PhantomData,
        };

        let input_assembly_state_create_info = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineInputAssemblyStateCreateFlags::empty(),
            topology: pipe_cfg.topology,
            primitive_restart_enable: ash::vk::FALSE,
            _marker: PhantomData,
        };

        let viewports = [vk::Viewport {
            x: 0_f32,
            y: 0_f32,
            width: pipe_cfg.extent.width as f32,
            height: pipe_cfg.extent.height as f32,
            min_depth: 0_f32,
            max_depth: 1_f32,
        }];

        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: pipe_cfg.extent,
        }];

        let viewport_state_create_info = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineViewportStateCreateFlags::empty(),
            viewport_count: viewports.len() as u32,
            p_viewports: data_ptr!(viewports),
            scissor_count: scissors.len() as u32,
            p_scissors: data_ptr!(scissors),
            _marker: PhantomData,
        };

        let rasterization_state_create_info = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineRasterizationStateCreateFlags::empty(),
            depth_clamp_enable: ash::vk::FALSE,
            rasterizer_discard_enable: if pipe_cfg.rasterizer_discard {
                ash::vk::TRUE
            } else {
                ash::vk::FALSE
            },
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias_enable: ash::vk::FALSE,
            depth_bias_constant_factor: 0.0,
            depth_bias_clamp: 0.0,
            depth_bias_slope_factor: 0.0,
            line_width: 1.0,
            _marker: PhantomData,
        };

        let multisample_state_create_info = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineMultisampleStateCreateFlags::empty(),
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            sample_shading_enable: ash::vk::FALSE,
            min_sample_shading: 1.0,
            p_sample_mask: ptr::null(),
            alpha_to_coverage_enable: ash::vk::FALSE,
            alpha_to_one_enable: ash::vk::FALSE,
            _marker: PhantomData,
        };

        let stencil_op_state = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            compare_mask: 0,
            write_mask: 0,
            reference: 0,
        };

        let depth_stencil_state_create_info = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineDepthStencilStateCreateFlags::empty(),
            depth_test_enable: ash::vk::TRUE,
            depth_write_enable: ash::vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            depth_bounds_test_enable: ash::vk::FALSE,
            stencil_test_enable: ash::vk::FALSE,
            front: stencil_op_state,
            back: stencil_op_state,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
            _marker: PhantomData,
        };

        let color_blend_attachment_state = vk::PipelineColorBlendAttachmentState {
            blend_enable: ash::vk::FALSE,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        };

        let color_blend_state_create_info = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineColorBlendStateCreateFlags::empty(),
            logic_op_enable: ash::vk::FALSE,
            logic_op: vk::LogicOp::COPY,
            attachment_count: 1,
            p_attachments: &color_blend_attachment_state,
            blend_constants: [0.0; 4],
            _marker: PhantomData,
        };

        let layout_create_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::PipelineLayoutCreateFlags::empty(),
            set_layout_count: 0,
            p_set_layouts: ptr::null(),
            push_constant_range_count: 0,
            p_push_constant_ranges: ptr::null(),
            _marker: PhantomData,
        };

        let pipeline_layout = on_error_ret!(
            unsafe {
                pipe_cfg
                    .device
                    .device()
                    .create_pipeline_layout(&layout_create_info, pipe_cfg.device.allocator())
            },
            PipelineError::Layout
        );

        // With rasterizer discard everything past the vertex stage is cut,
        // so the fragment-related state must stay unset
        let discard = pipe_cfg.rasterizer_discard;

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            p_next: ptr::null(),
            flags: pipe_cfg.flags,
            stage_count: shader_stage_create_infos.len() as u32,
            p_stages: shader_stage_create_infos.as_ptr(),
            p_vertex_input_state: &vertex_input_state_create_info,
            p_input_assembly_state: &input_assembly_state_create_info,
            p_tessellation_state: ptr::null(),
            p_viewport_state: if discard {
                ptr::null()
            } else {
                &viewport_state_create_info
            },
            p_rasterization_state: &rasterization_state_create_info,
            p_multisample_state: if discard {
                ptr::null()
            } else {
                &multisample_state_create_info
            },
            p_depth_stencil_state: if pipe_cfg.enable_depth_test && !discard {
                &depth_stencil_state_create_info
            } else {
                ptr::null()
            },
            p_color_blend_state: if discard {
                ptr::null()
            } else {
                &color_blend_state_create_info
            },
            p_dynamic_state: ptr::null(),
            layout: pipeline_layout,
            render_pass: pipe_cfg.render_pass.render_pass(),
            subpass: pipe_cfg.subpass_index,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
            _marker: PhantomData,
        };

        let cache_handle = match pipe_cfg.cache {
            Some(cache) => cache.cache(),
            None => vk::PipelineCache::null(),
        };

        let pipelines = unsafe { on_error!(
            pipe_cfg.device.device().create_graphics_pipelines(
                cache_handle,
                &[pipeline_create_info],
                pipe_cfg.device.allocator()
            ),
            {
                pipe_cfg
                    .device
                    .device()
                    .destroy_pipeline_layout(pipeline_layout, pipe_cfg.device.allocator());
                return Err(PipelineError::Pipeline);
            }
        )};

        Ok(Pipeline {
            i_core: pipe_cfg.device.core().clone(),
            i_layout: pipeline_layout,
            i_pipeline: pipelines[0],
        })
    }

    #[doc(hidden)]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.i_layout
    }

    #[doc(hidden)]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.i_pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_pipeline(self.i_pipeline, self.i_core.allocator());
            self.i_core
                .device()
                .destroy_pipeline_layout(self.i_layout, self.i_core.allocator());
        }
    }
}
