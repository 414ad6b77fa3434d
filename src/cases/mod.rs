//! Test case corpus
//!
//! One module per feature area, each exporting a `group()` that builds its
//! subtree. [`build_root`] assembles the full tree; enumeration order is
//! the insertion order of these calls.

pub mod executable_properties;
pub mod external_memory_host;
pub mod info;
pub mod mesh_shader;
pub mod occlusion;
pub mod primitives_generated;
pub mod wsi;

use crate::dev;
use crate::display;
use crate::graphics;
use crate::memory;
use crate::status::TestError;
use crate::tree::TestCaseGroup;

/// Assemble the full case tree
pub fn build_root(registry: &display::DisplayRegistry) -> TestCaseGroup {
    let mut root = TestCaseGroup::new("vkcts", "Vulkan feature conformance cases");

    root.add_group(info::group());

    let mut query_pool = TestCaseGroup::new("query_pool", "Query pool cases");
    query_pool.add_group(occlusion::group());
    query_pool.add_group(primitives_generated::group());
    root.add_group(query_pool);

    let mut pipeline = TestCaseGroup::new("pipeline", "Pipeline cases");
    pipeline.add_group(executable_properties::group());
    root.add_group(pipeline);

    let mut memory_group = TestCaseGroup::new("memory", "Memory cases");
    memory_group.add_group(external_memory_host::group());
    root.add_group(memory_group);

    root.add_group(mesh_shader::group());
    root.add_group(wsi::group(registry));

    root
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(raw)
}

/// Upload a slice of floats to the start of a host visible buffer
pub(crate) fn upload_f32(buffer: &memory::Buffer, values: &[f32]) -> Result<(), TestError> {
    buffer.write(|data| {
        let bytes = unsafe {
            std::slice::from_raw_parts(
                values.as_ptr() as *const u8,
                std::mem::size_of_val(values),
            )
        };

        data[..bytes.len()].copy_from_slice(bytes);
    })?;

    Ok(())
}

/// Offscreen color target with an optional depth attachment
///
/// The color image ends up in TRANSFER_SRC layout so cases can read it back
pub(crate) struct RenderTarget {
    pub color: memory::Image,
    pub render_pass: graphics::RenderPass,
    pub framebuffer: graphics::Framebuffer,
    /// Owned for as long as the framebuffer references its view
    _depth: Option<memory::Image>,
}

impl RenderTarget {
    pub fn new(
        device: &dev::Device,
        width: u32,
        height: u32,
        with_depth: bool,
    ) -> Result<RenderTarget, TestError> {
        let color = memory::Image::new(
            device,
            &memory::ImageCfg {
                width,
                height,
                format: memory::ImageFormat::R8G8B8A8_UNORM,
                usage: memory::ImageUsageFlags::COLOR_ATTACHMENT
                    | memory::ImageUsageFlags::TRANSFER_SRC,
                aspect: memory::ImageAspect::COLOR,
            },
        )?;

        let depth = if with_depth {
            Some(memory::Image::new(
                device,
                &memory::ImageCfg {
                    width,
                    height,
                    format: memory::ImageFormat::D16_UNORM,
                    usage: memory::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                    aspect: memory::ImageAspect::DEPTH,
                },
            )?)
        } else {
            None
        };

        let render_pass = graphics::RenderPass::single_pass(
            device,
            color.format(),
            depth.as_ref().map(|image| image.format()),
            graphics::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )?;

        let framebuffer = graphics::Framebuffer::new(
            device,
            &graphics::FramebufferCfg {
                render_pass: &render_pass,
                color: &color,
                depth: depth.as_ref(),
            },
        )?;

        Ok(RenderTarget {
            color,
            render_pass,
            framebuffer,
            _depth: depth,
        })
    }
}
