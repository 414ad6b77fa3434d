//! Provide API to GPU command buffers

use ash::vk;

use crate::{dev, memory, compute, graphics, query};

use crate::on_error_ret;

use std::{ptr, cmp};
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Arc;
use std::fmt;

/// AccessType specifies memory access
///
#[doc = "Ash documentation about possible values <https://docs.rs/ash/latest/ash/vk/struct.AccessFlags.html>"]
///
#[doc = "Vulkan documentation <https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/VkAccessFlagBits.html>"]
pub type AccessType = vk::AccessFlags;

/// PipelineStage specifies single pipeline stage
///
#[doc = "Ash documentation about possible values <https://docs.rs/ash/latest/ash/vk/struct.PipelineStageFlags.html>"]
///
#[doc = "Vulkan documentation <https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/VkPipelineStageFlagBits.html>"]
pub type PipelineStage = vk::PipelineStageFlags;

pub struct PoolCfg {
    pub family_index: u32,
}

#[derive(Debug)]
pub enum PoolError {
    /// Failed to
    /// [create](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCreateCommandPool.html)
    /// command pool
    Creating
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vkCreateCommandPool call failed")
    }
}

impl Error for PoolError { }

/// All command buffers are allocated from `Pool`
pub struct Pool {
    i_core: Arc<dev::Core>,
    i_pool: vk::CommandPool
}

impl Pool {
    pub fn new(dev: &dev::Device, pool_cfg: &PoolCfg) -> Result<Pool, PoolError> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            p_next: ptr::null(),
            flags:  vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: pool_cfg.family_index,
            _marker: PhantomData,
        };

        let cmd_pool = on_error_ret!(
            unsafe { dev.device().create_command_pool(&pool_info, dev.allocator()) },
            PoolError::Creating
        );

        Ok(
            Pool {
                i_core: dev.core().clone(),
                i_pool: cmd_pool
            }
        )
    }

    /// Allocate new command buffer
    ///
    /// Returned buffer is already in the recording state
    pub fn allocate(&self) -> Result<Buffer, BufferError> {
        let cmd_buff_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            p_next: ptr::null(),
            command_pool: self.i_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            _marker: PhantomData,
        };

        let cmd_buffers = on_error_ret!(
            unsafe { self.i_core.device().allocate_command_buffers(&cmd_buff_info) },
            BufferError::Creating
        );

        let cmd_begin_info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            p_next: ptr::null(),
            flags:  vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            p_inheritance_info: ptr::null(),
            _marker: PhantomData,
        };

        on_error_ret!(
            unsafe { self.i_core.device().begin_command_buffer(cmd_buffers[0], &cmd_begin_info) },
            BufferError::Begin
        );

        Ok(
            Buffer {
                i_buffer: cmd_buffers[0],
                i_pool: self,
            }
        )
    }

    #[doc(hidden)]
    fn device(&self) -> &ash::Device {
        self.i_core.device()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
        .field("i_core", &self.i_core)
        .field("i_pool", &(&self.i_pool as *const vk::CommandPool))
        .finish()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        unsafe {
            self.i_core.device()
                .destroy_command_pool(
                    self.i_pool, self.i_core.allocator()
                );
        }
    }
}

#[derive(Debug)]
pub enum BufferError {
    /// Failed to
    /// [allocate](https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/vkAllocateCommandBuffers.html)
    /// buffer
    Creating,
    /// Failed to
    /// [initialize](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkBeginCommandBuffer.html)
    /// buffer
    Begin,
    /// Failed to
    /// [complete](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkEndCommandBuffer.html)
    /// buffer
    Commit
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            BufferError::Creating => "vkAllocateCommandBuffers call failed",
            BufferError::Begin => "vkBeginCommandBuffer call failed",
            BufferError::Commit => "vkEndCommandBuffer call failed",
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for BufferError { }

/// Buffer in which you can write commands
///
/// Note: this buffer is not ready for execution "as is"
///
/// For that you have to complete buffer via [`commit`](crate::cmd::Buffer::commit)
pub struct Buffer<'a> {
    i_pool: &'a Pool,
    i_buffer: vk::CommandBuffer
}

impl<'a> Buffer<'a> {
    /// Modify buffer into executable
    ///
    /// Original buffer will not be available
    pub fn commit(self) -> Result<ExecutableBuffer<'a>, BufferError> {
        let dev = self.i_pool.device();

        on_error_ret!(
            unsafe { dev.end_command_buffer(self.i_buffer) },
            BufferError::Commit
        );

        Ok(
            ExecutableBuffer {
                i_buffer: self.i_buffer,
                _marker: PhantomData
            }
        )
    }

    /// Bind specifically *compute* pipeline
    ///
    /// For graphics see [`bind_graphics_pipeline`](Buffer::bind_graphics_pipeline)
    pub fn bind_compute_pipeline(&self, pipe: &compute::Pipeline) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_bind_pipeline(
                self.i_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipe.pipeline()
            );

            dev.cmd_bind_descriptor_sets(
                self.i_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipe.pipeline_layout(),
                0,
                &[pipe.descriptor_set()],
                &[]
            );
        }
    }

    /// Copy `src` buffer into `dst`
    ///
    /// If `dst` has less capacity then copy only first [`dst.size()`](crate::memory::Buffer::size) bytes
    ///
    /// If `src` has less capacity then rest of the `dst` memory will be left intact
    pub fn copy_buffer(&self, src: &memory::Buffer, dst: &memory::Buffer) {
        let dev = self.i_pool.device();

        let copy_info = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: cmp::min(src.size(), dst.size()),
        };

        unsafe {
            dev.cmd_copy_buffer(self.i_buffer, src.buffer(), dst.buffer(), &[copy_info]);
        }
    }

    /// Copy a region of `src` into `dst` at selected offsets
    pub fn copy_buffer_region(
        &self,
        src: &memory::Buffer,
        src_offset: u64,
        dst: &memory::Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        let dev = self.i_pool.device();

        let copy_info = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };

        unsafe {
            dev.cmd_copy_buffer(self.i_buffer, src.buffer(), dst.buffer(), &[copy_info]);
        }
    }

    /// Dispatch work groups
    pub fn dispatch(&self, x: u32, y: u32, z: u32) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_dispatch(self.i_buffer, x, y, z)
        }
    }

    /// Set *buffer* memory barrier
    /// ([see more](https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/VkBufferMemoryBarrier.html))
    ///
    /// `src` is what should be before barrier (e.g. write to memory)
    ///
    /// `dst` is what should be after barrier (e.g. read)
    ///
    /// For more types see [AccessType]
    pub fn set_barrier(&self,
        mem: &memory::Buffer,
        src_type: AccessType,
        dst_type: AccessType,
        src_stage: PipelineStage,
        dst_stage: PipelineStage)
    {
        let dev = self.i_pool.device();

        let mem_barrier = vk::BufferMemoryBarrier {
            s_type: vk::StructureType::BUFFER_MEMORY_BARRIER,
            p_next: ptr::null(),
            src_access_mask: src_type,
            dst_access_mask: dst_type,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            buffer: mem.buffer(),
            offset: 0,
            size: vk::WHOLE_SIZE,
            _marker: PhantomData,
        };

        unsafe {
            dev.cmd_pipeline_barrier(
                self.i_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[mem_barrier],
                &[]
            )
        }
    }

    /// Begin render pass with selected framebuffer
    ///
    /// Color attachment is cleared with `clear_color`,
    /// depth attachment (if any) with `1.0`
    ///
    /// Must be ended with [`end_render_pass`](crate::cmd::Buffer::end_render_pass)
    pub fn begin_render_pass(
        &self,
        rp: &graphics::RenderPass,
        fb: &graphics::Framebuffer,
        clear_color: [f32; 4],
    ) {
        let dev = self.i_pool.device();

        let clear_value = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                }
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                }
            }
        ];

        let render_pass_begin_info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            p_next: ptr::null(),
            render_pass: rp.render_pass(),
            framebuffer: fb.framebuffer(),
            render_area: vk::Rect2D {
                offset: vk::Offset2D {
                    x: 0,
                    y: 0,
                },
                extent: fb.extent(),
            },
            clear_value_count: clear_value.len() as u32,
            p_clear_values: clear_value.as_ptr(),
            _marker: PhantomData,
        };

        unsafe {
            dev.cmd_begin_render_pass(self.i_buffer, &render_pass_begin_info, vk::SubpassContents::INLINE)
        };
    }

    /// Update first vertex binding
    pub fn bind_vertex_buffer(&self, buffer: &memory::Buffer) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_bind_vertex_buffers(self.i_buffer, 0, &[buffer.buffer()], &[0])
        }
    }

    /// Bind specifically *graphics* pipeline
    ///
    /// For compute see [`bind_compute_pipeline`](Buffer::bind_compute_pipeline)
    pub fn bind_graphics_pipeline(&self, pipe: &graphics::Pipeline) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_bind_pipeline(self.i_buffer, vk::PipelineBindPoint::GRAPHICS, pipe.pipeline())
        }
    }

    /// Add `vkCmdDraw` call to the buffer
    ///
    /// About args see [more](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCmdDraw.html)
    pub fn draw(&self, vc: u32, ic: u32, fv: u32, fi: u32) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_draw(self.i_buffer, vc, ic, fv, fi);
        }
    }

    /// End render pass
    ///
    /// Must be after [`begin_render_pass`](crate::cmd::Buffer::begin_render_pass)
    pub fn end_render_pass(&self) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_end_render_pass(self.i_buffer);
        }
    }

    /// Reset queries `[first, first + count)` to the unavailable state
    ///
    /// Must be called outside a render pass and before
    /// [`begin_query`](crate::cmd::Buffer::begin_query) on those queries
    pub fn reset_query_pool(&self, pool: &query::QueryPool, first: u32, count: u32) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_reset_query_pool(self.i_buffer, pool.pool(), first, count);
        }
    }

    /// Begin query with selected index
    ///
    /// `precise` requests an exact occlusion counter
    /// instead of the conservative lower bound
    pub fn begin_query(&self, pool: &query::QueryPool, query: u32, precise: bool) {
        let dev = self.i_pool.device();

        let flags = if precise {
            vk::QueryControlFlags::PRECISE
        } else {
            vk::QueryControlFlags::empty()
        };

        unsafe {
            dev.cmd_begin_query(self.i_buffer, pool.pool(), query, flags);
        }
    }

    /// End query with selected index
    ///
    /// Must be after [`begin_query`](crate::cmd::Buffer::begin_query)
    pub fn end_query(&self, pool: &query::QueryPool, query: u32) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_end_query(self.i_buffer, pool.pool(), query);
        }
    }

    /// Write results of queries `[first, first + count)` into `dst` on the device timeline
    ///
    /// `stride` is in bytes between per-query records, `flags` selects
    /// result width and availability reporting
    pub fn copy_query_pool_results(
        &self,
        pool: &query::QueryPool,
        first: u32,
        count: u32,
        dst: &memory::Buffer,
        offset: u64,
        stride: u64,
        flags: query::ResultFlags,
    ) {
        let dev = self.i_pool.device();

        unsafe {
            dev.cmd_copy_query_pool_results(
                self.i_buffer,
                pool.pool(),
                first,
                count,
                dst.buffer(),
                offset,
                stride,
                flags,
            );
        }
    }

    /// Copy whole image into `dst` buffer
    ///
    /// Image must be in `TRANSFER_SRC_OPTIMAL` layout
    pub fn copy_image_to_buffer(&self, image: &memory::Image, dst: &memory::Buffer) {
        let dev = self.i_pool.device();

        let extent = image.extent();

        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: image.subresource_layers(),
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };

        unsafe {
            dev.cmd_copy_image_to_buffer(
                self.i_buffer,
                image.image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.buffer(),
                &[region],
            );
        }
    }

    #[doc(hidden)]
    pub fn cmd_buffer(&self) -> vk::CommandBuffer {
        self.i_buffer
    }
}

impl<'a> fmt::Debug for Buffer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
        .field("i_pool", self.i_pool)
        .field("i_buffer", &self.i_buffer)
        .finish()
    }
}

/// Buffer which is ready for execution
pub struct ExecutableBuffer<'a> {
    i_buffer: vk::CommandBuffer,
    _marker: PhantomData<&'a Pool>
}

#[doc(hidden)]
impl<'a> ExecutableBuffer<'a> {
    pub fn buffer(&self) -> &vk::CommandBuffer {
        &self.i_buffer
    }
}

impl<'a> fmt::Debug for ExecutableBuffer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableBuffer")
        .field("i_buffer", &self.i_buffer)
        .finish()
    }
}
