//! Vulkan Queue handler

use ash::vk;

use std::marker::PhantomData;
use std::sync::Arc;
use std::{error, fmt, ptr};

use crate::on_error_ret;
use crate::{cmd, dev, sync};

pub struct ExecInfo<'a, 'b : 'a> {
    pub buffer: &'a cmd::ExecutableBuffer<'b>,
    /// Max time to wait for completion in nanoseconds
    pub timeout: u64,
}

#[derive(Debug)]
pub enum QueueError {
    /// Failed to
    /// [submit](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkQueueSubmit.html)
    /// queue
    Execution,
    /// Failed to
    /// [create](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkCreateFence.html)
    /// fence
    Fence,
    /// Execution time exceed max time
    Timeout,
    /// Failed to
    /// [wait](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkQueueWaitIdle.html)
    /// for queue
    WaitIdle,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            QueueError::Execution => "Failed to submit queue (vkQueueSubmit call failed)",
            QueueError::Fence => "Failed to create fence (vkCreateFence call failed)",
            QueueError::Timeout => "Queue execution exceeded the time limit",
            QueueError::WaitIdle => "Failed to wait for queue (vkQueueWaitIdle call failed)",
        };

        write!(f, "{}", err_msg)
    }
}

impl error::Error for QueueError {}

/// Information about what queue to allocate
///
/// [`family_index`](crate::queue::QueueCfg::family_index)
/// **must be** one of the defined in [`DeviceCfg`](crate::dev::DeviceCfg)
///
/// [`queue_index`](crate::queue::QueueCfg::queue_index)
/// **must be** less than related queue count
#[doc = "See more: <https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkGetDeviceQueue.html>"]
#[derive(Debug)]
pub struct QueueCfg {
    pub family_index: u32,
    pub queue_index: u32,
}

pub struct Queue {
    i_core: Arc<dev::Core>,
    i_queue: vk::Queue,
    i_family: u32,
}

impl Queue {
    pub fn new(dev: &dev::Device, cfg: &QueueCfg) -> Queue {
        Queue {
            i_core: dev.core().clone(),
            i_queue: unsafe {
                dev.device().get_device_queue(cfg.family_index, cfg.queue_index)
            },
            i_family: cfg.family_index,
        }
    }

    /// Queue family the queue was taken from
    pub fn family_index(&self) -> u32 {
        self.i_family
    }

    /// Submit selected buffer without blocking
    ///
    /// Returned fence signals completion
    pub fn submit(&self, buffer: &cmd::ExecutableBuffer) -> Result<sync::Fence, QueueError> {
        let dev = self.i_core.device();

        let fence = on_error_ret!(
            sync::Fence::from_core(&self.i_core, false),
            QueueError::Fence
        );

        let submit_info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            p_next: ptr::null(),
            wait_semaphore_count: 0,
            p_wait_semaphores: ptr::null(),
            p_wait_dst_stage_mask: ptr::null(),
            command_buffer_count: 1,
            p_command_buffers: buffer.buffer(),
            signal_semaphore_count: 0,
            p_signal_semaphores: ptr::null(),
            _marker: PhantomData,
        };

        on_error_ret!(
            unsafe { dev.queue_submit(self.i_queue, &[submit_info], fence.fence()) },
            QueueError::Execution
        );

        Ok(fence)
    }

    /// Execute selected buffer and wait for completion
    pub fn exec(&self, info: &ExecInfo) -> Result<(), QueueError> {
        let fence = self.submit(info.buffer)?;

        if !on_error_ret!(fence.wait(info.timeout), QueueError::Timeout) {
            return Err(QueueError::Timeout);
        }

        Ok(())
    }

    /// Block until the queue is idle
    pub fn wait_idle(&self) -> Result<(), QueueError> {
        on_error_ret!(
            unsafe { self.i_core.device().queue_wait_idle(self.i_queue) },
            QueueError::WaitIdle
        );

        Ok(())
    }

    #[doc(hidden)]
    pub fn queue(&self) -> vk::Queue {
        self.i_queue
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
        .field("i_queue", &(&self.i_queue as *const vk::Queue))
        .finish()
    }
}
