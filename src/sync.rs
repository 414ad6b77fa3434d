//! Syncronization primitives

use ash::vk;

use crate::dev;
use crate::on_error_ret;

use std::sync::Arc;
use std::{error, fmt, ptr};

use std::marker::PhantomData;

#[derive(Debug)]
pub enum FenceError {
    Create,
    Wait,
}

impl fmt::Display for FenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            FenceError::Create => "Failed to create fence (vkCreateFence call failed)",
            FenceError::Wait => "Failed to wait for fence (vkWaitForFences call failed)",
        };

        write!(f, "{}", err_msg)
    }
}

impl error::Error for FenceError {}

pub struct Fence {
    i_core: Arc<dev::Core>,
    i_fence: vk::Fence,
}

impl Fence {
    pub fn new(device: &dev::Device, signaled: bool) -> Result<Fence, FenceError> {
        Fence::from_core(device.core(), signaled)
    }

    pub(crate) fn from_core(core: &Arc<dev::Core>, signaled: bool) -> Result<Fence, FenceError> {
        let fence_create_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            p_next: ptr::null(),
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            _marker: PhantomData,
        };

        let fence = on_error_ret!(
            unsafe { core.device().create_fence(&fence_create_info, core.allocator()) },
            FenceError::Create
        );

        Ok(Fence {
            i_core: core.clone(),
            i_fence: fence,
        })
    }

    /// Block until the fence is signaled or `timeout` nanoseconds passed
    ///
    /// Return `false` on timeout
    pub fn wait(&self, timeout: u64) -> Result<bool, FenceError> {
        match unsafe {
            self.i_core
                .device()
                .wait_for_fences(&[self.i_fence], true, timeout)
        } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(_) => Err(FenceError::Wait),
        }
    }

    #[doc(hidden)]
    pub fn fence(&self) -> vk::Fence {
        self.i_fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_fence(self.i_fence, self.i_core.allocator());
        }
    }
}
