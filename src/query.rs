//! Query pools and result readback

use ash::vk;

use crate::dev;
use crate::on_error_ret;

use std::error::Error;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::Arc;

/// What a pool counts
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.QueryType.html>"]
pub type QueryType = vk::QueryType;

/// Flags controlling result width, waiting and availability reporting
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.QueryResultFlags.html>"]
pub type ResultFlags = vk::QueryResultFlags;

#[derive(Debug)]
pub enum QueryPoolError {
    Creating,
}

impl fmt::Display for QueryPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to create query pool (vkCreateQueryPool call failed)")
    }
}

impl Error for QueryPoolError {}

pub struct QueryPoolCfg {
    pub query_type: QueryType,
    /// Number of queries in the pool
    pub count: u32,
}

/// Pool of queries of a single type
///
/// Queries **must be** reset before first use
/// (see [`reset_query_pool`](crate::cmd::Buffer::reset_query_pool))
pub struct QueryPool {
    i_core: Arc<dev::Core>,
    i_pool: vk::QueryPool,
    i_count: u32,
}

impl QueryPool {
    pub fn new(device: &dev::Device, cfg: &QueryPoolCfg) -> Result<QueryPool, QueryPoolError> {
        let pool_info = vk::QueryPoolCreateInfo {
            s_type: vk::StructureType::QUERY_POOL_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::QueryPoolCreateFlags::empty(),
            query_type: cfg.query_type,
            query_count: cfg.count,
            pipeline_statistics: vk::QueryPipelineStatisticFlags::empty(),
            _marker: PhantomData,
        };

        let pool = on_error_ret!(
            unsafe { device.device().create_query_pool(&pool_info, device.allocator()) },
            QueryPoolError::Creating
        );

        Ok(QueryPool {
            i_core: device.core().clone(),
            i_pool: pool,
            i_count: cfg.count,
        })
    }

    /// Number of queries in the pool
    pub fn count(&self) -> u32 {
        self.i_count
    }

    /// Read back `count` results starting at `first` with explicit `stride`
    ///
    /// Thin wrapper over
    /// [vkGetQueryPoolResults](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkGetQueryPoolResults.html)
    /// returning the call's own code, `NOT_READY` included
    pub fn fetch_raw(
        &self,
        first: u32,
        count: u32,
        data: &mut [u8],
        stride: u64,
        flags: ResultFlags,
    ) -> vk::Result {
        unsafe {
            (self.i_core.device().fp_v1_0().get_query_pool_results)(
                self.i_core.device().handle(),
                self.i_pool,
                first,
                count,
                data.len(),
                data.as_mut_ptr() as *mut c_void,
                stride,
                flags,
            )
        }
    }

    /// Tightly packed 32-bit results
    ///
    /// With [`ResultFlags::WITH_AVAILABILITY`] each query contributes
    /// a value followed by an availability word
    pub fn fetch_u32(
        &self,
        first: u32,
        count: u32,
        flags: ResultFlags,
    ) -> Result<Vec<u32>, vk::Result> {
        assert!(!flags.contains(vk::QueryResultFlags::TYPE_64));

        let per_query = QueryPool::values_per_query(flags);
        let mut values = vec![0u32; count as usize * per_query];
        let stride = (per_query * mem::size_of::<u32>()) as u64;

        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                values.as_mut_ptr() as *mut u8,
                values.len() * mem::size_of::<u32>(),
            )
        };

        match self.fetch_raw(first, count, bytes, stride, flags) {
            vk::Result::SUCCESS => Ok(values),
            code => Err(code),
        }
    }

    /// Tightly packed 64-bit results
    ///
    /// [`ResultFlags::TYPE_64`] is implied
    pub fn fetch_u64(
        &self,
        first: u32,
        count: u32,
        flags: ResultFlags,
    ) -> Result<Vec<u64>, vk::Result> {
        let flags = flags | vk::QueryResultFlags::TYPE_64;

        let per_query = QueryPool::values_per_query(flags);
        let mut values = vec![0u64; count as usize * per_query];
        let stride = (per_query * mem::size_of::<u64>()) as u64;

        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                values.as_mut_ptr() as *mut u8,
                values.len() * mem::size_of::<u64>(),
            )
        };

        match self.fetch_raw(first, count, bytes, stride, flags) {
            vk::Result::SUCCESS => Ok(values),
            code => Err(code),
        }
    }

    fn values_per_query(flags: ResultFlags) -> usize {
        if flags.contains(vk::QueryResultFlags::WITH_AVAILABILITY) {
            2
        } else {
            1
        }
    }

    #[doc(hidden)]
    pub fn pool(&self) -> vk::QueryPool {
        self.i_pool
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_query_pool(self.i_pool, self.i_core.allocator());
        }
    }
}

impl fmt::Debug for QueryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPool")
        .field("i_pool", &self.i_pool)
        .field("i_count", &self.i_count)
        .finish()
    }
}
