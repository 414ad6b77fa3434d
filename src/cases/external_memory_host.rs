//! Host pointer import cases for VK_EXT_external_memory_host
//!
//! Host memory blocks aligned to `minImportedHostPointerAlignment` are
//! imported as device memory. The copy cases bind a buffer to the import
//! and verify a device copy through the original host allocation.

use crate::case::{TestCase, TestInstance, TestRun};
use crate::cmd;
use crate::context;
use crate::dev;
use crate::hw;
use crate::memory;
use crate::queue;
use crate::status::{TestError, TestStatus};
use crate::tree::TestCaseGroup;
use crate::vk_check;

use ash::ext::external_memory_host;
use ash::vk;

use std::alloc::{self, Layout};
use std::os::raw::c_void;
use std::sync::Arc;

/// Alignments past this limit are treated as a driver defect
const MAX_IMPORT_ALIGNMENT: u64 = 65536;

/// Payload of the copy cases in bytes
const CONTENT_SIZE: u64 = 1024;

/// Aligned block obtained from the host allocator, zero-filled
struct HostAllocation {
    i_ptr: *mut u8,
    i_layout: Layout,
}

impl HostAllocation {
    fn new(size: u64, alignment: u64) -> Result<HostAllocation, TestError> {
        let layout = match Layout::from_size_align(size as usize, alignment as usize) {
            Ok(layout) => layout,
            Err(err) => {
                return Err(TestError::Internal(format!(
                    "invalid host allocation layout: {}",
                    err
                )))
            }
        };

        let ptr = unsafe { alloc::alloc_zeroed(layout) };

        if ptr.is_null() {
            return Err(TestError::Internal(
                "failed to allocate host memory block".to_string(),
            ));
        }

        Ok(HostAllocation {
            i_ptr: ptr,
            i_layout: layout,
        })
    }

    fn ptr(&self) -> *mut c_void {
        self.i_ptr.cast()
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.i_ptr, self.i_layout.size()) }
    }
}

impl Drop for HostAllocation {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.i_ptr, self.i_layout) };
    }
}

/// Device memory imported from a [`HostAllocation`]
struct ImportedMemory {
    i_core: Arc<dev::Core>,
    i_memory: vk::DeviceMemory,
}

impl ImportedMemory {
    fn import(
        device: &dev::Device,
        host: &HostAllocation,
        size: u64,
        memory_type_index: u32,
    ) -> Result<ImportedMemory, TestError> {
        let mut import_info = vk::ImportMemoryHostPointerInfoEXT::default()
            .handle_type(vk::ExternalMemoryHandleTypeFlags::HOST_ALLOCATION_EXT)
            .host_pointer(host.ptr());

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index)
            .push_next(&mut import_info);

        let memory = vk_check!("vkAllocateMemory", unsafe {
            device.device().allocate_memory(&alloc_info, device.allocator())
        })?;

        Ok(ImportedMemory {
            i_core: device.core().clone(),
            i_memory: memory,
        })
    }

    fn memory(&self) -> vk::DeviceMemory {
        self.i_memory
    }
}

impl Drop for ImportedMemory {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .free_memory(self.i_memory, self.i_core.allocator())
        };
    }
}

/// Buffer created for the host allocation handle type, bound manually
struct ExternalBuffer {
    i_core: Arc<dev::Core>,
    i_buffer: vk::Buffer,
}

impl ExternalBuffer {
    fn new(
        device: &dev::Device,
        size: u64,
        usage: vk::BufferUsageFlags,
    ) -> Result<ExternalBuffer, TestError> {
        let mut external_info = vk::ExternalMemoryBufferCreateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::HOST_ALLOCATION_EXT);

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .push_next(&mut external_info);

        let buffer = vk_check!("vkCreateBuffer", unsafe {
            device.device().create_buffer(&buffer_info, device.allocator())
        })?;

        Ok(ExternalBuffer {
            i_core: device.core().clone(),
            i_buffer: buffer,
        })
    }

    fn requirements(&self) -> vk::MemoryRequirements {
        unsafe {
            self.i_core
                .device()
                .get_buffer_memory_requirements(self.i_buffer)
        }
    }

    fn bind(&self, memory: &ImportedMemory, offset: u64) -> Result<(), TestError> {
        vk_check!("vkBindBufferMemory", unsafe {
            self.i_core
                .device()
                .bind_buffer_memory(self.i_buffer, memory.memory(), offset)
        })?;

        Ok(())
    }

    fn buffer(&self) -> vk::Buffer {
        self.i_buffer
    }
}

impl Drop for ExternalBuffer {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_buffer(self.i_buffer, self.i_core.allocator())
        };
    }
}

fn check_extension(ctx: &context::Context) -> Result<(), TestError> {
    if !ctx.has_device_extension(external_memory_host::NAME) {
        return Err(TestError::NotSupported(
            "VK_EXT_external_memory_host not supported".to_string(),
        ));
    }

    Ok(())
}

fn import_alignment(run: &mut TestRun) -> Result<u64, TestError> {
    let alignment = match run.ctx.features().min_imported_host_pointer_alignment {
        Some(alignment) => alignment,
        None => {
            return Err(TestError::NotSupported(
                "VK_EXT_external_memory_host not supported".to_string(),
            ))
        }
    };

    run.log.message(format!(
        "minImportedHostPointerAlignment is {}",
        alignment
    ));

    Ok(alignment)
}

/// memoryTypeBits for a host pointer, validated against the device's
/// memory type count
fn host_pointer_memory_type_bits(
    run: &mut TestRun,
    loader: &external_memory_host::Device,
    pointer: *mut c_void,
) -> Result<u32, TestError> {
    let mut properties = vk::MemoryHostPointerPropertiesEXT::default();

    vk_check!("vkGetMemoryHostPointerPropertiesEXT", unsafe {
        (loader.fp().get_memory_host_pointer_properties_ext)(
            loader.device(),
            vk::ExternalMemoryHandleTypeFlags::HOST_ALLOCATION_EXT,
            pointer,
            &mut properties,
        )
        .result()
    })?;

    let bits = properties.memory_type_bits;

    run.log.message(format!("memoryTypeBits value: {}", bits));

    if bits == 0 {
        return Err(TestError::Internal(
            "vkGetMemoryHostPointerPropertiesEXT reported no memory types".to_string(),
        ));
    }

    let type_count = run.ctx.hw().memory().count() as u32;
    let valid_mask = if type_count >= 32 {
        u32::MAX
    } else {
        (1u32 << type_count) - 1
    };

    if bits & !valid_mask != 0 {
        return Err(TestError::Internal(
            "memoryTypeBits references memory types the device does not have".to_string(),
        ));
    }

    Ok(bits)
}

fn round_up(value: u64, granularity: u64) -> u64 {
    (value + granularity - 1) / granularity * granularity
}

struct SimpleAllocationCase {
    name: String,
    description: String,
    multiplier: u64,
}

impl TestCase for SimpleAllocationCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn check_support(&self, ctx: &context::Context) -> Result<(), TestError> {
        check_extension(ctx)
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(SimpleAllocationInstance {
            multiplier: self.multiplier,
        })
    }
}

struct SimpleAllocationInstance {
    multiplier: u64,
}

impl TestInstance for SimpleAllocationInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let alignment = import_alignment(run)?;

        if alignment > MAX_IMPORT_ALIGNMENT {
            return Ok(TestStatus::fail(
                "minImportedHostPointerAlignment is exceeding the supported limit",
            ));
        }

        let size = alignment * self.multiplier;
        let host = HostAllocation::new(size, alignment)?;

        let loader = external_memory_host::Device::new(
            run.ctx.lib().instance(),
            run.ctx.device().device(),
        );

        let bits = host_pointer_memory_type_bits(run, &loader, host.ptr())?;

        // Any reported type must accept the import
        let index = bits.trailing_zeros();
        let _memory = ImportedMemory::import(run.ctx.device(), &host, size, index)?;

        Ok(TestStatus::pass("Pass"))
    }
}

struct CopyToImportedCase {
    name: String,
    description: String,
    use_offset: bool,
}

impl TestCase for CopyToImportedCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn check_support(&self, ctx: &context::Context) -> Result<(), TestError> {
        check_extension(ctx)
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(CopyToImportedInstance {
            use_offset: self.use_offset,
        })
    }
}

struct CopyToImportedInstance {
    use_offset: bool,
}

impl TestInstance for CopyToImportedInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let alignment = import_alignment(run)?;

        if alignment > MAX_IMPORT_ALIGNMENT {
            return Ok(TestStatus::fail(
                "minImportedHostPointerAlignment is exceeding the supported limit",
            ));
        }

        let device = run.ctx.device();
        let loader = external_memory_host::Device::new(run.ctx.lib().instance(), device.device());

        let pattern: Vec<u8> = (0..CONTENT_SIZE).map(|i| (i % 241) as u8).collect();

        let source = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: CONTENT_SIZE,
                usage: memory::BufferType::TRANSFER_SRC,
                properties: hw::MemoryProperty::HOST_VISIBLE | hw::MemoryProperty::HOST_COHERENT,
            },
        )?;

        source.write(|data| data.copy_from_slice(&pattern))?;

        let dest = ExternalBuffer::new(device, CONTENT_SIZE, vk::BufferUsageFlags::TRANSFER_DST)?;
        let requirements = dest.requirements();

        let bind_offset = if self.use_offset {
            requirements.alignment
        } else {
            0
        };

        let allocation_size = round_up(requirements.size + bind_offset, alignment);
        let host = HostAllocation::new(allocation_size, alignment)?;

        let host_bits = host_pointer_memory_type_bits(run, &loader, host.ptr())?;
        let bits = host_bits & requirements.memory_type_bits;

        if bits == 0 {
            return Err(TestError::NotSupported(
                "Compatible memory type not found".to_string(),
            ));
        }

        let memory = ImportedMemory::import(device, &host, allocation_size, bits.trailing_zeros())?;
        dest.bind(&memory, bind_offset)?;

        let cmd_pool = cmd::Pool::new(
            device,
            &cmd::PoolCfg {
                family_index: run.ctx.queue_family_index(),
            },
        )?;

        let buffer = cmd_pool.allocate()?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: CONTENT_SIZE,
        };

        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::HOST_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(dest.buffer())
            .offset(0)
            .size(vk::WHOLE_SIZE);

        unsafe {
            device
                .device()
                .cmd_copy_buffer(buffer.cmd_buffer(), source.buffer(), dest.buffer(), &[region]);
            device.device().cmd_pipeline_barrier(
                buffer.cmd_buffer(),
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::HOST,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }

        let exec = buffer.commit()?;
        run.ctx.queue().exec(&queue::ExecInfo {
            buffer: &exec,
            timeout: u64::MAX,
        })?;

        let copied = &host.bytes()[bind_offset as usize..][..CONTENT_SIZE as usize];

        if copied != pattern.as_slice() {
            let mismatch = copied
                .iter()
                .zip(pattern.iter())
                .position(|(got, want)| got != want)
                .unwrap_or(0);

            run.log.message(format!(
                "first mismatch at byte {}: got {}, expected {}",
                mismatch, copied[mismatch], pattern[mismatch]
            ));

            return Ok(TestStatus::fail(
                "Imported memory contents do not match the source buffer",
            ));
        }

        Ok(TestStatus::pass("Pass"))
    }
}

pub fn group() -> TestCaseGroup {
    let mut root = TestCaseGroup::new(
        "external_memory_host",
        "VK_EXT_external_memory_host cases",
    );

    let mut simple = TestCaseGroup::new("simple_allocation", "Plain host pointer imports");

    for multiplier in [1u64, 3] {
        simple.add_case(Box::new(SimpleAllocationCase {
            name: format!("min_imported_host_pointer_alignment_x{}", multiplier),
            description: format!(
                "Import a host block of minImportedHostPointerAlignment multiplied by {}",
                multiplier
            ),
            multiplier,
        }));
    }

    root.add_group(simple);

    let mut copy = TestCaseGroup::new(
        "copy_to_imported_buffer",
        "Device copies landing in imported host memory",
    );

    copy.add_case(Box::new(CopyToImportedCase {
        name: "with_zero_offset".to_string(),
        description: "Bind the buffer at offset zero".to_string(),
        use_offset: false,
    }));
    copy.add_case(Box::new(CopyToImportedCase {
        name: "with_non_zero_offset".to_string(),
        description: "Bind the buffer at a non-zero offset".to_string(),
        use_offset: true,
    }));

    root.add_group(copy);

    root
}
