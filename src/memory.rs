//! Provide memory allocation functions

use ash::vk;

use crate::{dev, hw};
use crate::{on_error, on_option, on_error_ret};

use std::error::Error;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

/// Ash type which representes buffer usage
///
#[doc = "Ash documentation <https://docs.rs/ash/latest/ash/vk/struct.BufferUsageFlags.html>"]
///
#[doc = "Vulkan documentation <https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/VkBufferUsageFlagBits.html>"]
pub type BufferType = vk::BufferUsageFlags;
#[doc(hidden)]
pub type BufferDescriptor = vk::DescriptorBufferInfo;

/// Image and vertex attribute formats
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.Format.html>"]
pub type ImageFormat = vk::Format;

/// What an image is used for
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.ImageUsageFlags.html>"]
pub type ImageUsageFlags = vk::ImageUsageFlags;

/// Which aspects of an image views and copies address
///
#[doc = "Possible values: <https://docs.rs/ash/latest/ash/vk/struct.ImageAspectFlags.html>"]
pub type ImageAspect = vk::ImageAspectFlags;

pub type Extent2D = vk::Extent2D;

#[derive(Debug)]
pub enum MemoryError {
    Buffer,
    Image,
    ImageView,
    DeviceMemory,
    NoMemoryType,
    MapAccess,
    Flush,
    Bind,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            MemoryError::Buffer => "Failed to create buffer (vkCreateBuffer call failed)",
            MemoryError::Image => "Failed to create image (vkCreateImage call failed)",
            MemoryError::ImageView => {
                "Failed to create image view (vkCreateImageView call failed)"
            }
            MemoryError::DeviceMemory => {
                "Failed to allocate memory (vkAllocateMemory call failed)"
            }
            MemoryError::NoMemoryType => "No suitable memory type on this device",
            MemoryError::MapAccess => "Failed to map memory (vkMapMemory call failed)",
            MemoryError::Flush => {
                "Failed to synchronize memory (vkFlushMappedMemoryRanges or \
                vkInvalidateMappedMemoryRanges call failed)"
            }
            MemoryError::Bind => "Failed to bind memory (vkBindBufferMemory call failed)",
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for MemoryError {}

/// Buffer configuration
pub struct BufferCfg {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferType,
    pub properties: hw::MemoryProperty,
}

/// Buffer with dedicated memory
///
/// Example
/// ```ignore
/// let buffer = memory::Buffer::new(
///     &device,
///     &memory::BufferCfg {
///         size: 1024,
///         usage: memory::BufferType::STORAGE_BUFFER | memory::BufferType::TRANSFER_DST,
///         properties: hw::MemoryProperty::HOST_VISIBLE,
///     },
/// )?;
/// ```
pub struct Buffer {
    i_core: Arc<dev::Core>,
    i_buffer: vk::Buffer,
    i_memory: vk::DeviceMemory,
    i_size: u64,
    i_flags: hw::MemoryProperty,
}

impl Buffer {
    pub fn new(device: &dev::Device, cfg: &BufferCfg) -> Result<Buffer, MemoryError> {
        let buffer_info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::BufferCreateFlags::empty(),
            size: cfg.size,
            usage: cfg.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: ptr::null(),
            _marker: PhantomData,
        };

        let buffer: vk::Buffer = on_error_ret!(
            unsafe { device.device().create_buffer(&buffer_info, device.allocator()) },
            MemoryError::Buffer
        );

        let requirements: vk::MemoryRequirements =
            unsafe { device.device().get_buffer_memory_requirements(buffer) };

        let mem_index: u32 = on_option!(
            device
                .hw()
                .find_memory_index(requirements.memory_type_bits, cfg.properties),
            {
                unsafe { device.device().destroy_buffer(buffer, device.allocator()) };
                return Err(MemoryError::NoMemoryType);
            }
        );

        let memory_info = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            p_next: ptr::null(),
            allocation_size: requirements.size,
            memory_type_index: mem_index,
            _marker: PhantomData,
        };

        let memory: vk::DeviceMemory = unsafe { on_error!(
            device.device().allocate_memory(&memory_info, device.allocator()),
            {
                device.device().destroy_buffer(buffer, device.allocator());
                return Err(MemoryError::DeviceMemory);
            }
        )};

        unsafe { on_error!(
            device.device().bind_buffer_memory(buffer, memory, 0),
            {
                device.device().destroy_buffer(buffer, device.allocator());
                device.device().free_memory(memory, device.allocator());
                return Err(MemoryError::Bind);
            }
        )};

        Ok(Buffer {
            i_core: device.core().clone(),
            i_buffer: buffer,
            i_memory: memory,
            i_size: cfg.size,
            i_flags: cfg.properties,
        })
    }

    /// Performs action on mutable memory
    ///
    /// If memory is not coherent performs
    /// [vkFlushMappedMemoryRanges](https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/vkFlushMappedMemoryRanges.html)
    ///
    /// In other words makes host memory changes available to device
    pub fn write<F>(&self, f: F) -> Result<(), MemoryError>
    where
        F: FnOnce(&mut [u8]),
    {
        let dev = self.i_core.device();

        let data: *mut c_void = on_error_ret!(
            unsafe {
                dev.map_memory(self.i_memory, 0, self.i_size, vk::MemoryMapFlags::empty())
            },
            MemoryError::MapAccess
        );

        f(unsafe { std::slice::from_raw_parts_mut(data as *mut u8, self.i_size as usize) });

        if !self.i_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            let mem_range = vk::MappedMemoryRange {
                s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
                p_next: ptr::null(),
                memory: self.i_memory,
                offset: 0,
                size: vk::WHOLE_SIZE,
                _marker: PhantomData,
            };

            on_error!(
                unsafe { dev.flush_mapped_memory_ranges(&[mem_range]) },
                {
                    unsafe { dev.unmap_memory(self.i_memory) };
                    return Err(MemoryError::Flush);
                }
            );
        }

        unsafe { dev.unmap_memory(self.i_memory) };

        Ok(())
    }

    /// Return copy of buffer's memory
    ///
    /// If memory is not coherent performs
    /// [vkInvalidateMappedMemoryRanges](https://www.khronos.org/registry/vulkan/specs/1.3-extensions/man/html/vkInvalidateMappedMemoryRanges.html)
    ///
    /// I.e., makes device memory changes available to host (compare with [Buffer::write()] method)
    pub fn read(&self) -> Result<Vec<u8>, MemoryError> {
        let dev = self.i_core.device();

        if !self.i_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            let mem_range = vk::MappedMemoryRange {
                s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
                p_next: ptr::null(),
                memory: self.i_memory,
                offset: 0,
                size: vk::WHOLE_SIZE,
                _marker: PhantomData,
            };

            on_error_ret!(
                unsafe { dev.invalidate_mapped_memory_ranges(&[mem_range]) },
                MemoryError::Flush
            );
        }

        let data: *mut c_void = on_error_ret!(
            unsafe {
                dev.map_memory(self.i_memory, 0, self.i_size, vk::MemoryMapFlags::empty())
            },
            MemoryError::MapAccess
        );

        let result: Vec<u8> =
            unsafe { std::slice::from_raw_parts(data as *const u8, self.i_size as usize) }
                .to_vec();

        unsafe { dev.unmap_memory(self.i_memory) };

        Ok(result)
    }

    /// Return size of the buffer in bytes
    pub fn size(&self) -> u64 {
        self.i_size
    }

    #[doc(hidden)]
    pub fn buffer(&self) -> vk::Buffer {
        self.i_buffer
    }

    #[doc(hidden)]
    pub fn descriptor(&self) -> BufferDescriptor {
        vk::DescriptorBufferInfo {
            buffer: self.i_buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_buffer(self.i_buffer, self.i_core.allocator());
            self.i_core
                .device()
                .free_memory(self.i_memory, self.i_core.allocator());
        };
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
        .field("i_buffer", &self.i_buffer)
        .field("i_size", &self.i_size)
        .finish()
    }
}

/// 2d image configuration
pub struct ImageCfg {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub usage: ImageUsageFlags,
    pub aspect: ImageAspect,
}

/// Single mip, single layer, optimally tiled 2d image in device local memory
pub struct Image {
    i_core: Arc<dev::Core>,
    i_image: vk::Image,
    i_view: vk::ImageView,
    i_memory: vk::DeviceMemory,
    i_extent: vk::Extent2D,
    i_format: ImageFormat,
    i_aspect: ImageAspect,
}

impl Image {
    pub fn new(device: &dev::Device, cfg: &ImageCfg) -> Result<Image, MemoryError> {
        let image_info = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::ImageCreateFlags::empty(),
            image_type: vk::ImageType::TYPE_2D,
            format: cfg.format,
            extent: vk::Extent3D {
                width: cfg.width,
                height: cfg.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: cfg.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: ptr::null(),
            initial_layout: vk::ImageLayout::UNDEFINED,
            _marker: PhantomData,
        };

        let image: vk::Image = on_error_ret!(
            unsafe { device.device().create_image(&image_info, device.allocator()) },
            MemoryError::Image
        );

        let requirements: vk::MemoryRequirements =
            unsafe { device.device().get_image_memory_requirements(image) };

        let mem_index: u32 = on_option!(
            device.hw().find_memory_index(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL
            ),
            {
                unsafe { device.device().destroy_image(image, device.allocator()) };
                return Err(MemoryError::NoMemoryType);
            }
        );

        let memory_info = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            p_next: ptr::null(),
            allocation_size: requirements.size,
            memory_type_index: mem_index,
            _marker: PhantomData,
        };

        let memory: vk::DeviceMemory = unsafe { on_error!(
            device.device().allocate_memory(&memory_info, device.allocator()),
            {
                device.device().destroy_image(image, device.allocator());
                return Err(MemoryError::DeviceMemory);
            }
        )};

        unsafe { on_error!(
            device.device().bind_image_memory(image, memory, 0),
            {
                device.device().destroy_image(image, device.allocator());
                device.device().free_memory(memory, device.allocator());
                return Err(MemoryError::Bind);
            }
        )};

        let view_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::ImageViewCreateFlags::empty(),
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: cfg.format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: cfg.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            _marker: PhantomData,
        };

        let view: vk::ImageView = unsafe { on_error!(
            device.device().create_image_view(&view_info, device.allocator()),
            {
                device.device().destroy_image(image, device.allocator());
                device.device().free_memory(memory, device.allocator());
                return Err(MemoryError::ImageView);
            }
        )};

        Ok(Image {
            i_core: device.core().clone(),
            i_image: image,
            i_view: view,
            i_memory: memory,
            i_extent: vk::Extent2D {
                width: cfg.width,
                height: cfg.height,
            },
            i_format: cfg.format,
            i_aspect: cfg.aspect,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.i_extent
    }

    pub fn format(&self) -> ImageFormat {
        self.i_format
    }

    /// Full single mip range of the image
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.i_aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Mip zero of the image for copies
    pub fn subresource_layers(&self) -> vk::ImageSubresourceLayers {
        vk::ImageSubresourceLayers {
            aspect_mask: self.i_aspect,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    #[doc(hidden)]
    pub fn image(&self) -> vk::Image {
        self.i_image
    }

    #[doc(hidden)]
    pub fn view(&self) -> vk::ImageView {
        self.i_view
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.i_core
                .device()
                .destroy_image_view(self.i_view, self.i_core.allocator());
            self.i_core
                .device()
                .destroy_image(self.i_image, self.i_core.allocator());
            self.i_core
                .device()
                .free_memory(self.i_memory, self.i_core.allocator());
        };
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
        .field("i_image", &self.i_image)
        .field("i_extent", &self.i_extent)
        .field("i_format", &self.i_format)
        .finish()
    }
}
