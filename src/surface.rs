//! Abstraction over native surface or window object

use ash::vk;
use ash::{ext, khr};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::{libvk, memory, window, hw};
use crate::on_error_ret;

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

#[derive(Debug)]
pub enum SurfaceError {
    /// Failed to get native display or window handle from the window
    Handle,
    /// Platform `vkCreate*SurfaceKHR` call failed
    Create,
    /// `vkCreateHeadlessSurfaceEXT` call failed
    Headless,
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            SurfaceError::Handle => {
                "Failed to get native display or window handle"
            },
            SurfaceError::Create => {
                "Failed to create window surface (vkCreate*SurfaceKHR call failed)"
            },
            SurfaceError::Headless => {
                "Failed to create headless surface (vkCreateHeadlessSurfaceEXT call failed)"
            }
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for SurfaceError {}

/// Note: custom allocator is not supported
pub struct Surface {
    i_loader: khr::surface::Instance,
    i_surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create surface over a native window
    pub fn new(lib: &libvk::Instance, window: &window::Window) -> Result<Surface, SurfaceError> {
        let display = on_error_ret!(window.display_handle(), SurfaceError::Handle);
        let handle = on_error_ret!(window.window_handle(), SurfaceError::Handle);

        let surface = on_error_ret!(
            unsafe {
                ash_window::create_surface(
                    lib.entry(),
                    lib.instance(),
                    display.as_raw(),
                    handle.as_raw(),
                    None,
                )
            },
            SurfaceError::Create
        );

        let surface_loader = khr::surface::Instance::new(lib.entry(), lib.instance());

        Ok(
            Surface {
                i_loader: surface_loader,
                i_surface: surface,
            }
        )
    }

    /// Create surface without any native window behind it
    ///
    /// Instance must be created with
    /// [`HEADLESS_SURFACE_EXT_NAME`](crate::extensions::HEADLESS_SURFACE_EXT_NAME)
    pub fn headless(lib: &libvk::Instance) -> Result<Surface, SurfaceError> {
        let headless_loader = ext::headless_surface::Instance::new(lib.entry(), lib.instance());

        let create_info = vk::HeadlessSurfaceCreateInfoEXT {
            s_type: vk::StructureType::HEADLESS_SURFACE_CREATE_INFO_EXT,
            p_next: ptr::null(),
            flags: vk::HeadlessSurfaceCreateFlagsEXT::empty(),
            _marker: PhantomData,
        };

        let surface = on_error_ret!(
            unsafe { headless_loader.create_headless_surface(&create_info, None) },
            SurfaceError::Headless
        );

        let surface_loader = khr::surface::Instance::new(lib.entry(), lib.instance());

        Ok(
            Surface {
                i_loader: surface_loader,
                i_surface: surface,
            }
        )
    }

    #[doc(hidden)]
    pub fn loader(&self) -> &khr::surface::Instance {
        &self.i_loader
    }

    #[doc(hidden)]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.i_surface
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.i_loader.destroy_surface(self.i_surface, None) };
    }
}

/// Surface formats
///
/// Contains two field: [`format`](crate::memory::ImageFormat) and [`color_space`](ColorSpace)
///
#[doc = "Ash documentation: <https://docs.rs/ash/latest/ash/vk/struct.SurfaceFormatKHR.html>"]
///
#[doc = "Vulkan documentation: <https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkSurfaceFormatKHR.html>"]
///
/// # Example
///
/// ```
/// use vkcts::surface::{SurfaceFormat, ColorSpace};
/// use vkcts::memory::ImageFormat;
///
/// SurfaceFormat {
///     format: ImageFormat::R8G8B8A8_UNORM,
///     color_space: ColorSpace::SRGB_NONLINEAR,
/// };
/// ```
pub type SurfaceFormat = vk::SurfaceFormatKHR;

/// How the presentation engine interprets image colors
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.ColorSpaceKHR.html>"]
pub type ColorSpace = vk::ColorSpaceKHR;

/// Presentation mode of a surface
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.PresentModeKHR.html>"]
pub type PresentMode = vk::PresentModeKHR;

/// Value describing the transform, relative to the presentation engine's natural orientation
///
/// It is applied to the image content prior to presentation
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.SurfaceTransformFlagsKHR.html>"]
pub type PreTransformation = vk::SurfaceTransformFlagsKHR;

/// Alpha compositing modes supported on a surface
///
#[doc = "Values: <https://docs.rs/ash/latest/ash/vk/struct.CompositeAlphaFlagsKHR.html>"]
pub type CompositeAlphaFlags = vk::CompositeAlphaFlagsKHR;

#[derive(Debug)]
pub enum CapabilitiesError {
    Modes,
    Surface,
    Formats
}

impl fmt::Display for CapabilitiesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            CapabilitiesError::Modes => {
                "Failed to get present modes (vkGetPhysicalDeviceSurfacePresentModesKHR call failed)"
            },
            CapabilitiesError::Surface => {
                "Failed to get surface capabilities (vkGetPhysicalDeviceSurfaceCapabilitiesKHR call failed)"
            },
            CapabilitiesError::Formats => {
                "Failed to get surface formats (vkGetPhysicalDeviceSurfaceFormatsKHR call failed)"
            }
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for CapabilitiesError {}

pub struct Capabilities {
    i_modes: Vec<vk::PresentModeKHR>,
    i_capabilities: vk::SurfaceCapabilitiesKHR,
    i_formats: Vec<vk::SurfaceFormatKHR>,
}

impl Capabilities {
    /// Query for surface capabilities for the selected hw device
    pub fn get(hw: &hw::HWDevice, surface: &Surface) -> Result<Capabilities, CapabilitiesError> {
        let mods = on_error_ret!(
            unsafe {
                surface.loader().get_physical_device_surface_present_modes(hw.device(), surface.surface())
            },
            CapabilitiesError::Modes
        );

        let capabilities = on_error_ret!(
            unsafe {
                surface.loader().get_physical_device_surface_capabilities(hw.device(), surface.surface())
            },
            CapabilitiesError::Surface
        );

        let formats = on_error_ret!(
            unsafe {
                surface.loader().get_physical_device_surface_formats(hw.device(), surface.surface())
            },
            CapabilitiesError::Formats
        );

        Ok(
            Capabilities {
                i_modes: mods,
                i_capabilities: capabilities,
                i_formats: formats
            }
        )
    }

    /// Return number of minimal number of images required for the swapchain
    pub fn min_img_count(&self) -> u32 {
        self.i_capabilities.min_image_count
    }

    /// Return number of max number of images supported for the swapchain
    ///
    /// Note: function return [u32::MAX] if there is no limit (max = 0) or limit is equal to [u32::MAX]
    pub fn max_img_count(&self) -> u32 {
        if self.i_capabilities.max_image_count == 0 {
            u32::MAX
        }
        else {
            self.i_capabilities.max_image_count
        }
    }

    /// Return true if `count` is in range [min_img_count; max_img_count]
    pub fn is_img_count_supported(&self, count: u32) -> bool {
        (self.min_img_count()..=self.max_img_count()).contains(&count)
    }

    /// Does surface support provided combination of format and color
    pub fn is_format_supported(&self, format: SurfaceFormat) -> bool {
        self.i_formats.contains(&format)
    }

    /// Return iterator over available surface formats and corresponding color schemes
    pub fn formats(&self) -> impl Iterator<Item = &SurfaceFormat> {
        self.i_formats.iter()
    }

    /// Return iterator over all available presentation modes
    pub fn modes(&self) -> impl Iterator<Item = &PresentMode> {
        self.i_modes.iter()
    }

    /// Does surface support provided presentation mode
    pub fn is_mode_supported(&self, mode: PresentMode) -> bool {
        self.i_modes.contains(&mode)
    }

    /// Check if selected image usage is supported
    pub fn is_flags_supported(&self, flags: memory::ImageUsageFlags) -> bool {
        self.i_capabilities.supported_usage_flags.contains(flags)
    }

    /// Return 2d extent supported by surface
    pub fn extent2d(&self) -> memory::Extent2D {
        self.i_capabilities.current_extent
    }

    /// Return current transformation
    pub fn pre_transformation(&self) -> PreTransformation {
        self.i_capabilities.current_transform
    }

    /// Retrun current composite alpha flags
    pub fn alpha_composition(&self) -> CompositeAlphaFlags {
        self.i_capabilities.supported_composite_alpha
    }

    /// Does surface support provided alpha composition flag(s)
    pub fn is_alpha_supported(&self, alpha: CompositeAlphaFlags) -> bool {
        self.i_capabilities.supported_composite_alpha.contains(alpha)
    }
}
