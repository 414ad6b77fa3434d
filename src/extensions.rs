//! Instance and device extension names

use ash::{ext, khr};

use std::ffi::c_char;

use crate::window;
use raw_window_handle::HasDisplayHandle;

pub const DEBUG_EXT_NAME: *const c_char = ext::debug_utils::NAME.as_ptr();

pub const SURFACE_EXT_NAME: *const c_char = khr::surface::NAME.as_ptr();

pub const HEADLESS_SURFACE_EXT_NAME: *const c_char = ext::headless_surface::NAME.as_ptr();

/// Device ext
pub const PIPELINE_EXECUTABLE_PROPERTIES_EXT_NAME: *const c_char =
    khr::pipeline_executable_properties::NAME.as_ptr();

/// Device ext
pub const PRIMITIVES_GENERATED_QUERY_EXT_NAME: *const c_char =
    ext::primitives_generated_query::NAME.as_ptr();

/// Device ext
pub const EXTERNAL_MEMORY_HOST_EXT_NAME: *const c_char =
    ext::external_memory_host::NAME.as_ptr();

/// Device ext
pub const MESH_SHADER_EXT_NAME: *const c_char = ext::mesh_shader::NAME.as_ptr();

/// Return required instance extensions for presenting to `window`
///
/// If function failed to do this returns `vec![]`
pub fn required_extensions(window: &window::Window) -> Vec<*const c_char> {
    let display = match window.display_handle() {
        Ok(handle) => handle.as_raw(),
        Err(_) => return Vec::new(),
    };

    Vec::from(ash_window::enumerate_required_extensions(display).unwrap_or(&[]))
}
