//! Validation layer message routing
//!
//! Messages from `VK_EXT_debug_utils` end up in the [`log`] facade
//! so they interleave with the crate's own records

use ash::vk;

use std::ffi::{c_void, CStr};

/// Callback for [`DebugLayer`](crate::layers::DebugLayer)
///
/// Severity maps onto log levels: error, warning, info,
/// everything else lands on debug
pub unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }

    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[{:?}] {}", message_type, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[{:?}] {}", message_type, message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[{:?}] {}", message_type, message)
        }
        _ => log::debug!("[{:?}] {}", message_type, message),
    }

    vk::FALSE
}
