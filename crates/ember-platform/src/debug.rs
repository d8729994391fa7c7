// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use ash::vk;
use tracing::Level;

pub(crate) fn level_for(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    if severity.contains(S::ERROR) {
        Level::ERROR
    } else if severity.contains(S::WARNING) {
        Level::WARN
    } else if severity.contains(S::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

/// Validation messages, forwarded to the host subscriber.
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback data struct for the duration of the call.
    let data = unsafe { &*data };
    if data.p_message.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy();

    match level_for(severity) {
        Level::ERROR => tracing::error!(target: "vulkan", ?types, "{message}"),
        Level::WARN => tracing::warn!(target: "vulkan", ?types, "{message}"),
        Level::DEBUG => tracing::debug!(target: "vulkan", ?types, "{message}"),
        _ => tracing::trace!(target: "vulkan", ?types, "{message}"),
    }
    vk::FALSE
}
