// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr};

use ash::vk;
use ember_abi::{BoundedVec, CapabilityTable, Capacity, InitError, VkCall, MAX_EXTENSIONS};
use tracing::{debug, info};

const ENGINE_NAME: &CStr = c"ember";

/// Creates the instance with the host's extensions, plus validation layers and
/// the debug messenger when `app_info.debug` is set.
pub(crate) fn create_instance(table: &mut CapabilityTable) -> Result<(), InitError> {
    let app = &table.app_info;

    // Built locally; the host's request list is never modified.
    let mut extensions: BoundedVec<*const c_char, MAX_EXTENSIONS> =
        BoundedVec::try_from_iter(app.extensions.iter().map(|e| e.as_ptr()))
            .map_err(|e| InitError::capacity(Capacity::Extensions, e))?;
    let mut layers: Vec<*const c_char> = Vec::new();
    if app.debug {
        extensions
            .try_push(ash::ext::debug_utils::NAME.as_ptr())
            .map_err(|e| InitError::capacity(Capacity::Extensions, e))?;
        layers.extend(app.validation_layers.iter().map(|l| l.as_ptr()));
    }

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.application_name.as_ptr(),
        application_version: vk::make_api_version(0, 0, 1, 0),
        p_engine_name: ENGINE_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 0, 1, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };
    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };

    // SAFETY: every pointer in `create_info` outlives the call.
    let instance = unsafe { table.gpu.create_instance(&create_info) }
        .map_err(|r| InitError::vk(VkCall::CreateInstance, r))?;
    table.handles.instance = instance;
    info!(
        extensions = extensions.len(),
        layers = layers.len(),
        debug = app.debug,
        "instance created"
    );

    if app.debug {
        // SAFETY: `instance` was just created through this GpuApi.
        let messenger = unsafe { table.gpu.create_debug_messenger(instance) }
            .map_err(|r| InitError::vk(VkCall::CreateDebugMessenger, r))?;
        table.handles.debug_messenger = messenger;
        debug!("debug messenger installed");
    }
    Ok(())
}

/// Asks the host for the presentation surface. Called exactly once.
pub(crate) fn create_surface(table: &mut CapabilityTable) -> Result<(), InitError> {
    let instance = table.handles.instance;
    // SAFETY: `instance` is the live instance recorded by the previous stage.
    let surface = unsafe { table.platform.create_surface(&mut *table.gpu, instance) }?;
    table.handles.surface = surface;
    Ok(())
}
