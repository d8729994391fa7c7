// SPDX-License-Identifier: CEPL-1.0
//! Hot-reloadable Vulkan renderer.
//!
//! The library owns no state of its own. Every entry point takes the host's
//! [`CapabilityTable`], reaches Vulkan only through `table.gpu`, and records
//! whatever it creates back into the table, so a freshly loaded generation of
//! this library picks up exactly where the previous one stopped.
#![deny(unsafe_op_in_unsafe_fn)]

mod device;
mod frame;
mod instance;
mod swapchain;
mod target;
mod teardown;

#[cfg(test)]
mod mock;

use std::sync::Once;

use ember_abi::{vk, CapabilityTable, FrameError, FrameStatus, InitError, ABI_VERSION};
use tracing::{error, info, warn};

type Stage = fn(&mut CapabilityTable) -> Result<(), InitError>;

/// Initialization order. Each stage only reads what earlier stages recorded.
const INIT_STAGES: [(&str, Stage); 8] = [
    ("instance", instance::create_instance),
    ("surface", instance::create_surface),
    ("device", device::acquire_device),
    ("swapchain", swapchain::create_swapchain),
    ("render pass", target::create_render_pass),
    ("framebuffers", target::create_framebuffers),
    ("pipeline", target::create_pipeline),
    ("frame slots", frame::create_frame_slots),
];

fn check_abi(table: &CapabilityTable) -> Result<(), InitError> {
    if table.abi_version != ABI_VERSION {
        return Err(InitError::AbiMismatch {
            expected: ABI_VERSION,
            found: table.abi_version,
        });
    }
    Ok(())
}

/// Set once the callsites of this copy of the library have seen the host subscriber.
static HOST_INTEREST: Once = Once::new();

/// Runs `f` with the host's subscriber installed as the default dispatcher.
///
/// A library loaded at runtime carries its own `tracing-core`, in which no
/// dispatcher was ever registered: its max level starts at `OFF` and every
/// callsite stays disabled. The first call rebuilds the interest cache under
/// the host dispatcher, which fixes both for this generation.
fn with_host_logging<R>(
    table: &mut CapabilityTable,
    f: impl FnOnce(&mut CapabilityTable) -> R,
) -> R {
    let dispatch = table.platform.diagnostics().clone();
    tracing::dispatcher::with_default(&dispatch, || {
        HOST_INTEREST.call_once(tracing::callsite::rebuild_interest_cache);
        f(table)
    })
}

#[no_mangle]
pub fn renderer_abi_version() -> u32 {
    ABI_VERSION
}

/// Runs every setup stage in order, stopping at the first failure.
///
/// Whatever the completed stages created stays recorded in the table; call
/// [`renderer_shutdown`] to release it.
#[no_mangle]
pub fn renderer_init(table: &mut CapabilityTable) -> Result<(), InitError> {
    check_abi(table)?;
    with_host_logging(table, |table| {
        for (stage, run) in INIT_STAGES {
            if let Err(err) = run(table) {
                error!(stage, %err, "renderer init failed");
                return Err(err);
            }
        }
        info!(
            images = table.images.len(),
            frames_in_flight = table.frames.len(),
            "renderer ready"
        );
        Ok(())
    })
}

/// One acquire/record/submit/present cycle.
#[no_mangle]
pub fn renderer_draw(table: &mut CapabilityTable) -> Result<FrameStatus, FrameError> {
    if check_abi(table).is_err() {
        return Err(FrameError::NotInitialized);
    }
    with_host_logging(table, |table| {
        let result = frame::draw_frame(table);
        match &result {
            Err(FrameError::SwapchainOutOfDate) => warn!("swapchain out of date"),
            Err(err) => error!(%err, "frame failed"),
            Ok(_) => {}
        }
        result
    })
}

/// Rebuilds the swapchain and everything sized by it for a new window extent.
#[no_mangle]
pub fn renderer_resize(table: &mut CapabilityTable, extent: vk::Extent2D) -> Result<(), InitError> {
    check_abi(table)?;
    with_host_logging(table, |table| {
        swapchain::recreate_swapchain(table, extent).inspect_err(|err| {
            error!(%err, width = extent.width, height = extent.height, "swapchain recreation failed");
        })
    })
}

/// Waits for the device and destroys everything recorded in the table.
#[no_mangle]
pub fn renderer_shutdown(table: &mut CapabilityTable) {
    if check_abi(table).is_err() {
        return;
    }
    with_host_logging(table, teardown::destroy_all);
}
