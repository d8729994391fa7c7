// SPDX-License-Identifier: CEPL-1.0
//! Everything that crosses the boundary between the host process and the
//! hot-reloadable renderer library.
//!
//! The host owns a single [`CapabilityTable`] for its entire run and lends it
//! by `&mut` to the renderer's entry points. The renderer never links Vulkan
//! or the windowing system itself: it reaches both through the [`GpuApi`] and
//! [`Platform`] trait objects stored in the table, whose code lives in the host
//! and therefore stays valid when the renderer library is swapped out.
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod gpu;
mod platform;
mod table;

pub use ash::vk;
pub use ember_core::{BoundedVec, CapacityError};

pub use error::{Capacity, FrameError, FrameStatus, InitError, ShaderStage, SurfaceError, VkCall};
pub use gpu::GpuApi;
pub use platform::Platform;
pub use table::{
    AppInfo, CapabilityTable, FrameSlot, GpuHandles, SurfaceConfig, SwapchainImage, MAX_EXTENSIONS,
    MAX_LAYERS, MAX_PHYSICAL_DEVICES, MAX_PRESENT_MODES, MAX_QUEUE_FAMILIES, MAX_SURFACE_FORMATS,
    MAX_SWAPCHAIN_IMAGES,
};

/// Bumped whenever the layout of [`CapabilityTable`] or an entry-point signature changes.
pub const ABI_VERSION: u32 = 1;

pub type RendererInitFn = fn(&mut CapabilityTable) -> Result<(), InitError>;
pub type RendererDrawFn = fn(&mut CapabilityTable) -> Result<FrameStatus, FrameError>;
pub type RendererResizeFn = fn(&mut CapabilityTable, vk::Extent2D) -> Result<(), InitError>;
pub type RendererShutdownFn = fn(&mut CapabilityTable);
pub type RendererAbiVersionFn = fn() -> u32;

pub const RENDERER_INIT_SYMBOL: &[u8] = b"renderer_init";
pub const RENDERER_DRAW_SYMBOL: &[u8] = b"renderer_draw";
pub const RENDERER_RESIZE_SYMBOL: &[u8] = b"renderer_resize";
pub const RENDERER_SHUTDOWN_SYMBOL: &[u8] = b"renderer_shutdown";
pub const RENDERER_ABI_VERSION_SYMBOL: &[u8] = b"renderer_abi_version";
