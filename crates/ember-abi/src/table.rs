// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;
use std::path::PathBuf;

use ash::vk;
use ember_core::BoundedVec;

use crate::{GpuApi, Platform, ABI_VERSION};

pub const MAX_EXTENSIONS: usize = 16;
pub const MAX_LAYERS: usize = 4;
pub const MAX_PHYSICAL_DEVICES: usize = 8;
pub const MAX_QUEUE_FAMILIES: usize = 16;
pub const MAX_SURFACE_FORMATS: usize = 64;
pub const MAX_PRESENT_MODES: usize = 8;
/// Swapchains reporting this many images or more are rejected outright.
pub const MAX_SWAPCHAIN_IMAGES: usize = 8;

/// Host-supplied request, filled in before `renderer_init`. Read-only to the renderer.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub application_name: CString,
    /// Instance extensions the windowing system needs.
    pub extensions: BoundedVec<CString, MAX_EXTENSIONS>,
    /// Enabled only when `debug` is set.
    pub validation_layers: BoundedVec<CString, MAX_LAYERS>,
    pub debug: bool,
    pub default_extent: vk::Extent2D,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
}

impl AppInfo {
    pub fn new(application_name: CString, width: u32, height: u32) -> Self {
        Self {
            application_name,
            extensions: BoundedVec::new(),
            validation_layers: BoundedVec::new(),
            debug: false,
            default_extent: vk::Extent2D { width, height },
            vertex_shader: PathBuf::new(),
            fragment_shader: PathBuf::new(),
            clear_color: [0.02, 0.02, 0.04, 1.0],
        }
    }
}

/// GPU objects created during initialization. A null handle means "not created yet".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GpuHandles {
    pub instance: vk::Instance,
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue: vk::Queue,
    pub swapchain: vk::SwapchainKHR,
    pub render_pass: vk::RenderPass,
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub command_pool: vk::CommandPool,
}

/// Values negotiated with the driver during device and swapchain setup.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceConfig {
    pub queue_family_index: u32,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// Non-owning references to one swapchain image and the objects built on it.
/// Indexed by the image index returned from acquisition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

/// Per-frame-in-flight resources, created once and reused every N-th frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

/// The only state shared between host and renderer.
///
/// Owned by the host for the whole run and never moved by the renderer. It is
/// written only during initialization (and swapchain recreation), strictly
/// before or between draws; `frame_index` and `frames_presented` belong to the
/// frame loop.
///
/// `repr(C)` keeps `abi_version` at offset 0, so a renderer built against a
/// different layout can still read it and refuse the table.
#[repr(C)]
pub struct CapabilityTable {
    pub abi_version: u32,
    pub platform: Box<dyn Platform>,
    pub gpu: Box<dyn GpuApi>,
    pub app_info: AppInfo,
    pub handles: GpuHandles,
    pub config: SurfaceConfig,
    pub images: BoundedVec<SwapchainImage, MAX_SWAPCHAIN_IMAGES>,
    pub frames: BoundedVec<FrameSlot, MAX_SWAPCHAIN_IMAGES>,
    pub frame_index: u32,
    pub frames_presented: u64,
}

impl CapabilityTable {
    pub fn new(platform: Box<dyn Platform>, gpu: Box<dyn GpuApi>, app_info: AppInfo) -> Self {
        Self {
            abi_version: ABI_VERSION,
            platform,
            gpu,
            app_info,
            handles: GpuHandles::default(),
            config: SurfaceConfig::default(),
            images: BoundedVec::new(),
            frames: BoundedVec::new(),
            frame_index: 0,
            frames_presented: 0,
        }
    }

    /// True once every stage up to and including the frame slots has completed.
    pub fn is_ready(&self) -> bool {
        self.handles.pipeline != vk::Pipeline::null()
            && !self.frames.is_empty()
            && !self.images.is_empty()
            && self.images.iter().all(|img| img.framebuffer != vk::Framebuffer::null())
    }
}
