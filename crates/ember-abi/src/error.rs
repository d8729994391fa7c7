// SPDX-License-Identifier: CEPL-1.0
//! Failure taxonomy shared by host and renderer.
//!
//! Every type here is plain data: an error produced inside the renderer library
//! must stay printable after that library has been unloaded.

use std::fmt;

use ash::vk;
use thiserror::Error;

/// The API call that failed, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VkCall {
    CreateInstance,
    CreateDebugMessenger,
    EnumeratePhysicalDevices,
    CreateDevice,
    GetSurfaceFormats,
    GetSurfacePresentModes,
    GetSurfaceCapabilities,
    CreateSwapchain,
    GetSwapchainImages,
    CreateImageView,
    CreateRenderPass,
    CreateFramebuffer,
    CreateShaderModule(ShaderStage),
    CreatePipelineLayout,
    CreateGraphicsPipeline,
    CreateCommandPool,
    AllocateCommandBuffers,
    CreateSemaphore,
    CreateFence,
    DeviceWaitIdle,
    WaitForFences,
    ResetFences,
    AcquireNextImage,
    BeginCommandBuffer,
    EndCommandBuffer,
    QueueSubmit,
    QueuePresent,
}

impl fmt::Display for VkCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VkCall::CreateInstance => "vkCreateInstance",
            VkCall::CreateDebugMessenger => "vkCreateDebugUtilsMessengerEXT",
            VkCall::EnumeratePhysicalDevices => "vkEnumeratePhysicalDevices",
            VkCall::CreateDevice => "vkCreateDevice",
            VkCall::GetSurfaceFormats => "vkGetPhysicalDeviceSurfaceFormatsKHR",
            VkCall::GetSurfacePresentModes => "vkGetPhysicalDeviceSurfacePresentModesKHR",
            VkCall::GetSurfaceCapabilities => "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
            VkCall::CreateSwapchain => "vkCreateSwapchainKHR",
            VkCall::GetSwapchainImages => "vkGetSwapchainImagesKHR",
            VkCall::CreateImageView => "vkCreateImageView",
            VkCall::CreateRenderPass => "vkCreateRenderPass",
            VkCall::CreateFramebuffer => "vkCreateFramebuffer",
            VkCall::CreateShaderModule(stage) => {
                return write!(f, "vkCreateShaderModule ({stage})");
            }
            VkCall::CreatePipelineLayout => "vkCreatePipelineLayout",
            VkCall::CreateGraphicsPipeline => "vkCreateGraphicsPipelines",
            VkCall::CreateCommandPool => "vkCreateCommandPool",
            VkCall::AllocateCommandBuffers => "vkAllocateCommandBuffers",
            VkCall::CreateSemaphore => "vkCreateSemaphore",
            VkCall::CreateFence => "vkCreateFence",
            VkCall::DeviceWaitIdle => "vkDeviceWaitIdle",
            VkCall::WaitForFences => "vkWaitForFences",
            VkCall::ResetFences => "vkResetFences",
            VkCall::AcquireNextImage => "vkAcquireNextImageKHR",
            VkCall::BeginCommandBuffer => "vkBeginCommandBuffer",
            VkCall::EndCommandBuffer => "vkEndCommandBuffer",
            VkCall::QueueSubmit => "vkQueueSubmit",
            VkCall::QueuePresent => "vkQueuePresentKHR",
        };
        f.write_str(name)
    }
}

/// A fixed-capacity list that a driver-reported count can overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Extensions,
    PhysicalDevices,
    QueueFamilies,
    SurfaceFormats,
    PresentModes,
    SwapchainImages,
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capacity::Extensions => "instance extensions",
            Capacity::PhysicalDevices => "physical devices",
            Capacity::QueueFamilies => "queue families",
            Capacity::SurfaceFormats => "surface formats",
            Capacity::PresentModes => "present modes",
            Capacity::SwapchainImages => "swapchain images",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("window handle unavailable: {0}")]
    Handle(String),
    #[error("surface creation rejected: {0}")]
    Vk(vk::Result),
}

/// Setup failure. Any of these aborts the remaining initialization stages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("capability table ABI {found} does not match renderer ABI {expected}")]
    AbiMismatch { expected: u32, found: u32 },
    #[error("{what}: capacity of {capacity} exceeded ({found} reported)")]
    CapacityExceeded {
        what: Capacity,
        capacity: usize,
        found: usize,
    },
    #[error("{call} failed: {result}")]
    Vk { call: VkCall, result: vk::Result },
    #[error("no physical device exposes a queue family with graphics and present support")]
    NoSuitableDevice,
    #[error("surface reports no formats")]
    NoSurfaceFormat,
    #[error("surface: {0}")]
    Surface(#[from] SurfaceError),
    #[error("failed to load {stage} shader: {reason}")]
    ShaderLoad { stage: ShaderStage, reason: String },
    #[error("{stage} shader is not valid SPIR-V: {reason}")]
    InvalidShader { stage: ShaderStage, reason: String },
    #[error("renderer is not initialized")]
    NotInitialized,
}

impl InitError {
    pub fn vk(call: VkCall, result: vk::Result) -> Self {
        InitError::Vk { call, result }
    }

    pub fn capacity(what: Capacity, err: ember_core::CapacityError) -> Self {
        InitError::CapacityExceeded {
            what,
            capacity: err.capacity,
            found: err.requested,
        }
    }
}

/// Outcome of one completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { image_index: u32 },
    /// Presented, but the swapchain no longer matches the surface exactly.
    Suboptimal { image_index: u32 },
}

impl FrameStatus {
    pub fn image_index(self) -> u32 {
        match self {
            FrameStatus::Presented { image_index } | FrameStatus::Suboptimal { image_index } => {
                image_index
            }
        }
    }

    pub fn needs_recreate(self) -> bool {
        matches!(self, FrameStatus::Suboptimal { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The swapchain must be recreated before the next frame; not fatal.
    #[error("swapchain is out of date")]
    SwapchainOutOfDate,
    #[error("{call} failed: {result}")]
    Vk { call: VkCall, result: vk::Result },
    #[error("acquired image {index} but the swapchain holds {count}")]
    ImageIndexOutOfRange { index: u32, count: usize },
    #[error("draw called before initialization completed")]
    NotInitialized,
}

impl FrameError {
    pub fn vk(call: VkCall, result: vk::Result) -> Self {
        FrameError::Vk { call, result }
    }

    pub fn needs_recreate(&self) -> bool {
        matches!(self, FrameError::SwapchainOutOfDate)
    }
}
