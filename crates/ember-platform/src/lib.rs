// SPDX-License-Identifier: CEPL-1.0
//! Host-side implementations of the services the renderer reaches through
//! its capability table: Vulkan over a linked loader, and a winit window.
#![deny(unsafe_op_in_unsafe_fn)]

mod debug;
mod gpu;
mod window;

pub use gpu::AshGpu;
pub use window::{required_instance_extensions, WindowPlatform};
pub use winit;
