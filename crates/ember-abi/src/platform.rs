// SPDX-License-Identifier: CEPL-1.0
use std::io;
use std::path::Path;

use ash::vk;

use crate::{GpuApi, SurfaceError};

/// Host services that are not part of the graphics API.
pub trait Platform {
    /// The host's tracing dispatcher. Renderer entry points run under it so
    /// their logs reach the host subscriber even from a reloaded library.
    fn diagnostics(&self) -> &tracing::Dispatch;

    /// Reads a whole file, e.g. a shader binary.
    fn load_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Creates the presentation surface for the host window. Called once,
    /// after `instance` has been created through `gpu`.
    ///
    /// # Safety
    /// `instance` must be the live instance created by `gpu`.
    unsafe fn create_surface(
        &self,
        gpu: &mut dyn GpuApi,
        instance: vk::Instance,
    ) -> Result<vk::SurfaceKHR, SurfaceError>;
}
