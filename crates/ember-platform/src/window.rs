// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;
use std::{fs, io};

use anyhow::{Context, Result};
use ash::vk;
use ember_abi::{GpuApi, Platform, SurfaceError};
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

/// [`Platform`] for a single winit window.
pub struct WindowPlatform {
    window: Arc<Window>,
    dispatch: tracing::Dispatch,
}

impl WindowPlatform {
    /// Captures the current default dispatcher so renderer logs reach it.
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            dispatch: tracing::dispatcher::get_default(|d| d.clone()),
        }
    }
}

impl Platform for WindowPlatform {
    fn diagnostics(&self) -> &tracing::Dispatch {
        &self.dispatch
    }

    fn load_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    unsafe fn create_surface(
        &self,
        gpu: &mut dyn GpuApi,
        instance: vk::Instance,
    ) -> Result<vk::SurfaceKHR, SurfaceError> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| SurfaceError::Handle(e.to_string()))?
            .as_raw();
        let window = self
            .window
            .window_handle()
            .map_err(|e| SurfaceError::Handle(e.to_string()))?
            .as_raw();
        // SAFETY: the window outlives the table that will own the surface.
        unsafe { gpu.create_surface(instance, display, window) }.map_err(SurfaceError::Vk)
    }
}

/// Instance extensions the window's display server needs for presentation.
pub fn required_instance_extensions(window: &Window) -> Result<Vec<CString>> {
    let display = window
        .display_handle()
        .context("display handle")?
        .as_raw();
    let names = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?;
    // SAFETY: ash-window returns static NUL-terminated extension names.
    Ok(names
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
        .collect())
}
