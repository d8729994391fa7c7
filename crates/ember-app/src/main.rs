// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::ffi::CString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use ember_abi::{vk, AppInfo, BoundedVec, CapabilityTable, FrameError};
use ember_core::init_tracing;
use ember_platform::{required_instance_extensions, AshGpu, WindowPlatform};
use tracing::{error, info, warn};

use ember_platform::winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

mod config;
mod reload;

use config::Config;
use reload::RendererHost;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Run the renderer compiled into this executable; no hot reload
    #[arg(long)]
    linked: bool,
    /// Enable validation layers and the debug messenger
    #[arg(long)]
    debug: bool,
    /// Renderer library to load and watch
    #[arg(long)]
    library: Option<PathBuf>,
}

impl Args {
    fn apply(&self, cfg: &mut Config) {
        if self.debug {
            cfg.render.debug = true;
        }
        if self.linked {
            cfg.reload.enabled = false;
        }
        if let Some(library) = &self.library {
            cfg.reload.library = Some(library.clone());
        }
    }
}

/// Lost devices and unready tables fail every later frame the same way.
fn frame_error_is_fatal(err: &FrameError) -> bool {
    match err {
        FrameError::NotInitialized => true,
        FrameError::Vk { result, .. } => *result == vk::Result::ERROR_DEVICE_LOST,
        FrameError::SwapchainOutOfDate | FrameError::ImageIndexOutOfRange { .. } => false,
    }
}

struct App {
    cfg: Config,
    host: RendererHost,
    table: Option<CapabilityTable>,
    // Dropped after `table`, whose surface was created from it.
    window: Option<Arc<Window>>,

    exiting: bool,
    paused: bool,
    needs_resize: bool,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: Config, host: RendererHost) -> Self {
        Self {
            cfg,
            host,
            table: None,
            window: None,
            exiting: false,
            paused: false,
            needs_resize: false,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    fn app_info(&self, window: &Window) -> Result<AppInfo> {
        let size = window.inner_size();
        let render = &self.cfg.render;

        let mut info = AppInfo::new(
            CString::new(self.cfg.window.title.as_str()).context("window title")?,
            size.width.max(1),
            size.height.max(1),
        );
        info.extensions = BoundedVec::try_from_iter(required_instance_extensions(window)?)
            .context("instance extensions")?;
        let layers = render
            .validation_layers
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .context("validation layer name")?;
        info.validation_layers =
            BoundedVec::try_from_iter(layers).context("validation layers")?;
        info.debug = render.debug;
        info.clear_color = render.clear_color;
        info.vertex_shader = render.vertex_shader.clone();
        info.fragment_shader = render.fragment_shader.clone();
        Ok(info)
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.as_str())
            .with_inner_size(LogicalSize::new(
                self.cfg.window.width,
                self.cfg.window.height,
            ));
        let window = event_loop.create_window(attrs).context("create_window")?;
        Ok(Arc::new(window))
    }

    /// Builds the table and runs `renderer_init`. On failure everything
    /// created so far is released before returning.
    fn start_renderer(&self, window: &Arc<Window>) -> Result<CapabilityTable> {
        let app_info = self.app_info(window)?;
        let mut table = CapabilityTable::new(
            Box::new(WindowPlatform::new(window.clone())),
            Box::new(AshGpu::linked()),
            app_info,
        );

        let entry = self.host.entry_points();
        if let Err(err) = (entry.init)(&mut table) {
            (entry.shutdown)(&mut table);
            return Err(err).context("renderer init");
        }
        info!(
            format = ?table.config.format.format,
            present_mode = ?table.config.present_mode,
            images = table.images.len(),
            "renderer ready"
        );
        Ok(table)
    }

    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting || self.paused {
            return;
        }
        let (Some(table), Some(window)) = (self.table.as_mut(), self.window.as_ref()) else {
            return;
        };
        let entry = self.host.entry_points();

        if self.needs_resize {
            let size = window.inner_size();
            let extent = vk::Extent2D {
                width: size.width,
                height: size.height,
            };
            if let Err(err) = (entry.resize)(table, extent) {
                error!(%err, "swapchain recreation failed");
                event_loop.exit();
                return;
            }
            self.needs_resize = false;
        }

        match (entry.draw)(table) {
            Ok(status) => {
                // count only frames that were actually presented
                self.frames = self.frames.saturating_add(1);
                if status.needs_recreate() {
                    self.needs_resize = true;
                }
            }
            Err(err) if err.needs_recreate() => self.needs_resize = true,
            Err(err) if frame_error_is_fatal(&err) => {
                error!(%err, "frame failed, stopping");
                event_loop.exit();
            }
            // already logged by the renderer; the slot stays usable
            Err(_) => {}
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut table) = self.table.take() {
            (self.host.entry_points().shutdown)(&mut table);
            info!(frames = table.frames_presented, "renderer shut down");
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let started = self
                .create_window(event_loop)
                .and_then(|window| Ok((self.start_renderer(&window)?, window)));
            match started {
                Ok((table, window)) => {
                    let size = window.inner_size();
                    self.paused = size.width == 0 || size.height == 0;
                    self.table = Some(table);
                    self.window = Some(window);
                }
                Err(err) => {
                    error!("startup failed: {err:#}");
                    self.exiting = true;
                    event_loop.exit();
                    return;
                }
            }
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        info!("resumed → paused={}", self.paused);

        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.exiting = true;
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                let now_paused = new_size.width == 0 || new_size.height == 0;
                if self.paused != now_paused {
                    self.paused = now_paused;
                    info!(
                        "Resized → {}x{} (paused={})",
                        new_size.width, new_size.height, self.paused
                    );
                }
                if !self.paused {
                    self.needs_resize = true;
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::RedrawRequested => self.render_frame(event_loop),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        let now = Instant::now();
        if self.host.poll(now) {
            info!("renderer code swapped; GPU state kept");
        }

        if self.paused {
            // nothing to draw; wake up only to check for new renderer code
            self.frames = 0;
            let flow = match self.host.next_poll() {
                Some(deadline) => ControlFlow::WaitUntil(deadline),
                None => ControlFlow::Wait,
            };
            event_loop.set_control_flow(flow);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let elapsed = now.duration_since(self.last_fps_instant);
        if elapsed.as_secs_f32() >= 1.0 {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            info!("fps: {:.1}", fps);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = config::load_or_default(&args.config);
    args.apply(&mut cfg);
    info!(
        debug = cfg.render.debug,
        hot_reload = cfg.reload.enabled,
        "config loaded"
    );

    let host = RendererHost::from_config(&cfg.reload)?;
    let event_loop = EventLoop::new().context("event loop")?;
    let mut app = App::new(cfg, host);
    if let Err(err) = event_loop.run_app(&mut app) {
        warn!(%err, "event loop ended with an error");
    }
    app.shutdown();
    Ok(())
}
