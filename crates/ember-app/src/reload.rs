// SPDX-License-Identifier: CEPL-1.0
//! Swaps the renderer's code under a live capability table.
//!
//! Every generation is loaded from its own copy of the artifact, so the build
//! can overwrite the original while the current generation is mapped, and the
//! loader never hands back the previous mapping for a path it has seen before.
//! The table and the GPU objects in it are never touched here.
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use std::{env, fs, io, process};

use anyhow::Context;
use ember_abi::{
    RendererAbiVersionFn, RendererDrawFn, RendererInitFn, RendererResizeFn, RendererShutdownFn,
    ABI_VERSION, RENDERER_ABI_VERSION_SYMBOL, RENDERER_DRAW_SYMBOL, RENDERER_INIT_SYMBOL,
    RENDERER_RESIZE_SYMBOL, RENDERER_SHUTDOWN_SYMBOL,
};
use libloading::Library;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReloadCfg;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("{path} does not export `{symbol}`: {source}")]
    Symbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("{path} speaks renderer ABI {found}, host expects {expected}")]
    Abi {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
}

impl ReloadError {
    fn io(path: &Path, source: io::Error) -> Self {
        ReloadError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// The renderer's entry points. Only valid while the code they point into is loaded.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoints {
    pub init: RendererInitFn,
    pub draw: RendererDrawFn,
    pub resize: RendererResizeFn,
    pub shutdown: RendererShutdownFn,
    pub abi_version: RendererAbiVersionFn,
}

impl EntryPoints {
    /// The renderer compiled into this executable.
    pub fn linked() -> Self {
        Self {
            init: ember_render_vk::renderer_init,
            draw: ember_render_vk::renderer_draw,
            resize: ember_render_vk::renderer_resize,
            shutdown: ember_render_vk::renderer_shutdown,
            abi_version: ember_render_vk::renderer_abi_version,
        }
    }
}

/// Modification time of the watched artifact, as of the last load attempt.
#[derive(Debug)]
struct ArtifactWatch {
    path: PathBuf,
    last_seen: Option<SystemTime>,
}

impl ArtifactWatch {
    /// Returns the new timestamp if the artifact changed since the last call.
    fn changed(&mut self) -> io::Result<Option<SystemTime>> {
        let modified = fs::metadata(&self.path)?.modified()?;
        if self.last_seen.is_some_and(|seen| modified <= seen) {
            return Ok(None);
        }
        self.last_seen = Some(modified);
        Ok(Some(modified))
    }
}

/// One loaded generation. Unloads, then deletes its shadow copy.
struct LoadedLibrary {
    library: Option<Library>,
    shadow: PathBuf,
}

impl Drop for LoadedLibrary {
    fn drop(&mut self) {
        drop(self.library.take());
        if let Err(err) = fs::remove_file(&self.shadow) {
            debug!(%err, shadow = %self.shadow.display(), "shadow copy not removed");
        }
    }
}

unsafe fn resolve<T: Copy>(
    library: &Library,
    path: &Path,
    symbol: &'static [u8],
) -> Result<T, ReloadError> {
    // SAFETY: the caller guarantees `T` is the symbol's real type.
    let sym = unsafe { library.get::<T>(symbol) }.map_err(|source| ReloadError::Symbol {
        path: path.to_owned(),
        symbol: String::from_utf8_lossy(symbol).into_owned(),
        source,
    })?;
    Ok(*sym)
}

/// Opens `shadow` and resolves every entry point, checking the ABI first.
fn open_generation(shadow: &Path, source: &Path) -> Result<(Library, EntryPoints), ReloadError> {
    // SAFETY: the artifact is a renderer cdylib built from this workspace; its
    // initializers have no preconditions.
    let library = unsafe { Library::new(shadow) }.map_err(|e| ReloadError::Load {
        path: source.to_owned(),
        source: e,
    })?;

    // SAFETY: the symbol types are the aliases the renderer exports them under.
    let entry = unsafe {
        let abi_version: RendererAbiVersionFn =
            resolve(&library, source, RENDERER_ABI_VERSION_SYMBOL)?;
        let found = abi_version();
        if found != ABI_VERSION {
            return Err(ReloadError::Abi {
                path: source.to_owned(),
                expected: ABI_VERSION,
                found,
            });
        }
        EntryPoints {
            init: resolve(&library, source, RENDERER_INIT_SYMBOL)?,
            draw: resolve(&library, source, RENDERER_DRAW_SYMBOL)?,
            resize: resolve(&library, source, RENDERER_RESIZE_SYMBOL)?,
            shutdown: resolve(&library, source, RENDERER_SHUTDOWN_SYMBOL)?,
            abi_version,
        }
    };
    Ok((library, entry))
}

/// Polls the renderer artifact and rebinds the entry points when it changes.
pub struct HotReloader {
    watch: ArtifactWatch,
    shadow_dir: PathBuf,
    generation: u64,
    poll_interval: Duration,
    last_poll: Instant,
    entry: EntryPoints,
    // Declared after `entry` so the code it points into outlives it.
    library: Option<LoadedLibrary>,
}

impl HotReloader {
    /// Loads the first generation of `source`. Shadow copies go in `shadow_dir`.
    pub fn load(
        source: PathBuf,
        shadow_dir: PathBuf,
        poll_interval: Duration,
    ) -> Result<Self, ReloadError> {
        let mut watch = ArtifactWatch {
            path: source,
            last_seen: None,
        };
        watch
            .changed()
            .map_err(|e| ReloadError::io(&watch.path, e))?;
        fs::create_dir_all(&shadow_dir).map_err(|e| ReloadError::io(&shadow_dir, e))?;

        let mut reloader = Self {
            watch,
            shadow_dir,
            generation: 0,
            poll_interval,
            last_poll: Instant::now(),
            entry: EntryPoints::linked(),
            library: None,
        };
        reloader.load_generation()?;
        info!(path = %reloader.watch.path.display(), "renderer library loaded");
        Ok(reloader)
    }

    pub fn entry_points(&self) -> EntryPoints {
        self.entry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_poll(&self) -> Instant {
        self.last_poll + self.poll_interval
    }

    /// Checks the artifact if the poll interval has elapsed. True if new code is bound.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_poll() {
            return false;
        }
        self.last_poll = now;
        match self.reload_if_changed() {
            Ok(reloaded) => reloaded,
            Err(ReloadError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("renderer library missing, probably mid-build");
                false
            }
            Err(err) => {
                warn!(%err, "renderer reload failed, keeping previous code");
                false
            }
        }
    }

    /// Loads a new generation if the artifact is newer than the last attempt.
    /// On failure the previous entry points stay bound and the failed timestamp
    /// is remembered, so the same artifact is not retried.
    pub fn reload_if_changed(&mut self) -> Result<bool, ReloadError> {
        let changed = self
            .watch
            .changed()
            .map_err(|e| ReloadError::io(&self.watch.path, e))?;
        if changed.is_none() {
            return Ok(false);
        }
        self.load_generation()?;
        info!(generation = self.generation, "renderer reloaded");
        Ok(true)
    }

    fn shadow_path(&self, generation: u64) -> PathBuf {
        let stem = self
            .watch
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "renderer".to_owned());
        let name = match self.watch.path.extension() {
            Some(ext) => format!("{stem}-{generation}.{}", ext.to_string_lossy()),
            None => format!("{stem}-{generation}"),
        };
        self.shadow_dir.join(name)
    }

    fn load_generation(&mut self) -> Result<(), ReloadError> {
        let generation = self.generation + 1;
        let shadow = self.shadow_path(generation);
        fs::copy(&self.watch.path, &shadow).map_err(|e| ReloadError::io(&shadow, e))?;

        let (library, entry) = match open_generation(&shadow, &self.watch.path) {
            Ok(opened) => opened,
            Err(err) => {
                let _ = fs::remove_file(&shadow);
                return Err(err);
            }
        };

        // New code is bound before the previous generation is unloaded.
        self.entry = entry;
        self.library = Some(LoadedLibrary {
            library: Some(library),
            shadow,
        });
        self.generation = generation;
        Ok(())
    }
}

impl Drop for HotReloader {
    fn drop(&mut self) {
        drop(self.library.take());
        let _ = fs::remove_dir(&self.shadow_dir);
    }
}

/// Where the host gets its renderer code from.
pub enum RendererHost {
    Linked(EntryPoints),
    HotReload(HotReloader),
}

impl RendererHost {
    pub fn from_config(cfg: &ReloadCfg) -> anyhow::Result<Self> {
        if !cfg.enabled {
            info!("renderer linked statically, hot reload off");
            return Ok(RendererHost::Linked(EntryPoints::linked()));
        }
        let library = cfg
            .library_path()
            .context("locating renderer library")?;
        let shadow_dir = env::temp_dir().join(format!("ember-reload-{}", process::id()));
        let reloader = HotReloader::load(library, shadow_dir, cfg.poll_interval())
            .context("loading renderer library (pass --linked to run without it)")?;
        Ok(RendererHost::HotReload(reloader))
    }

    pub fn entry_points(&self) -> EntryPoints {
        match self {
            RendererHost::Linked(entry) => *entry,
            RendererHost::HotReload(reloader) => reloader.entry_points(),
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self {
            RendererHost::Linked(_) => false,
            RendererHost::HotReload(reloader) => reloader.poll(now),
        }
    }

    pub fn next_poll(&self) -> Option<Instant> {
        match self {
            RendererHost::Linked(_) => None,
            RendererHost::HotReload(reloader) => Some(reloader.next_poll()),
        }
    }
}
