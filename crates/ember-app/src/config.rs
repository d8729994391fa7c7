// SPDX-License-Identifier: CEPL-1.0
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "ember.toml";

const DEFAULT_VERTEX_SHADER: &str = concat!(env!("OUT_DIR"), "/triangle.vert.spv");
const DEFAULT_FRAGMENT_SHADER: &str = concat!(env!("OUT_DIR"), "/triangle.frag.spv");
const RENDERER_LIBRARY: &str = "ember_render_vk";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub reload: ReloadCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "ember".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    /// Validation layers and the debug messenger.
    pub debug: bool,
    pub validation_layers: Vec<String>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            debug: cfg!(debug_assertions),
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_owned()],
            vertex_shader: PathBuf::from(DEFAULT_VERTEX_SHADER),
            fragment_shader: PathBuf::from(DEFAULT_FRAGMENT_SHADER),
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReloadCfg {
    pub enabled: bool,
    /// Renderer library to watch; next to the executable when unset.
    pub library: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for ReloadCfg {
    fn default() -> Self {
        ReloadCfg {
            enabled: true,
            library: None,
            poll_interval_ms: 500,
        }
    }
}

impl ReloadCfg {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn library_path(&self) -> io::Result<PathBuf> {
        if let Some(path) = &self.library {
            return Ok(path.clone());
        }
        let exe = env::current_exe()?;
        let dir = exe.parent().unwrap_or(Path::new("."));
        Ok(dir.join(libloading::library_filename(RENDERER_LIBRARY)))
    }
}

/// Reads `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Like [`load`], but any error is logged and replaced by the defaults.
pub fn load_or_default(path: &Path) -> Config {
    load(path).unwrap_or_else(|err| {
        warn!(%err, "using default config");
        Config::default()
    })
}
