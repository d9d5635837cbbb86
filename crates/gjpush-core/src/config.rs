use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sampler::SamplerConfig;

pub const DEV_BASE_URL: &str = "http://development.gamejolt.com";
pub const PROD_BASE_URL: &str = "https://gamejolt.com";
pub const DEV_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
pub const PROD_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Service root for this build profile.
pub fn default_base_url() -> &'static str {
    if cfg!(debug_assertions) {
        DEV_BASE_URL
    } else {
        PROD_BASE_URL
    }
}

/// Chunk size for this build profile.
pub fn default_chunk_size() -> u64 {
    if cfg!(debug_assertions) {
        DEV_CHUNK_SIZE
    } else {
        PROD_CHUNK_SIZE
    }
}

/// Global configuration loaded from `~/.config/gjpush/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Service root; API requests go to `<base_url>/service-api/push/`.
    pub base_url: String,
    /// Bytes sent per chunk request. Fixed for the whole upload.
    pub chunk_size: u64,
    /// Connect timeout in seconds (None = 30).
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Optional throughput sampler tuning; built-in defaults when missing.
    #[serde(default)]
    pub sampler: Option<SamplerConfig>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url().to_string(),
            chunk_size: default_chunk_size(),
            connect_timeout_secs: None,
            sampler: None,
        }
    }
}

impl PushConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.unwrap_or(30))
    }

    pub fn sampler(&self) -> SamplerConfig {
        self.sampler.unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gjpush")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PushConfig> {
    load_from(&config_path()?)
}

/// Like [`load_or_init`] but for an explicit path.
pub fn load_from(path: &Path) -> Result<PushConfig> {
    if !path.exists() {
        let default_cfg = PushConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: PushConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    if cfg.chunk_size == 0 {
        anyhow::bail!("chunk_size in {} must be greater than zero", path.display());
    }
    Ok(cfg)
}
