use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_FOLDERS: [&str; 4] = ["Downloads", "Documents", "Pictures", "Music"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub folders: FoldersConfig,
    pub disk: DiskConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub polling_interval_ms: u64,
    pub per_query_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            polling_interval_ms: 2000,
            per_query_timeout_ms: 5000,
        }
    }
}

impl GeneralConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms.max(1))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.per_query_timeout_ms.max(1))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FoldersConfig {
    /// Folder names relative to `base_dir`; matched case-sensitively.
    pub monitored: Vec<String>,
    pub base_dir: Option<PathBuf>,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        FoldersConfig {
            monitored: DEFAULT_FOLDERS.iter().map(|f| f.to_string()).collect(),
            base_dir: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub mount_index: usize,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hostglance").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
