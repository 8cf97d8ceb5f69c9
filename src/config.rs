use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::{playback::history::DEFAULT_MAX_ENTRIES, storage::container::WriteMode};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub keys: Keys,
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub library: Library,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            keys: Keys::default(),
            history: History::default(),
            library: Library::default(),
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sqlite,
    Directory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// sqlite file or store directory; sqlite without a path stays in memory
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Sqlite,
            path: Some(PathBuf::from("debris.db")),
            write_mode: WriteMode::Through,
        }
    }
}

/// Store keys the queue and the play log live under
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Keys {
    pub queue: String,
    pub log: String,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            queue: "debris.queue".to_string(),
            log: "debris.log".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct History {
    /// 0 keeps the whole history
    pub max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Library {
    #[serde(default)]
    pub follow_symlinks: bool,
}
