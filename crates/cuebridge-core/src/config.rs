//! Configuration file support for cuebridge
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/cuebridge/config.toml`
//! - macOS: `~/Library/Application Support/cuebridge/config.toml`
//! - Windows: `%APPDATA%\cuebridge\config.toml`
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub host: HostSettings,
    pub sync: SyncSettings,
    pub storage: StorageSettings,
    pub snapshot: SnapshotSettings,
    pub osc: OscSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "cuebridge")
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for persisted cues, presets and pages.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if self.storage.state_dir.is_empty() {
            Ok(Self::project_dirs()?.data_dir().join("state"))
        } else {
            Ok(PathBuf::from(&self.storage.state_dir))
        }
    }

    /// Write the commented default config file
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }
}

const DEFAULT_CONFIG: &str = r#"# cuebridge configuration file

[server]
# Address and port of the HTTP / WebSocket server
bind = "0.0.0.0"
port = 9981

[host]
# Upper bound on every call into the host, in milliseconds.
# A call that takes longer is reported as "host unreachable".
timeout_ms = 2000

# Optional JSON scene file that seeds the in-process host graph
scene = ""

[sync]
# How often WebSocket observers are checked for parameter changes
push_interval_ms = 100

[storage]
# Where cues, presets and pages are kept. Empty means the platform data dir.
state_dir = ""

[snapshot]
# Default subtree captured by cue snapshots
root = "/project1"
max_depth = 3

# Path prefixes that are never captured
exclude = ["/project1/bridge"]

[osc]
# UDP port for inbound /bridge/... commands (0 disables the listener)
listen_port = 0

# Target for osc actions that do not name one
default_host = "127.0.0.1"
default_port = 7000
"#;

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 9981,
        }
    }
}

/// Host connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Bound on each host call in milliseconds
    pub timeout_ms: u64,
    /// JSON scene file seeding the in-process host (empty: start empty)
    pub scene: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            scene: String::new(),
        }
    }
}

impl HostSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

/// Change push settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub push_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_interval_ms: 100,
        }
    }
}

impl SyncSettings {
    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms.max(10))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub state_dir: String,
}

/// Snapshot capture defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub root: String,
    pub max_depth: usize,
    pub exclude: Vec<String>,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            root: "/project1".to_string(),
            max_depth: 3,
            exclude: vec!["/project1/bridge".to_string()],
        }
    }
}

/// OSC settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscSettings {
    pub listen_port: u16,
    pub default_host: String,
    pub default_port: u16,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            listen_port: 0,
            default_host: "127.0.0.1".to_string(),
            default_port: 7000,
        }
    }
}
