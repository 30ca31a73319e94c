//! TOML-based configuration for the `devlink-agent` binary.
//!
//! Reads and writes [`AgentConfig`] at the platform-appropriate location:
//! - Windows:  `%APPDATA%\DevLink\agent.toml`
//! - Linux:    `~/.config/devlink/agent.toml`
//! - macOS:    `~/Library/Application Support/DevLink/agent.toml`
//!
//! Example file:
//!
//! ```toml
//! [link]
//! url = "ws://192.168.1.20:8080"
//! debug = true
//!
//! [device]
//! device_type = "thermostat"
//! name = "hall-1"
//!
//! [agent]
//! report_interval_ms = 30000
//! ```
//!
//! Every field has a serde default, so a file only needs the keys it changes
//! and an absent file means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::device_link::LinkConfig;

/// File name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "agent.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level agent configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub agent: AgentSection,
}

/// Where and how to connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkSection {
    /// WebSocket URL of the server (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Promotes the link's per-frame diagnostics from `debug` to `info`.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_envelope_bytes")]
    pub max_envelope_bytes: usize,
}

/// The identity announced to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSection {
    #[serde(default = "default_device_type")]
    pub device_type: String,
    /// Empty means "generate one at startup".
    #[serde(default)]
    pub name: String,
}

/// Behaviour of the agent's main loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSection {
    /// Sleep between two `poll()` calls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Period of the unsolicited `uptime` report; `0` disables it.
    #[serde(default)]
    pub report_interval_ms: u64,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_url() -> String {
    "ws://127.0.0.1:8080".to_string()
}
fn default_check_interval_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_max_envelope_bytes() -> usize {
    devlink_core::DEFAULT_MAX_ENVELOPE_BYTES
}
fn default_device_type() -> String {
    "generic".to_string()
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            debug: false,
            check_interval_ms: default_check_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_envelope_bytes: default_max_envelope_bytes(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            name: String::new(),
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            report_interval_ms: 0,
            log_level: default_log_level(),
        }
    }
}

impl AgentConfig {
    /// Builds the link tunables from the `[link]` section.
    pub fn to_link_config(&self) -> LinkConfig {
        LinkConfig {
            check_interval: Duration::from_millis(self.link.check_interval_ms),
            connect_timeout: Duration::from_millis(self.link.connect_timeout_ms),
            max_envelope_bytes: self.link.max_envelope_bytes,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path of the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default location, returning defaults if the
/// file does not exist yet.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AgentConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AgentConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AgentConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AgentConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Platform config directory including the `DevLink` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("DevLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("devlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DevLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
