//! TOML-based configuration for the sender application.
//!
//! Reads `SenderConfig` from an explicit path or from
//! `<platform config dir>/padrelay/sender.toml`.  A missing file yields the
//! defaults below:
//!
//! ```toml
//! [sender]
//! log_level = "info"
//! slot_hint = 0
//!
//! [network]
//! target_address = "127.0.0.1:26760"
//! layout = "full"
//! send_buffer_bytes = 1024
//!
//! [sampling]
//! sample_interval_ms = 8
//! policy = "on_change"
//! deadzone = 256
//! heartbeat_ms = 250
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use padrelay_core::WireLayout;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::send_state::{AlwaysSend, SendOnChange, SendPolicy};

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

    /// A value parsed but is outside what the sender accepts.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level sender configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SenderConfig {
    #[serde(default)]
    pub sender: SenderSection,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

/// General sender behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Slot requested from the receiver.  Only honoured if the receiver enables hints.
    #[serde(default)]
    pub slot_hint: u8,
}

/// Destination and wire-format settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Receiver `ip:port`.
    #[serde(default = "default_target_address")]
    pub target_address: String,
    /// Must match the receiver's layout.
    #[serde(default)]
    pub layout: WireLayout,
    /// Requested OS send buffer.  Small on purpose: stale frames should be dropped, not queued.
    #[serde(default = "default_send_buffer_bytes")]
    pub send_buffer_bytes: usize,
}

/// Which [`SendPolicy`] the sender runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Always,
    #[default]
    OnChange,
}

/// Capture rate and send policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingConfig {
    /// Time between two controller samples.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default)]
    pub policy: PolicyKind,
    /// Axis movement (full-scale units) ignored by the on-change policy.
    #[serde(default = "default_deadzone")]
    pub deadzone: u16,
    /// Resend period of the on-change policy; `0` disables it.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_target_address() -> String {
    "127.0.0.1:26760".to_string()
}
fn default_send_buffer_bytes() -> usize {
    1024
}
fn default_sample_interval_ms() -> u64 {
    8
}
fn default_deadzone() -> u16 {
    256
}
fn default_heartbeat_ms() -> u64 {
    250
}

impl Default for SenderSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            slot_hint: 0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            target_address: default_target_address(),
            layout: WireLayout::default(),
            send_buffer_bytes: default_send_buffer_bytes(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            policy: PolicyKind::default(),
            deadzone: default_deadzone(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

// ── Derived values and validation ─────────────────────────────────────────────

impl SenderConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sampling.sample_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.network.send_buffer_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "network.send_buffer_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        self.target_addr()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `target_address` is not `ip:port`.
    pub fn target_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.network
            .target_address
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "network.target_address",
                reason: format!("{e}"),
            })
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sampling.sample_interval_ms)
    }

    /// Builds the configured send policy.
    pub fn build_policy(&self) -> Box<dyn SendPolicy> {
        match self.sampling.policy {
            PolicyKind::Always => Box::new(AlwaysSend),
            PolicyKind::OnChange => {
                let heartbeat =
                    (self.sampling.heartbeat_ms > 0).then(|| Duration::from_millis(self.sampling.heartbeat_ms));
                Box::new(SendOnChange::new(self.sampling.deadzone, heartbeat))
            }
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("sender.toml"))
}

/// Loads `SenderConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<SenderConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SenderConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<SenderConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &SenderConfig) -> Result<(), ConfigError> {
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

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("padrelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("padrelay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("padrelay"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
