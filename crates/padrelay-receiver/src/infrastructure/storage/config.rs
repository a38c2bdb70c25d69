//! TOML-based configuration for the receiver application.
//!
//! Reads `ReceiverConfig` from an explicit path or from the platform config
//! file:
//! - Windows:  `%APPDATA%\padrelay\receiver.toml`
//! - Linux:    `~/.config/padrelay/receiver.toml`
//! - macOS:    `~/Library/Application Support/padrelay/receiver.toml`
//!
//! Example:
//!
//! ```toml
//! [receiver]
//! log_level = "debug"
//!
//! [network]
//! listen_port = 26760
//! layout = "compact"
//!
//! [sessions]
//! max_sessions = 2
//! timeout_ms = 1500
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]` and every section
//! `#[serde(default)]`, so an empty file, a missing file, and a file written
//! by an older version all load.  [`ReceiverConfig::validate`] then rejects
//! values the relay cannot run with.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use padrelay_core::{WireLayout, MAX_SLOTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the relay's read timeout; the loop must notice shutdown
/// within this.
pub const MAX_POLL_INTERVAL_MS: u64 = 100;

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

    /// A value parsed but is outside what the receiver accepts.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level receiver configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub receiver: ReceiverSection,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// General receiver behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiverSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Socket and wire-format settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// UDP port senders transmit to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Packet layout every sender in this deployment uses.
    #[serde(default)]
    pub layout: WireLayout,
    /// Read timeout of the relay socket, i.e. how often the loop checks for shutdown.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Session table and eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionsConfig {
    /// Number of virtual-controller slots, 1..=256.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Silence after which a sender is evicted and its controller reset.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Period of the timeout sweeper.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Let new senders claim the slot named in their packets when it is free.
    #[serde(default)]
    pub honor_slot_hint: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    26760
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_max_sessions() -> usize {
    4
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_sweep_interval_ms() -> u64 {
    100
}

impl Default for ReceiverSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            listen_port: default_listen_port(),
            layout: WireLayout::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            timeout_ms: default_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            honor_slot_hint: false,
        }
    }
}

// ── Derived values and validation ─────────────────────────────────────────────

impl ReceiverConfig {
    /// Checks every value the relay depends on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sessions = &self.sessions;
        if sessions.max_sessions == 0 || sessions.max_sessions > MAX_SLOTS {
            return Err(invalid(
                "sessions.max_sessions",
                format!("must be between 1 and {MAX_SLOTS}, got {}", sessions.max_sessions),
            ));
        }
        if sessions.timeout_ms == 0 {
            return Err(invalid("sessions.timeout_ms", "must be greater than zero".into()));
        }
        if sessions.sweep_interval_ms == 0 {
            return Err(invalid("sessions.sweep_interval_ms", "must be greater than zero".into()));
        }
        if self.network.poll_interval_ms == 0 || self.network.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(invalid(
                "network.poll_interval_ms",
                format!(
                    "must be between 1 and {MAX_POLL_INTERVAL_MS}, got {}",
                    self.network.poll_interval_ms
                ),
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    /// The socket address the relay binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|e| invalid("network.bind_address", format!("{e}")))?;
        Ok(SocketAddr::new(ip, self.network.listen_port))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.network.poll_interval_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.sessions.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sessions.sweep_interval_ms)
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the receiver config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("receiver.toml"))
}

/// Loads `ReceiverConfig` from the platform config file, returning defaults
/// if the file does not yet exist.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ReceiverConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ReceiverConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ReceiverConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReceiverConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ReceiverConfig) -> Result<(), ConfigError> {
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

/// Resolves the platform config directory including the `padrelay` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("padrelay"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
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
