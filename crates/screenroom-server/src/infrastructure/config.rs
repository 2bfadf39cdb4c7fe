//! TOML configuration file for the server.
//!
//! All settings have serde defaults, so a missing file, an empty file, and a
//! partial file all produce a working configuration.  CLI flags and
//! environment variables (see `main.rs`) are applied on top of whatever the
//! file provides.
//!
//! ```toml
//! [network]
//! bind_address = "0.0.0.0"
//! port = 3000
//!
//! [control]
//! rate_limit_scope = "per-connection"
//! command_spacing_ms = 10
//!
//! [screen]
//! width = 1920
//! height = 1080
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenroom_core::ScreenSize;

use crate::application::RateLimitScope;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// IP address to bind the WebSocket listener to.  `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port for the WebSocket listener.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Remote-control admission settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlConfig {
    /// Which channel the command rate limit applies to.
    #[serde(default)]
    pub rate_limit_scope: RateLimitScope,
    /// Minimum milliseconds between accepted commands on that channel.
    #[serde(default = "default_command_spacing_ms")]
    pub command_spacing_ms: u64,
}

/// Virtual screen dimensions reported by the built-in injector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

impl ScreenConfig {
    pub fn size(&self) -> ScreenSize {
        ScreenSize {
            width: self.width,
            height: self.height,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_command_spacing_ms() -> u64 {
    10
}
fn default_screen_width() -> u32 {
    1920
}
fn default_screen_height() -> u32 {
    1080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            control: ControlConfig::default(),
            screen: ScreenConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_limit_scope: RateLimitScope::default(),
            command_spacing_ms: default_command_spacing_ms(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads [`ServerConfig`] from `path`, returning `ServerConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
