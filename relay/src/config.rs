use anyhow::Context;
use chatkit_core::ChatKitConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration for the relay daemon
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// ChatKit API settings (the `[chatkit]` table)
    #[serde(default)]
    pub chatkit: ChatKitConfig,
    /// Address the HTTP server listens on
    pub http_addr: Option<SocketAddr>,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load configuration from the default location, falling back to
    /// defaults when no file exists there.
    pub fn load_default() -> anyhow::Result<Self> {
        match default_config_file() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }
}

/// Default config file path: `~/.config/chatkit-relay/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatkit-relay").join("config.toml"))
}
