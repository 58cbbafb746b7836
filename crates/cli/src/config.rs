// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Stored as TOML in `synclink.toml` under the user config directory:
//!
//! ```toml
//! [server]
//! url = "wss://sync.example.org/ws"
//!
//! [lifecycle]
//! heartbeat_interval_ms = 15000
//!
//! [network]
//! sysfs_root = "/sys/class/net"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use synclink_core::LifecycleConfig;

use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "synclink";
const CONFIG_FILE_NAME: &str = "synclink.toml";

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Timer and backoff knobs handed to the lifecycle manager.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Where to connect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint (`ws://` or `wss://`). Resume parameters are
    /// appended as query arguments on every dial.
    #[serde(default)]
    pub url: String,
}

/// Where the network observer reads interface state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "default_route_table")]
    pub route_table: PathBuf,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

fn default_route_table() -> PathBuf {
    PathBuf::from("/proc/net/route")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            sysfs_root: default_sysfs_root(),
            route_table: default_route_table(),
        }
    }
}

impl Config {
    /// Configuration with defaults and the given server url.
    pub fn with_url(url: &str) -> Self {
        Config {
            server: ServerConfig {
                url: url.to_string(),
            },
            lifecycle: LifecycleConfig::default(),
            network: NetworkConfig::default(),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolves the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present. `url` overrides whatever the file says.
    pub fn resolve(path: Option<&Path>, url: Option<&str>) -> Result<Self> {
        let location = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        let mut config = if path.is_some() || location.exists() {
            Config::load(&location)?
        } else {
            Config::with_url("")
        };

        if let Some(url) = url {
            config.server.url = url.to_string();
        }
        if config.server.url.is_empty() {
            return Err(Error::MissingUrl(location.display().to_string()));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.server.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "invalid server url '{url}': must start with ws:// or wss://"
            )));
        }
        self.lifecycle.validate()?;
        Ok(())
    }
}

/// `<config dir>/synclink/synclink.toml`, falling back to the working directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
