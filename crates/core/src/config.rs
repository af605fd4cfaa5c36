//! Connection configuration
//!
//! Loaded from `config.toml` in the platform config directory. Each
//! `[[server]]` table describes one ICB server the client can connect to.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default ICB port, used when none is configured or the configured one is <= 0
pub const DEFAULT_PORT: u16 = 7326;

/// Group to join when none is configured
pub const DEFAULT_GROUP: &str = "1";

/// Top-level config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tracing filter used when `RUST_LOG` is not set
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Configured servers, in file order
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerConfig>,
}

/// One ICB server entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name used to pick this entry from the command line
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    #[serde(default)]
    pub port: Option<i32>,
    #[serde(default)]
    pub username: Option<String>,
    pub nick: String,
    /// Initial group
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Send a no-op packet after this many idle seconds
    #[serde(default)]
    pub keepalive_secs: Option<u64>,
}

impl Config {
    /// Load the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "config file {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), servers = config.servers.len(), "Loaded config");
        Ok(config)
    }

    /// Parse config from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        for server in &config.servers {
            server.validate()?;
        }
        Ok(config)
    }

    /// Default config file location (`<config dir>/icb/config.toml`)
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "icb").ok_or_else(|| {
            Error::Config("Could not determine config directory".to_string())
        })?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Find a server entry by name (case-insensitive), or the first one
    /// when no name is given
    pub fn server(&self, name: Option<&str>) -> Result<&ServerConfig> {
        match name {
            Some(name) => self
                .servers
                .iter()
                .find(|s| {
                    s.name
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
                .ok_or_else(|| Error::NotFound(format!("server '{}'", name))),
            None => self
                .servers
                .first()
                .ok_or_else(|| Error::NotFound("no servers configured".to_string())),
        }
    }
}

impl ServerConfig {
    /// Minimal entry with an address and nick
    pub fn new(address: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nick: nick.into(),
            ..Default::default()
        }
    }

    /// An entry is usable only with an address and a nick
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::Config("server address is empty".to_string()));
        }
        if self.nick.trim().is_empty() {
            return Err(Error::Config(format!(
                "nick is empty for server {}",
                self.address
            )));
        }
        Ok(())
    }

    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) if port > 0 => u16::try_from(port).unwrap_or(DEFAULT_PORT),
            _ => DEFAULT_PORT,
        }
    }

    /// Configured group, or [`DEFAULT_GROUP`]. ICB always needs to be in a group.
    pub fn initial_group(&self) -> &str {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => group,
            _ => DEFAULT_GROUP,
        }
    }

    /// Login name, falling back to the nick
    pub fn login_name(&self) -> &str {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => user,
            _ => &self.nick,
        }
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    /// `host:port` string for connecting
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.effective_port())
    }
}
