//! Command line arguments and config resolution

use std::path::PathBuf;

use clap::Parser;
use icb_core::{Config, Error, Result, ServerConfig};
use tracing::debug;

#[derive(Parser, Debug, Default)]
#[command(name = "icb", about = "Terminal client for ICB chat servers", version)]
pub struct Args {
    /// Server entry from the config file to use
    #[arg(long)]
    pub server: Option<String>,

    /// Server host name or address
    #[arg(long, env = "ICB_ADDRESS")]
    pub address: Option<String>,

    /// Server port
    #[arg(long)]
    pub port: Option<i32>,

    /// Nick to log in with
    #[arg(long, env = "ICB_NICK")]
    pub nick: Option<String>,

    /// Login id, defaults to the nick
    #[arg(long, env = "ICB_USER")]
    pub username: Option<String>,

    /// Group to join after login
    #[arg(long)]
    pub group: Option<String>,

    #[arg(long, env = "ICB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset, e.g. "icb_net=trace"
    #[arg(long)]
    pub log: Option<String>,
}

impl Args {
    /// Load the config file. An explicit `--config` must exist; the default
    /// location is optional.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => {
                let path = Config::default_path()?;
                if path.exists() {
                    Config::load(&path)
                } else {
                    debug!(path = %path.display(), "No config file");
                    Ok(Config::default())
                }
            }
        }
    }

    /// Pick the server entry and apply command line overrides
    pub fn server_config(&self, config: &Config) -> Result<ServerConfig> {
        let mut server = if config.servers.is_empty() {
            if let Some(name) = &self.server {
                return Err(Error::NotFound(format!("server '{}'", name)));
            }
            ServerConfig::default()
        } else {
            config.server(self.server.as_deref())?.clone()
        };

        if let Some(address) = &self.address {
            server.address = address.clone();
        }
        if let Some(port) = self.port {
            server.port = Some(port);
        }
        if let Some(nick) = &self.nick {
            server.nick = nick.clone();
        }
        if let Some(username) = &self.username {
            server.username = Some(username.clone());
        }
        if let Some(group) = &self.group {
            server.group = Some(group.clone());
        }
        if let Some(password) = &self.password {
            server.password = Some(password.clone());
        }

        server.validate()?;
        Ok(server)
    }

    /// Tracing filter: `--log`, then the config file
    pub fn log_filter(&self, config: &Config) -> Option<String> {
        self.log.clone().or_else(|| config.log_filter.clone())
    }
}
