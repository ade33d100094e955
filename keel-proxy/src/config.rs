//! Process configuration: a JSON file with command-line overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line interface of the proxy.
#[derive(Debug, Parser)]
#[command(
    name = "keel",
    about = "Dynamic routing proxy for orchestrated applications"
)]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Log filter, e.g. `info` or `keel_core=debug`.
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Address the HTTP listener binds to.
    #[arg(long = "listen")]
    pub listen: Option<SocketAddr>,

    /// Serving domain stripped from request hosts to obtain the app id.
    #[arg(long = "domain")]
    pub domain: Option<String>,

    /// Unix socket path the lifecycle control plane listens on.
    #[arg(long = "control-sock")]
    pub control_sock: Option<PathBuf>,
}

/// Fully resolved proxy configuration.
///
/// Every field carries a default, so an empty file and no flags still yield a
/// runnable process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Log filter directive.
    pub log_level: String,
    /// Address the HTTP listener binds to.
    pub listen: SocketAddr,
    /// Serving domain: a request for `myapp.<domain>` routes to app `myapp`.
    pub domain: String,
    /// Unix socket path of the lifecycle control plane.
    pub control_sock: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            domain: "keel.local".to_string(),
            control_sock: PathBuf::from("/var/run/keel.sock"),
        }
    }
}

impl ProxyConfig {
    /// Load the configuration file when one is given, then apply CLI
    /// overrides on top.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config_file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(level) = &cli.log_level {
            config.log_level = level.clone();
        }
        if let Some(listen) = cli.listen {
            config.listen = listen;
        }
        if let Some(domain) = &cli.domain {
            config.domain = domain.clone();
        }
        if let Some(sock) = &cli.control_sock {
            config.control_sock = sock.clone();
        }
        Ok(config)
    }

    fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
