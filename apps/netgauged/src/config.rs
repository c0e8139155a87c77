//! Daemon configuration.
//!
//! Read from a TOML file whose path comes from `--config` or
//! `NETGAUGE_CONFIG`. A missing file means defaults. `NETGAUGE_HOST` and
//! `NETGAUGE_PORT` override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use netgauge_protocol::constants::{
    API_VERSION, DEFAULT_HOST, DEFAULT_MAX_TRANSFER_BYTES, DEFAULT_PORT, DEFAULT_TIMEOUT,
};
use netgauge_server::{ServerConfig, TransferService};
use netgauge_transfer::{RandomSource, SizeLimits};

pub const HOST_ENV: &str = "NETGAUGE_HOST";
pub const PORT_ENV: &str = "NETGAUGE_PORT";

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listen address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on a request until its response headers go out.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bound on the wait for each upload chunk.
    #[serde(default = "default_timeout_secs")]
    pub socket_timeout_secs: u64,

    #[serde(default = "default_max_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_max_bytes")]
    pub max_download_bytes: u64,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// `fast` or `secure`.
    #[serde(default)]
    pub random_source: RandomSource,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_TRANSFER_BYTES
}

fn default_api_version() -> String {
    API_VERSION.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_timeout_secs(),
            socket_timeout_secs: default_timeout_secs(),
            max_upload_bytes: default_max_bytes(),
            max_download_bytes: default_max_bytes(),
            api_version: default_api_version(),
            random_source: RandomSource::default(),
        }
    }
}

impl Config {
    /// Loads the file (if any), applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?;
                tracing::debug!(path = %path.display(), "configuration file loaded");
                config
            }
            Some(path) => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                Config::default()
            }
            None => Config::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `NETGAUGE_HOST` / `NETGAUGE_PORT` as returned by `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_timeout_secs == 0 || self.socket_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.max_upload_bytes == 0 || self.max_download_bytes == 0 {
            bail!("size limits must be positive");
        }
        if let RandomSource::Seeded(_) = self.random_source {
            bail!("random_source must be \"fast\" or \"secure\"");
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            api_version: self.api_version.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn service(&self) -> TransferService {
        let limits = SizeLimits {
            max_upload_bytes: self.max_upload_bytes,
            max_download_bytes: self.max_download_bytes,
        };
        TransferService::new(limits, self.random_source)
            .with_idle_timeout(Some(Duration::from_secs(self.socket_timeout_secs)))
    }
}
