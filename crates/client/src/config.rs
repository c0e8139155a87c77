use std::time::Duration;

use netgauge_protocol::constants::{
    API_VERSION, DEFAULT_PORT, DEFAULT_TIMEOUT, download_path, upload_path,
};
use netgauge_transfer::{RandomSource, SizeLimits, TransferError};

/// Where and how a [`ThroughputClient`](crate::ThroughputClient) connects.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Route prefix, e.g. `v1`.
    pub api_version: String,
    /// Bounds TCP/TLS connection setup.
    pub connect_timeout: Duration,
    /// Bounds inactivity between chunks.
    pub socket_timeout: Duration,
    /// Bounds a whole request, body included.
    pub request_timeout: Duration,
    pub limits: SizeLimits,
    pub random_source: RandomSource,
    /// Transport to use instead of building one from the timeouts above.
    pub http_client: Option<reqwest::Client>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".into(),
            host: "localhost".into(),
            port: DEFAULT_PORT,
            api_version: API_VERSION.into(),
            connect_timeout: DEFAULT_TIMEOUT,
            socket_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
            limits: SizeLimits::default(),
            random_source: RandomSource::default(),
            http_client: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_random_source(mut self, source: RandomSource) -> Self {
        self.random_source = source;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// `{scheme}://{host}:{port}`, bracketing bare IPv6 hosts.
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    pub fn download_url(&self, size_bytes: u64) -> String {
        format!(
            "{}{}/{size_bytes}",
            self.base_url(),
            download_path(&self.api_version)
        )
    }

    /// URL of the deprecated JSON-body download route.
    pub fn legacy_download_url(&self) -> String {
        format!("{}{}", self.base_url(), download_path(&self.api_version))
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url(), upload_path(&self.api_version))
    }

    /// Returns the configured transport, or builds one from the timeouts.
    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, TransferError> {
        if let Some(client) = &self.http_client {
            return Ok(client.clone());
        }
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.socket_timeout)
            .build()
            .map_err(TransferError::unknown)
    }
}
