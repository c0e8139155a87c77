//! Listener lifecycle for the throughput server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use netgauge_protocol::constants::{API_VERSION, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};

use crate::routes::build_router;
use crate::{ServerError, TransferService};

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Route prefix, e.g. `v1`.
    pub api_version: String,
    /// Upper bound on a request, until its response headers are sent.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_version: API_VERSION.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The throughput HTTP server.
pub struct ThroughputServer {
    config: ServerConfig,
    service: Arc<TransferService>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    running: AtomicBool,
}

impl ThroughputServer {
    pub fn new(config: ServerConfig, service: TransferService) -> Arc<Self> {
        Arc::new(Self {
            config,
            service: Arc::new(service),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Stops accepting connections and lets in-flight requests finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serves requests until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<(), ServerError> {
        let version = self.config.api_version.trim_matches('/');
        if version.is_empty() || version.contains('/') {
            return Err(ServerError::InvalidApiVersion(
                self.config.api_version.clone(),
            ));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        let result = self.serve(version).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn serve(&self, api_version: &str) -> Result<(), ServerError> {
        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(%local_addr, api_version, "throughput server listening");

        let app = build_router(
            Arc::clone(&self.service),
            api_version,
            self.config.request_timeout,
        );
        let cancel = self.cancel.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .inspect_err(|e| tracing::error!("server error: {e}"))?;

        tracing::info!("server shutting down");
        Ok(())
    }
}
