//! HTTP throughput server.
//!
//! Streams generated random bytes to downloaders and times uploaded byte
//! streams, reporting each upload as a [`TransferResult`](netgauge_protocol::TransferResult).
//! [`TransferService`] holds the transfer logic, [`routes`] maps it onto
//! axum, and [`ThroughputServer`] owns the listener and its lifecycle.

pub mod routes;
mod server;
mod service;

pub use server::{ServerConfig, ThroughputServer};
pub use service::{DownloadStream, TransferService};

/// Errors produced by the throughput server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server already running")]
    AlreadyRunning,

    #[error("invalid API version segment: {0:?}")]
    InvalidApiVersion(String),
}
