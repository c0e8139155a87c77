//! Client side of netgauge throughput tests.
//!
//! [`ThroughputClient`] validates a requested size, runs one HTTP exchange
//! against a netgauge server and reports the measured
//! [`TransferResult`]. Failures surface as [`TransferError`] with a stable
//! [`FailureKind`] tag.

mod client;
mod config;
mod error;
mod events;

pub use client::ThroughputClient;
pub use config::ClientConfig;
pub use error::ClientClosed;
pub use events::DownloadEvent;

pub use netgauge_protocol::TransferResult;
pub use netgauge_transfer::{
    FailureKind, ProgressCallback, RandomSource, SizeLimits, TransferError, TransferProgress,
};
