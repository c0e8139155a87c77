//! Wire protocol types for netgauge throughput tests.
//!
//! Shared by the HTTP server and the client library so both sides agree on
//! routes, headers and the JSON shape of a [`TransferResult`].

pub mod constants;
pub mod types;

pub use types::{DownloadRequest, TransferResult, now_millis};
