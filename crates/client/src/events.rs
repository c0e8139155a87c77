use bytes::Bytes;
use netgauge_protocol::TransferResult;

/// Item of [`ThroughputClient::download_as_flow`](crate::ThroughputClient::download_as_flow).
///
/// A successful flow is zero or more `Chunk`s followed by exactly one
/// `Result`, after which the stream ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Chunk(Bytes),
    Result(TransferResult),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}
