//! Mapping of transport failures onto [`TransferError`].

use std::io;

use netgauge_transfer::TransferError;

/// Cause attached to calls made after [`ThroughputClient::close`](crate::ThroughputClient::close).
#[derive(Debug, thiserror::Error)]
#[error("client is closed")]
pub struct ClientClosed;

/// Classifies a reqwest failure that happened outside the body stream.
pub(crate) fn from_reqwest(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        return TransferError::timeout(err);
    }
    if let Some(status) = err.status() {
        return TransferError::Remote {
            status: status.as_u16(),
            message: err.to_string(),
        };
    }
    TransferError::unknown(err)
}

/// Classifies a failed upload exchange.
///
/// A connection that was never made stays `Unknown`; one that broke while
/// the body was being sent is an I/O failure.
pub(crate) fn from_send_error(err: reqwest::Error) -> TransferError {
    if !err.is_timeout() && !err.is_connect() && (err.is_body() || err.is_request()) {
        return TransferError::Io(io::Error::other(err));
    }
    from_reqwest(err)
}

/// Builds a `Remote` error from a non-success response, keeping its body text.
pub(crate) async fn from_response(response: reqwest::Response) -> TransferError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    TransferError::Remote { status, message }
}

/// Converts a body-stream failure into an I/O error, preserving timeouts.
pub(crate) fn body_io_error(err: reqwest::Error) -> io::Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

/// Promotes timed-out body reads from `Io` to `Timeout`.
pub(crate) fn reclassify(err: TransferError) -> TransferError {
    match err {
        TransferError::Io(e) if e.kind() == io::ErrorKind::TimedOut => TransferError::timeout(e),
        other => other,
    }
}

/// `true` when the pipe reader went away, i.e. the failure is a symptom.
pub(crate) fn is_broken_pipe(err: &TransferError) -> bool {
    matches!(err, TransferError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
}
