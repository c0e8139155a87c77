//! Error taxonomy shared by the client and the server.

/// Boxed underlying cause kept for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stable tag for branching on a failure without matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Validation,
    Remote,
    Timeout,
    Io,
    Unknown,
}

/// Errors produced by a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Bad, missing or over-limit input. Raised before any bytes move.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("remote returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("timed out: {0}")]
    Timeout(#[source] BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected failure: {0}")]
    Unknown(#[source] BoxError),
}

impl TransferError {
    /// Wraps `cause` as a timeout.
    pub fn timeout(cause: impl Into<BoxError>) -> Self {
        Self::Timeout(cause.into())
    }

    /// Wraps `cause` as an unclassified failure.
    pub fn unknown(cause: impl Into<BoxError>) -> Self {
        Self::Unknown(cause.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Remote { .. } => FailureKind::Remote,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Io(_) => FailureKind::Io,
            Self::Unknown(_) => FailureKind::Unknown,
        }
    }
}

impl From<tokio::time::error::Elapsed> for TransferError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::timeout(err)
    }
}
