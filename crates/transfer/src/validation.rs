//! Transfer size limits.

use std::fmt;

use netgauge_protocol::constants::DEFAULT_MAX_TRANSFER_BYTES;

use crate::TransferError;

/// Which way the bytes flow, from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Download => f.write_str("download"),
        }
    }
}

/// Per-direction caps on a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_upload_bytes: u64,
    pub max_download_bytes: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            max_download_bytes: DEFAULT_MAX_TRANSFER_BYTES,
        }
    }
}

impl SizeLimits {
    pub fn max_for(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Upload => self.max_upload_bytes,
            Direction::Download => self.max_download_bytes,
        }
    }

    /// Validates a requested size for `direction`, returning it as unsigned.
    pub fn validate(&self, direction: Direction, size_bytes: i64) -> Result<u64, TransferError> {
        validate_size(size_bytes, self.max_for(direction)).map_err(|e| match e {
            TransferError::Validation(msg) => {
                TransferError::Validation(format!("{direction} {msg}"))
            }
            other => other,
        })
    }
}

/// Checks `0 < size_bytes <= max_bytes`.
pub fn validate_size(size_bytes: i64, max_bytes: u64) -> Result<u64, TransferError> {
    if size_bytes <= 0 {
        return Err(TransferError::Validation(format!(
            "size must be positive, got {size_bytes}"
        )));
    }
    let size = size_bytes as u64;
    if size > max_bytes {
        return Err(TransferError::Validation(format!(
            "size {size} exceeds maximum of {max_bytes} bytes"
        )));
    }
    Ok(size)
}
