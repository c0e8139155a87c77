use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Outcome of a single upload or download.
///
/// Timestamps are wall-clock epoch milliseconds taken when the transfer body
/// began and finished. Throughput figures are always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub start_time_millis: u64,
    pub end_time_millis: u64,
    pub size_bytes: u64,
}

impl TransferResult {
    /// Creates a result, clamping `end_time_millis` so it never precedes the start.
    pub fn new(start_time_millis: u64, end_time_millis: u64, size_bytes: u64) -> Self {
        Self {
            start_time_millis,
            end_time_millis: end_time_millis.max(start_time_millis),
            size_bytes,
        }
    }

    /// Elapsed time in milliseconds.
    pub fn duration_millis(&self) -> u64 {
        self.end_time_millis.saturating_sub(self.start_time_millis)
    }

    /// Elapsed time as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_millis())
    }

    /// Bytes per second, or `0.0` when no time elapsed.
    pub fn throughput_bytes_per_second(&self) -> f64 {
        let millis = self.duration_millis();
        if millis == 0 {
            return 0.0;
        }
        self.size_bytes as f64 / (millis as f64 / 1000.0)
    }

    pub fn throughput_bits_per_second(&self) -> f64 {
        self.throughput_bytes_per_second() * 8.0
    }

    /// Decimal megabits per second.
    pub fn throughput_mbps(&self) -> f64 {
        self.throughput_bits_per_second() / 1_000_000.0
    }

    /// Binary mebibits per second.
    pub fn throughput_mibps(&self) -> f64 {
        self.throughput_bits_per_second() / 1_048_576.0
    }
}

/// Body of the deprecated `POST /{v}/download` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub size_bytes: i64,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
