//! Rate-limited progress notifications and per-transfer pacing.

use std::fmt;
use std::sync::Arc;

use crate::yielder::CooperativeYielder;

/// Default distance between progress reports: 64 KiB.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 64 * 1024;

/// Snapshot handed to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred: u64,
    /// Expected size, when the transfer knows it up front.
    pub total: Option<u64>,
}

impl TransferProgress {
    /// Completion percentage (0–100), if the total is known and non-zero.
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.transferred as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

/// Callback invoked with transfer progress.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Per-transfer pacing bookkeeping. Never shared between transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub last_reported_position: u64,
    pub next_yield_position: u64,
}

/// Returns `true` when a report is due at `transferred`.
///
/// A report is due once `interval` bytes have passed since the last one, when
/// the transfer reaches its known total, or when forced.
pub fn should_report(
    transferred: u64,
    total: Option<u64>,
    last_reported_position: u64,
    interval: u64,
    force: bool,
) -> bool {
    force
        || Some(transferred) == total
        || transferred.saturating_sub(last_reported_position) >= interval
}

/// Rate-limited progress notifications.
///
/// Wraps the optional callback once so transfer loops never branch on its
/// presence themselves. A reporter without a callback is a no-op.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    interval: u64,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// A reporter that never calls anything.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Overrides the byte interval between reports (minimum 1).
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Reports if due and returns the new last-reported position.
    ///
    /// Without a callback the position is returned unchanged.
    pub fn report_if_needed(
        &self,
        transferred: u64,
        total: Option<u64>,
        last_reported_position: u64,
        force: bool,
    ) -> u64 {
        let Some(callback) = &self.callback else {
            return last_reported_position;
        };
        if !should_report(transferred, total, last_reported_position, self.interval, force) {
            return last_reported_position;
        }
        callback(TransferProgress { transferred, total });
        transferred
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.is_enabled())
            .field("interval", &self.interval)
            .finish()
    }
}

impl From<Option<ProgressCallback>> for ProgressReporter {
    fn from(callback: Option<ProgressCallback>) -> Self {
        Self::new(callback)
    }
}

/// Runs the yield check and the progress check after every chunk.
pub(crate) struct Pacer<'a> {
    reporter: &'a ProgressReporter,
    yielder: CooperativeYielder,
    last_reported_position: u64,
}

impl<'a> Pacer<'a> {
    pub(crate) fn new(reporter: &'a ProgressReporter, yield_interval: u64) -> Self {
        Self {
            reporter,
            yielder: CooperativeYielder::new(yield_interval),
            last_reported_position: 0,
        }
    }

    pub(crate) async fn after_chunk(&mut self, transferred: u64, total: Option<u64>) {
        self.yielder.checkpoint(transferred).await;
        self.last_reported_position =
            self.reporter
                .report_if_needed(transferred, total, self.last_reported_position, false);
    }

    /// Forces a closing report unless the final position was already reported.
    pub(crate) fn finish(&mut self, transferred: u64, total: Option<u64>) {
        if transferred > 0 && transferred != self.last_reported_position {
            self.last_reported_position =
                self.reporter
                    .report_if_needed(transferred, total, self.last_reported_position, true);
        }
    }

    pub(crate) fn state(&self) -> ProgressState {
        ProgressState {
            last_reported_position: self.last_reported_position,
            next_yield_position: self.yielder.next_yield_position(),
        }
    }
}
