//! Streaming transfer core.
//!
//! Generates and consumes large byte streams in fixed-size chunks without
//! holding the payload in memory, reporting progress at a bounded rate and
//! yielding to the scheduler at fixed byte intervals.

mod consumer;
mod error;
pub mod format;
mod generator;
mod progress;
mod validation;
mod yielder;

pub use consumer::StreamConsumer;
pub use error::{BoxError, FailureKind, TransferError};
pub use generator::{RandomSource, RandomStreamGenerator};
pub use progress::{
    DEFAULT_PROGRESS_INTERVAL, ProgressCallback, ProgressReporter, ProgressState,
    TransferProgress, should_report,
};
pub use validation::{Direction, SizeLimits, validate_size};
pub use yielder::{CooperativeYielder, DEFAULT_YIELD_INTERVAL, should_yield};

/// Unit of I/O for every transfer loop: 8 KiB.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Capacity of the in-memory pipe between a producer task and an HTTP body.
pub const PIPE_CAPACITY: usize = 64 * 1024;
