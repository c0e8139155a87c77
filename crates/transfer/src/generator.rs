//! Bounded pseudo-random byte streams.

use std::fmt;
use std::str::FromStr;

use rand::rngs::{SmallRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::progress::{Pacer, ProgressReporter};
use crate::yielder::DEFAULT_YIELD_INTERVAL;
use crate::{CHUNK_SIZE, TransferError};

/// Where generated payload bytes come from.
///
/// Content is irrelevant to a throughput test, so the fast non-cryptographic
/// generator is the default. `Secure` costs CPU but never affects byte counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomSource {
    #[default]
    Fast,
    Secure,
    /// Deterministic output for reproducible tests.
    Seeded(u64),
}

impl RandomSource {
    /// Builds a fresh generator owned by a single transfer.
    pub fn rng(self) -> Box<dyn RngCore + Send> {
        match self {
            Self::Fast => Box::new(SmallRng::from_entropy()),
            Self::Secure => Box::new(StdRng::from_entropy()),
            Self::Seeded(seed) => Box::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Display for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => f.write_str("fast"),
            Self::Secure => f.write_str("secure"),
            Self::Seeded(seed) => write!(f, "seeded:{seed}"),
        }
    }
}

impl FromStr for RandomSource {
    type Err = String;

    /// Accepts `fast`, `secure` or `seeded:<u64>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "secure" => Ok(Self::Secure),
            other => other
                .strip_prefix("seeded:")
                .and_then(|seed| seed.parse().ok())
                .map(Self::Seeded)
                .ok_or_else(|| format!("unknown random source: {s}")),
        }
    }
}

/// Writes a bounded stream of random bytes into a sink, chunk by chunk.
pub struct RandomStreamGenerator {
    rng: Box<dyn RngCore + Send>,
    chunk_size: usize,
    yield_interval: u64,
}

impl RandomStreamGenerator {
    pub fn new(source: RandomSource) -> Self {
        Self {
            rng: source.rng(),
            chunk_size: CHUNK_SIZE,
            yield_interval: DEFAULT_YIELD_INTERVAL,
        }
    }

    /// Overrides the chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_yield_interval(mut self, interval: u64) -> Self {
        self.yield_interval = interval;
        self
    }

    /// Writes exactly `total_bytes` random bytes into `sink`, then flushes it.
    ///
    /// The last chunk is truncated to the remainder. The sink is not closed
    /// here; its owner closes it on every path.
    pub async fn generate<W>(
        &mut self,
        total_bytes: u64,
        sink: &mut W,
        progress: &ProgressReporter,
    ) -> Result<(), TransferError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut pacer = Pacer::new(progress, self.yield_interval);
        let mut written: u64 = 0;

        while written < total_bytes {
            let n = (total_bytes - written).min(self.chunk_size as u64) as usize;
            self.rng.fill_bytes(&mut buf[..n]);
            sink.write_all(&buf[..n]).await?;
            written += n as u64;
            pacer.after_chunk(written, Some(total_bytes)).await;
        }

        sink.flush().await?;
        tracing::trace!(written, state = ?pacer.state(), "random stream generated");
        Ok(())
    }
}

impl fmt::Debug for RandomStreamGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomStreamGenerator")
            .field("chunk_size", &self.chunk_size)
            .field("yield_interval", &self.yield_interval)
            .finish_non_exhaustive()
    }
}
