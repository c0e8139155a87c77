//! Chunked reading of byte sources, counting without retaining.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::progress::{Pacer, ProgressReporter};
use crate::yielder::DEFAULT_YIELD_INTERVAL;
use crate::{CHUNK_SIZE, TransferError};

/// Reads a byte source to end-of-stream in fixed-size chunks.
///
/// Bytes are counted and then dropped (or forwarded to a sink with
/// [`consume_into`](Self::consume_into)); the payload is never buffered whole.
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    chunk_size: usize,
    yield_interval: u64,
    idle_timeout: Option<Duration>,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            yield_interval: DEFAULT_YIELD_INTERVAL,
            idle_timeout: None,
        }
    }
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
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

    /// Fails with a timeout if a single read waits longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Reads `source` to the end and returns how many bytes it produced.
    ///
    /// The count is returned even when it differs from `expected_bytes`;
    /// comparing the two is the caller's job.
    pub async fn consume<R>(
        &self,
        source: &mut R,
        expected_bytes: Option<u64>,
        progress: &ProgressReporter,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.consume_into(source, &mut tokio::io::sink(), expected_bytes, progress)
            .await
    }

    /// Like [`consume`](Self::consume), but writes every chunk into `sink`.
    pub async fn consume_into<R, W>(
        &self,
        source: &mut R,
        sink: &mut W,
        expected_bytes: Option<u64>,
        progress: &ProgressReporter,
    ) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut pacer = Pacer::new(progress, self.yield_interval);
        let mut total: u64 = 0;

        loop {
            let n = self.read_chunk(source, &mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await?;
            total += n as u64;
            pacer.after_chunk(total, expected_bytes).await;
        }

        sink.flush().await?;
        pacer.finish(total, expected_bytes);
        tracing::trace!(total, state = ?pacer.state(), "stream consumed");
        Ok(total)
    }

    async fn read_chunk<R>(&self, source: &mut R, buf: &mut [u8]) -> Result<usize, TransferError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match self.idle_timeout {
            Some(limit) => Ok(tokio::time::timeout(limit, source.read(buf)).await??),
            None => Ok(source.read(buf).await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;
    use crate::{FailureKind, RandomSource, RandomStreamGenerator};

    /// Yields `good` zero bytes, then fails.
    struct BrokenSource {
        good: usize,
    }

    impl AsyncRead for BrokenSource {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.good == 0 {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }
            let n = self.good.min(buf.remaining());
            buf.put_slice(&vec![0u8; n]);
            self.good -= n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn counts_all_bytes() {
        let data = vec![1u8; 100_000];
        let mut source = &data[..];
        let n = StreamConsumer::new()
            .consume(&mut source, Some(100_000), &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(n, 100_000);
    }

    #[tokio::test]
    async fn returns_actual_count_on_mismatch() {
        let data = vec![0u8; 500];
        let mut source = &data[..];
        let n = StreamConsumer::new()
            .consume(&mut source, Some(1_000), &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(n, 500);
    }

    #[tokio::test]
    async fn generated_stream_is_fully_consumed() {
        for size in [1u64, 8_192, 1_000_003, 3 * 1024 * 1024] {
            let (mut writer, mut reader) = tokio::io::duplex(crate::PIPE_CAPACITY);
            let producer = tokio::spawn(async move {
                RandomStreamGenerator::new(RandomSource::Seeded(size))
                    .generate(size, &mut writer, &ProgressReporter::disabled())
                    .await
            });
            let consumed = StreamConsumer::new()
                .consume(&mut reader, Some(size), &ProgressReporter::disabled())
                .await
                .unwrap();
            producer.await.unwrap().unwrap();
            assert_eq!(consumed, size);
        }
    }

    #[tokio::test]
    async fn consume_into_forwards_bytes() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let mut source = &data[..];
        let mut sink = Vec::new();
        let n = StreamConsumer::new()
            .consume_into(&mut source, &mut sink, None, &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(n, 50_000);
        assert_eq!(sink, data);
    }

    #[tokio::test]
    async fn read_failure_is_io_error() {
        let mut source = BrokenSource { good: 20_000 };
        let err = StreamConsumer::new()
            .consume(&mut source, Some(40_000), &ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Io);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_source_times_out() {
        // Writer half stays open but never writes.
        let (_writer, mut reader) = tokio::io::duplex(64);
        let err = StreamConsumer::new()
            .with_idle_timeout(Some(Duration::from_secs(5)))
            .consume(&mut reader, Some(10), &ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn unknown_total_gets_closing_report() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Some(Arc::new(move |p| {
            sink_seen.lock().unwrap().push(p);
        })));

        let data = vec![0u8; 1_000];
        let mut source = &data[..];
        StreamConsumer::new()
            .consume(&mut source, None, &reporter)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].transferred, 1_000);
        assert_eq!(seen[0].total, None);
    }

    #[tokio::test]
    async fn small_chunks_still_bound_reports() {
        let count = Arc::new(Mutex::new(0u64));
        let counter = Arc::clone(&count);
        let reporter = ProgressReporter::new(Some(Arc::new(move |_| {
            *counter.lock().unwrap() += 1;
        })))
        .with_interval(10_000);

        let data = vec![0u8; 100_000];
        let mut source = &data[..];
        StreamConsumer::new()
            .with_chunk_size(100)
            .consume(&mut source, Some(100_000), &reporter)
            .await
            .unwrap();

        assert!(*count.lock().unwrap() <= 100_000 / 10_000 + 1);
    }
}
