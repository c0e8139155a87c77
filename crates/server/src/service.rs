use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use netgauge_protocol::{TransferResult, now_millis};
use netgauge_transfer::{
    Direction, PIPE_CAPACITY, ProgressReporter, RandomSource, RandomStreamGenerator, SizeLimits,
    StreamConsumer, TransferError,
};

/// Server-side transfer logic, independent of HTTP.
#[derive(Debug, Clone, Default)]
pub struct TransferService {
    limits: SizeLimits,
    random_source: RandomSource,
    idle_timeout: Option<Duration>,
}

/// Read half of a download pipe, fed by a spawned generator task.
#[derive(Debug)]
pub struct DownloadStream {
    size_bytes: u64,
    reader: DuplexStream,
    generator: JoinHandle<()>,
}

impl DownloadStream {
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The pipe alone; the generator task is detached.
    pub fn into_reader(self) -> DuplexStream {
        self.reader
    }

    /// The pipe and the generator task writing into it.
    pub fn into_parts(self) -> (DuplexStream, JoinHandle<()>) {
        (self.reader, self.generator)
    }
}

impl TransferService {
    pub fn new(limits: SizeLimits, random_source: RandomSource) -> Self {
        Self {
            limits,
            random_source,
            idle_timeout: None,
        }
    }

    /// Bounds the wait for each upload chunk.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Validates `size_bytes` and starts generating the download.
    ///
    /// The generator runs in its own task and writes into an in-memory pipe.
    /// Dropping the returned stream breaks the pipe, which ends that task.
    pub fn handle_download(&self, size_bytes: i64) -> Result<DownloadStream, TransferError> {
        let size = self.limits.validate(Direction::Download, size_bytes)?;
        let (mut writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let mut generator = RandomStreamGenerator::new(self.random_source);

        let generator = tokio::spawn(async move {
            let started = std::time::Instant::now();
            match generator
                .generate(size, &mut writer, &ProgressReporter::disabled())
                .await
            {
                Ok(()) => tracing::debug!(
                    size_bytes = size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "download stream finished"
                ),
                Err(e) => tracing::warn!(size_bytes = size, "download stream aborted: {e}"),
            }
            let _ = writer.shutdown().await;
        });

        tracing::debug!(size_bytes = size, "download started");
        Ok(DownloadStream {
            size_bytes: size,
            reader,
            generator,
        })
    }

    /// Consumes an upload and times it.
    ///
    /// `declared_length` is the request's `Content-Length`; without it the
    /// upload is rejected before a single byte is read.
    pub async fn handle_upload<R>(
        &self,
        source: &mut R,
        declared_length: Option<u64>,
    ) -> Result<TransferResult, TransferError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let Some(declared) = declared_length else {
            return Err(TransferError::Validation(
                "upload requires a Content-Length header".into(),
            ));
        };
        let expected = self.limits.validate(
            Direction::Upload,
            i64::try_from(declared).unwrap_or(i64::MAX),
        )?;

        let consumer = StreamConsumer::new().with_idle_timeout(self.idle_timeout);
        let start = now_millis();
        let received = consumer
            .consume(source, Some(expected), &ProgressReporter::disabled())
            .await?;
        let end = now_millis();

        if received != expected {
            tracing::warn!(
                expected,
                received,
                "upload size mismatch with Content-Length"
            );
        }

        let result = TransferResult::new(start, end, received);
        tracing::info!(
            size_bytes = result.size_bytes,
            duration_ms = result.duration_millis(),
            mbps = result.throughput_mbps(),
            "upload received"
        );
        Ok(result)
    }
}
