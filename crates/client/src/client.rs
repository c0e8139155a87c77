//! Upload and download orchestration over HTTP.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use netgauge_protocol::constants::OCTET_STREAM;
use netgauge_protocol::{DownloadRequest, TransferResult, now_millis};
use netgauge_transfer::{
    CHUNK_SIZE, CooperativeYielder, Direction, PIPE_CAPACITY, ProgressCallback, ProgressReporter,
    RandomStreamGenerator, StreamConsumer, TransferError,
};

use crate::config::ClientConfig;
use crate::error::{self, ClientClosed};
use crate::events::DownloadEvent;

type BodyReader = StreamReader<Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>, Bytes>;

type FlowItem = Result<DownloadEvent, TransferError>;

/// Drives throughput tests against one server.
///
/// Owns a single HTTP connection pool until [`close`](Self::close) is called.
/// Every transfer validates its size before touching the network and never
/// retries.
pub struct ThroughputClient {
    config: ClientConfig,
    http: RwLock<Option<reqwest::Client>>,
}

impl ThroughputClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransferError> {
        let http = config.build_http_client()?;
        Ok(Self {
            config,
            http: RwLock::new(Some(http)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Releases the connection pool. Later calls fail with [`ClientClosed`].
    pub fn close(&self) {
        let released = self
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!(base_url = %self.config.base_url(), "client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Streams `size_bytes` random bytes to the server and returns the
    /// server's measurement.
    pub async fn upload(
        &self,
        size_bytes: i64,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError> {
        let size = self.config.limits.validate(Direction::Upload, size_bytes)?;
        let http = self.http()?;

        let reporter = ProgressReporter::new(progress);
        let mut generator = RandomStreamGenerator::new(self.config.random_source);
        let (mut writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let producer = Producer::spawn(async move {
            let result = generator.generate(size, &mut writer, &reporter).await;
            (result, writer)
        });

        self.send_upload(&http, size, reader, producer).await
    }

    /// Uploads a file; its length is the transfer size.
    ///
    /// Sizing needs the file system, so the closed check runs first here.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError> {
        let path = path.as_ref();
        let http = self.http()?;
        let len = tokio::fs::metadata(path).await?.len();
        let size = self
            .config
            .limits
            .validate(Direction::Upload, i64::try_from(len).unwrap_or(i64::MAX))?;
        let file = tokio::fs::File::open(path).await?;
        debug!(path = %path.display(), size, "uploading file");

        let reporter = ProgressReporter::new(progress);
        let (mut writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let producer = Producer::spawn(async move {
            let mut source = file.take(size);
            let result = match StreamConsumer::new()
                .consume_into(&mut source, &mut writer, Some(size), &reporter)
                .await
            {
                Ok(copied) if copied == size => Ok(()),
                Ok(copied) => Err(TransferError::from(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended after {copied} of {size} bytes"),
                ))),
                Err(e) => Err(e),
            };
            (result, writer)
        });

        self.send_upload(&http, size, reader, producer).await
    }

    /// Downloads `size_bytes` bytes, counting and discarding them.
    pub async fn download(
        &self,
        size_bytes: i64,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError> {
        let size = self
            .config
            .limits
            .validate(Direction::Download, size_bytes)?;
        let http = self.http()?;
        let response = open_download(self.timed(http.get(self.config.download_url(size)))).await?;
        self.consume_response(response, size, &mut tokio::io::sink(), progress)
            .await
    }

    /// Same as [`download`](Self::download), through the deprecated
    /// JSON-body route.
    pub async fn download_legacy(
        &self,
        size_bytes: i64,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError> {
        let size = self
            .config
            .limits
            .validate(Direction::Download, size_bytes)?;
        let http = self.http()?;
        let request = http
            .post(self.config.legacy_download_url())
            .json(&DownloadRequest { size_bytes });
        let response = open_download(self.timed(request)).await?;
        self.consume_response(response, size, &mut tokio::io::sink(), progress)
            .await
    }

    /// Downloads into a file, created once the server has accepted the request.
    pub async fn download_to_file(
        &self,
        size_bytes: i64,
        path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError> {
        let size = self
            .config
            .limits
            .validate(Direction::Download, size_bytes)?;
        let http = self.http()?;
        let response = open_download(self.timed(http.get(self.config.download_url(size)))).await?;

        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        let result = self
            .consume_response(response, size, &mut file, progress)
            .await?;
        file.sync_all().await?;
        Ok(result)
    }

    /// Returns the download as a lazy stream of events.
    ///
    /// Validation and the closed check happen here; the request itself is
    /// only sent once the stream is first polled.
    pub fn download_as_flow(
        &self,
        size_bytes: i64,
        progress: Option<ProgressCallback>,
    ) -> Result<impl Stream<Item = FlowItem> + Send + use<>, TransferError> {
        let size = self
            .config
            .limits
            .validate(Direction::Download, size_bytes)?;
        let http = self.http()?;

        let pending = Flow::Pending {
            request: self.timed(http.get(self.config.download_url(size))),
            size,
            reporter: ProgressReporter::new(progress),
            idle_timeout: self.config.socket_timeout,
        };
        Ok(futures_util::stream::unfold(pending, Flow::advance))
    }

    fn http(&self) -> Result<reqwest::Client, TransferError> {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| TransferError::unknown(ClientClosed))
    }

    fn timed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.timeout(self.config.request_timeout)
    }

    async fn send_upload(
        &self,
        http: &reqwest::Client,
        size: u64,
        body: DuplexStream,
        mut producer: Producer,
    ) -> Result<TransferResult, TransferError> {
        let started = Instant::now();
        let request = http
            .post(self.config.upload_url())
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)));

        let response = match self.timed(request).send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(producer
                    .local_failure()
                    .unwrap_or_else(|| error::from_send_error(e)));
            }
        };
        if !response.status().is_success() {
            return Err(error::from_response(response).await);
        }
        producer.finish().await?;

        let result: TransferResult = response.json().await.map_err(error::from_reqwest)?;
        if result.size_bytes != size {
            warn!(
                requested = size,
                received = result.size_bytes,
                "server counted a different upload size"
            );
        }
        info!(
            size_bytes = result.size_bytes,
            mbps = result.throughput_mbps(),
            client_elapsed_ms = started.elapsed().as_millis() as u64,
            "upload complete"
        );
        Ok(result)
    }

    async fn consume_response<W>(
        &self,
        response: reqwest::Response,
        size: u64,
        sink: &mut W,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferResult, TransferError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let reporter = ProgressReporter::new(progress);
        let mut body = body_reader(response);

        let start = now_millis();
        let received = StreamConsumer::new()
            .with_idle_timeout(Some(self.config.socket_timeout))
            .consume_into(&mut body, sink, Some(size), &reporter)
            .await
            .map_err(error::reclassify)?;
        let end = now_millis();

        Ok(log_download(size, TransferResult::new(start, end, received)))
    }
}

impl Drop for ThroughputClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn open_download(request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransferError> {
    let response = request.send().await.map_err(error::from_reqwest)?;
    if !response.status().is_success() {
        return Err(error::from_response(response).await);
    }
    Ok(response)
}

fn body_reader(response: reqwest::Response) -> BodyReader {
    StreamReader::new(Box::pin(
        response.bytes_stream().map_err(error::body_io_error),
    ))
}

fn log_download(requested: u64, result: TransferResult) -> TransferResult {
    if result.size_bytes != requested {
        warn!(
            requested,
            received = result.size_bytes,
            "download size mismatch"
        );
    }
    info!(
        size_bytes = result.size_bytes,
        duration_ms = result.duration_millis(),
        mbps = result.throughput_mbps(),
        "download complete"
    );
    result
}

/// Task writing an upload body into its pipe. Aborted on drop.
struct Producer {
    task: JoinHandle<()>,
    outcome: oneshot::Receiver<Result<(), TransferError>>,
}

impl Producer {
    /// `work` hands the pipe writer back so it is closed after the outcome is
    /// published.
    fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = (Result<(), TransferError>, DuplexStream)> + Send + 'static,
    {
        let (tx, outcome) = oneshot::channel();
        let task = tokio::spawn(async move {
            let (result, mut writer) = work.await;
            // The outcome must be visible before the body sees EOF.
            let _ = tx.send(result);
            let _ = writer.shutdown().await;
        });
        Self { task, outcome }
    }

    /// The producer's own failure, unless it only lost its reader.
    fn local_failure(&mut self) -> Option<TransferError> {
        match self.outcome.try_recv() {
            Ok(Err(e)) if !error::is_broken_pipe(&e) => Some(e),
            _ => None,
        }
    }

    async fn finish(&mut self) -> Result<(), TransferError> {
        (&mut self.outcome)
            .await
            .map_err(|_| TransferError::unknown("upload body producer stopped early"))?
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// State of a [`ThroughputClient::download_as_flow`] stream.
enum Flow {
    Pending {
        request: reqwest::RequestBuilder,
        size: u64,
        reporter: ProgressReporter,
        idle_timeout: Duration,
    },
    Streaming(Box<FlowBody>),
    Done,
}

impl Flow {
    async fn advance(self) -> Option<(FlowItem, Flow)> {
        match self {
            Flow::Done => None,
            Flow::Pending {
                request,
                size,
                reporter,
                idle_timeout,
            } => match open_download(request).await {
                Ok(response) => {
                    FlowBody::new(response, size, reporter, idle_timeout)
                        .next_event()
                        .await
                }
                Err(e) => Some((Err(e), Flow::Done)),
            },
            Flow::Streaming(body) => body.next_event().await,
        }
    }
}

struct FlowBody {
    body: BodyReader,
    buf: Vec<u8>,
    size: u64,
    received: u64,
    last_reported: u64,
    start_time_millis: u64,
    reporter: ProgressReporter,
    yielder: CooperativeYielder,
    idle_timeout: Duration,
}

impl FlowBody {
    fn new(
        response: reqwest::Response,
        size: u64,
        reporter: ProgressReporter,
        idle_timeout: Duration,
    ) -> Box<Self> {
        Box::new(Self {
            body: body_reader(response),
            buf: vec![0u8; CHUNK_SIZE],
            size,
            received: 0,
            last_reported: 0,
            start_time_millis: now_millis(),
            reporter,
            yielder: CooperativeYielder::default(),
            idle_timeout,
        })
    }

    async fn next_event(mut self: Box<Self>) -> Option<(FlowItem, Flow)> {
        let this = &mut *self;
        let n = match tokio::time::timeout(this.idle_timeout, this.body.read(&mut this.buf)).await
        {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Some((Err(error::reclassify(e.into())), Flow::Done)),
            Err(elapsed) => return Some((Err(elapsed.into()), Flow::Done)),
        };

        if n == 0 {
            if this.received > 0 && this.received != this.last_reported {
                this.reporter
                    .report_if_needed(this.received, Some(this.size), this.last_reported, true);
            }
            let result = TransferResult::new(this.start_time_millis, now_millis(), this.received);
            return Some((
                Ok(DownloadEvent::Result(log_download(this.size, result))),
                Flow::Done,
            ));
        }

        this.received += n as u64;
        this.yielder.checkpoint(this.received).await;
        this.last_reported = this.reporter.report_if_needed(
            this.received,
            Some(this.size),
            this.last_reported,
            false,
        );
        let chunk = Bytes::copy_from_slice(&this.buf[..n]);
        Some((Ok(DownloadEvent::Chunk(chunk)), Flow::Streaming(self)))
    }
}
