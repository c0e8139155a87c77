use std::io::Write;
use std::pin::pin;
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use serde::Serialize;

use netgauge_client::{
    DownloadEvent, ProgressCallback, ThroughputClient, TransferProgress, TransferResult,
};
use netgauge_transfer::format::{format_bytes, format_result};

use crate::cli::{Cli, Command};

/// One finished test, as printed with `--json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    test: &'static str,
    #[serde(flatten)]
    result: TransferResult,
    duration_millis: u64,
    throughput_bytes_per_second: f64,
    throughput_mbps: f64,
    throughput_mibps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<u64>,
}

impl Report {
    fn new(test: &'static str, result: TransferResult) -> Self {
        Self {
            test,
            result,
            duration_millis: result.duration_millis(),
            throughput_bytes_per_second: result.throughput_bytes_per_second(),
            throughput_mbps: result.throughput_mbps(),
            throughput_mibps: result.throughput_mibps(),
            chunks: None,
        }
    }

    fn summary(&self) -> String {
        match self.chunks {
            Some(chunks) => format!(
                "{}: {} ({chunks} chunks)",
                self.test,
                format_result(&self.result)
            ),
            None => format!("{}: {}", self.test, format_result(&self.result)),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = ThroughputClient::new(cli.client_config())
        .context("building HTTP client")?;
    let progress = cli.progress.then(progress_printer);
    tracing::debug!(url = %client.config().base_url(), command = ?cli.command, "running test");

    let outcome = execute(&client, &cli.command, progress).await;
    client.close();
    if cli.progress {
        eprintln!();
    }
    let report = outcome?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}

async fn execute(
    client: &ThroughputClient,
    command: &Command,
    progress: Option<ProgressCallback>,
) -> anyhow::Result<Report> {
    let report = match command {
        Command::Download { size, legacy: false } => {
            let result = client.download(request_size(*size), progress).await?;
            Report::new("download", result)
        }
        Command::Download { size, legacy: true } => {
            let result = client.download_legacy(request_size(*size), progress).await?;
            Report::new("download", result)
        }
        Command::Upload { size } => {
            let result = client.upload(request_size(*size), progress).await?;
            Report::new("upload", result)
        }
        Command::DownloadFile { size, path } => {
            let result = client
                .download_to_file(request_size(*size), path, progress)
                .await
                .with_context(|| format!("downloading into {}", path.display()))?;
            Report::new("download-file", result)
        }
        Command::UploadFile { path } => {
            let result = client
                .upload_file(path, progress)
                .await
                .with_context(|| format!("uploading {}", path.display()))?;
            Report::new("upload-file", result)
        }
        Command::Stream { size } => stream(client, *size, progress).await?,
    };
    Ok(report)
}

async fn stream(
    client: &ThroughputClient,
    size: u64,
    progress: Option<ProgressCallback>,
) -> anyhow::Result<Report> {
    let mut events = pin!(client.download_as_flow(request_size(size), progress)?);
    let mut chunks = 0u64;
    while let Some(event) = events.next().await {
        match event? {
            DownloadEvent::Chunk(_) => chunks += 1,
            DownloadEvent::Result(result) => {
                let mut report = Report::new("stream", result);
                report.chunks = Some(chunks);
                return Ok(report);
            }
        }
    }
    anyhow::bail!("download stream ended without a result")
}

/// Sizes above `i64::MAX` are passed through saturated so the client's own
/// validation rejects them.
fn request_size(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn progress_printer() -> ProgressCallback {
    Arc::new(|p: TransferProgress| {
        let line = match p.percentage() {
            Some(pct) => format!("\r{} ({pct:5.1}%)", format_bytes(p.transferred)),
            None => format!("\r{}", format_bytes(p.transferred)),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    })
}
