//! Client against a real server on an ephemeral port.

use std::error::Error;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use netgauge_client::{
    ClientClosed, ClientConfig, DownloadEvent, FailureKind, ProgressCallback, RandomSource,
    SizeLimits, ThroughputClient, TransferError, TransferProgress,
};
use netgauge_server::{ServerConfig, ThroughputServer, TransferService};

const MIB: i64 = 1024 * 1024;

async fn start_server(service: TransferService) -> (Arc<ThroughputServer>, u16) {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..ServerConfig::default()
    };
    let server = ThroughputServer::new(config, service);
    let server2 = Arc::clone(&server);
    tokio::spawn(async move {
        server2.run().await.unwrap();
    });

    // Wait for the server to bind.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let port = server.port().await;
    assert!(port > 0);
    (server, port)
}

fn client_for(port: u16) -> ThroughputClient {
    ThroughputClient::new(
        ClientConfig::new("127.0.0.1", port).with_random_source(RandomSource::Seeded(1)),
    )
    .unwrap()
}

fn recording() -> (ProgressCallback, Arc<Mutex<Vec<TransferProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));
    (callback, seen)
}

fn assert_progress(seen: &[TransferProgress], total: u64) {
    assert!(!seen.is_empty());
    assert!(seen.len() as u64 <= total.div_ceil(64 * 1024) + 1);
    assert_eq!(seen.iter().filter(|p| p.transferred == total).count(), 1);
    assert_eq!(seen.last().unwrap().transferred, total);
    assert!(seen.windows(2).all(|w| w[0].transferred < w[1].transferred));
}

#[tokio::test]
async fn download_ten_mib() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = client_for(port);
    let (progress, seen) = recording();

    let result = client.download(10 * MIB, Some(progress)).await.unwrap();
    assert_eq!(result.size_bytes, 10_485_760);
    assert!(result.end_time_millis >= result.start_time_millis);
    assert_progress(&seen.lock().unwrap(), 10_485_760);

    server.shutdown();
}

#[tokio::test]
async fn upload_five_mib() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = client_for(port);
    let (progress, seen) = recording();

    let result = client.upload(5 * MIB, Some(progress)).await.unwrap();
    assert_eq!(result.size_bytes, 5_242_880);
    assert_progress(&seen.lock().unwrap(), 5_242_880);

    server.shutdown();
}

#[tokio::test]
async fn legacy_download_route() {
    let (server, port) = start_server(TransferService::default()).await;
    let result = client_for(port).download_legacy(300_000, None).await.unwrap();
    assert_eq!(result.size_bytes, 300_000);
    server.shutdown();
}

#[tokio::test]
async fn server_limits_surface_as_remote_400() {
    let limits = SizeLimits {
        max_upload_bytes: 1024,
        max_download_bytes: 1024,
    };
    let (server, port) = start_server(TransferService::new(limits, RandomSource::Fast)).await;
    // Client limits are the 1 GiB defaults, so the server is the one refusing.
    let client = client_for(port);

    let err = client.download(4096, None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Remote);
    match err {
        TransferError::Remote { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("exceeds maximum"));
        }
        other => panic!("unexpected error: {other}"),
    }

    server.shutdown();
}

#[tokio::test]
async fn client_limits_reject_before_sending() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = ThroughputClient::new(ClientConfig::new("127.0.0.1", port).with_limits(
        SizeLimits {
            max_upload_bytes: 10,
            max_download_bytes: 10,
        },
    ))
    .unwrap();

    assert_eq!(
        client.upload(11, None).await.unwrap_err().kind(),
        FailureKind::Validation
    );
    assert_eq!(
        client.download(11, None).await.unwrap_err().kind(),
        FailureKind::Validation
    );
    server.shutdown();
}

#[tokio::test]
async fn flow_ends_with_one_result() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = client_for(port);

    let size = 1_000_003u64;
    let mut flow = pin!(client.download_as_flow(size as i64, None).unwrap());
    let mut chunk_bytes = 0u64;
    let mut results = Vec::new();
    while let Some(event) = flow.next().await {
        match event.unwrap() {
            DownloadEvent::Chunk(bytes) => {
                assert!(results.is_empty(), "chunk after result");
                chunk_bytes += bytes.len() as u64;
            }
            DownloadEvent::Result(result) => results.push(result),
        }
    }

    assert_eq!(chunk_bytes, size);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].size_bytes, size);
    server.shutdown();
}

#[tokio::test]
async fn flow_surfaces_remote_failure_once() {
    let limits = SizeLimits {
        max_upload_bytes: 1024,
        max_download_bytes: 1024,
    };
    let (server, port) = start_server(TransferService::new(limits, RandomSource::Fast)).await;
    let client = client_for(port);

    let events: Vec<_> = client
        .download_as_flow(2048, None)
        .unwrap()
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_ref().unwrap_err().kind(),
        FailureKind::Remote
    );
    server.shutdown();
}

#[tokio::test]
async fn download_and_upload_files() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = client_for(port);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin");

    let downloaded = client.download_to_file(MIB + 17, &path, None).await.unwrap();
    assert_eq!(downloaded.size_bytes, (MIB + 17) as u64);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), (MIB + 17) as u64);

    let (progress, seen) = recording();
    let uploaded = client.upload_file(&path, Some(progress)).await.unwrap();
    assert_eq!(uploaded.size_bytes, (MIB + 17) as u64);
    assert_progress(&seen.lock().unwrap(), (MIB + 17) as u64);

    server.shutdown();
}

#[tokio::test]
async fn rejected_download_creates_no_file() {
    let limits = SizeLimits {
        max_upload_bytes: 1024,
        max_download_bytes: 1024,
    };
    let (server, port) = start_server(TransferService::new(limits, RandomSource::Fast)).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.bin");

    let err = client_for(port)
        .download_to_file(2048, &path, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Remote);
    assert!(!path.exists());
    server.shutdown();
}

#[tokio::test]
async fn concurrent_transfers_are_independent() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = Arc::new(client_for(port));

    let mut handles = Vec::new();
    for i in 1..=4i64 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                client.upload(i * MIB, None).await
            } else {
                client.download(i * MIB, None).await
            }
        }));
    }
    for (i, handle) in (1..=4i64).zip(handles) {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.size_bytes, (i * MIB) as u64);
    }
    server.shutdown();
}

#[tokio::test]
async fn closed_client_fails_with_client_closed() {
    let (server, port) = start_server(TransferService::default()).await;
    let client = client_for(port);
    assert_eq!(client.download(1024, None).await.unwrap().size_bytes, 1024);

    client.close();
    let err = client.download(1024, None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unknown);
    assert!(err.source().unwrap().is::<ClientClosed>());
    server.shutdown();
}

#[tokio::test]
async fn request_timeout_is_timeout() {
    // A listener that accepts and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = ThroughputClient::new(
        ClientConfig::new("127.0.0.1", port).with_request_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let err = client.download(1024, None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn connection_dropped_mid_upload_is_io() {
    // Reads the start of the request, then hangs up.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = vec![0u8; 64 * 1024];
        socket.read_exact(&mut head).await.unwrap();
    });

    let err = client_for(port).upload(50 * MIB, None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Io, "{err}");
}

#[tokio::test]
async fn cancelled_upload_closes_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = tokio::spawn(async move { listener.accept().await.unwrap().0 });

    // Nobody reads yet, so the upload stalls once the socket buffers fill.
    let client = client_for(port);
    let outcome =
        tokio::time::timeout(Duration::from_millis(300), client.upload(64 * MIB, None)).await;
    assert!(outcome.is_err(), "upload finished against a silent peer");

    // The peer drains what was sent and must then see the connection end.
    let mut socket = accepted.await.unwrap();
    let drained = tokio::time::timeout(
        Duration::from_secs(10),
        tokio::io::copy(&mut socket, &mut tokio::io::sink()),
    )
    .await;
    assert!(drained.is_ok(), "connection still open after the upload was dropped");
    assert!(drained.unwrap().unwrap_or(0) < (64 * MIB) as u64);
}
