//! HTTP surface of the throughput server.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use netgauge_protocol::constants::{
    HEALTH_PATH, OCTET_STREAM, download_disposition, download_path, upload_path,
};
use netgauge_protocol::{DownloadRequest, TransferResult};
use netgauge_transfer::{FailureKind, TransferError};

use crate::TransferService;

type AppState = Arc<TransferService>;

/// Builds the router for one API version.
pub fn build_router(service: AppState, api_version: &str, request_timeout: Duration) -> Router {
    let download = download_path(api_version);

    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(&format!("{download}/:size_bytes"), get(download_by_path))
        .route(&download, post(download_by_body))
        .route(
            &upload_path(api_version),
            post(upload).layer(DefaultBodyLimit::disable()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(service)
}

/// HTTP status for a transfer failure.
pub fn status_for(err: &TransferError) -> StatusCode {
    match err.kind() {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        FailureKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        FailureKind::Io | FailureKind::Remote | FailureKind::Unknown => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A [`TransferError`] rendered as a plain-text response.
#[derive(Debug)]
pub struct ApiError(pub TransferError);

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::debug!(%status, "request rejected: {}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn download_by_path(
    State(service): State<AppState>,
    Path(size_bytes): Path<String>,
) -> Result<Response, ApiError> {
    let size_bytes: i64 = size_bytes
        .parse()
        .map_err(|_| TransferError::Validation(format!("invalid size: {size_bytes:?}")))?;
    stream_download(&service, size_bytes)
}

async fn download_by_body(
    State(service): State<AppState>,
    req: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // Malformed bodies get the same 400 as a bad size in the path.
    let Json(req) = req.map_err(|rejection| {
        TransferError::Validation(format!("invalid download request: {}", rejection.body_text()))
    })?;
    tracing::warn!(
        size_bytes = req.size_bytes,
        "deprecated POST download route used; switch to GET with the size in the path"
    );
    stream_download(&service, req.size_bytes)
}

fn stream_download(service: &TransferService, size_bytes: i64) -> Result<Response, ApiError> {
    let stream = service.handle_download(size_bytes)?;
    let size = stream.size_bytes();
    let body = Body::from_stream(ReaderStream::new(stream.into_reader()));

    Ok((
        [
            (header::CONTENT_TYPE, OCTET_STREAM.to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CONTENT_DISPOSITION, download_disposition(size)),
        ],
        body,
    )
        .into_response())
}

async fn upload(
    State(service): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<TransferResult>, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let mut reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let result = service.handle_upload(&mut reader, declared).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&TransferError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&TransferError::timeout("slow")),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            status_for(&TransferError::from(io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&TransferError::unknown("?")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_is_plain_text() {
        let response = ApiError(TransferError::Validation("bad size".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}
