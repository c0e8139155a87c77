use std::time::Duration;

/// API version segment prefixed to every transfer route.
pub const API_VERSION: &str = "v1";

/// Route segment for downloads (`GET /{v}/download/{size}`, `POST /{v}/download`).
pub const DOWNLOAD_SEGMENT: &str = "download";

/// Route segment for uploads (`POST /{v}/upload`).
pub const UPLOAD_SEGMENT: &str = "upload";

/// Liveness probe route.
pub const HEALTH_PATH: &str = "/health";

/// Content type of generated and uploaded payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Default listen host for the server.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port for the server.
pub const DEFAULT_PORT: u16 = 8080;

/// Default for the connect, socket and request timeouts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cap for a single upload or download (1 GiB).
pub const DEFAULT_MAX_TRANSFER_BYTES: u64 = 1024 * 1024 * 1024;

/// Returns the download route prefix for an API version (`/v1/download`).
pub fn download_path(api_version: &str) -> String {
    format!("/{api_version}/{DOWNLOAD_SEGMENT}")
}

/// Returns the upload route for an API version (`/v1/upload`).
pub fn upload_path(api_version: &str) -> String {
    format!("/{api_version}/{UPLOAD_SEGMENT}")
}

/// File name advertised in `Content-Disposition` for a download.
pub fn download_filename(size_bytes: u64) -> String {
    format!("throughput-test-{size_bytes}.bin")
}

/// Full `Content-Disposition` header value for a download.
pub fn download_disposition(size_bytes: u64) -> String {
    format!("attachment; filename=\"{}\"", download_filename(size_bytes))
}
