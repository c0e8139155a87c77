use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use netgauge_client::{ClientConfig, RandomSource, SizeLimits};
use netgauge_protocol::constants::{API_VERSION, DEFAULT_PORT};
use netgauge_transfer::format::parse_size;

#[derive(Debug, Parser)]
#[command(name = "netgauge", version, about = "Measure throughput against a netgauge server")]
pub struct Cli {
    #[arg(long, default_value = "localhost", env = "NETGAUGE_HOST")]
    pub host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "NETGAUGE_PORT")]
    pub port: u16,

    #[arg(long, default_value = "http")]
    pub scheme: String,

    #[arg(long, default_value = API_VERSION)]
    pub api_version: String,

    #[arg(long, default_value_t = 60)]
    pub connect_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    pub socket_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Largest upload allowed, e.g. `512MiB`.
    #[arg(long, value_parser = parse_size_arg, default_value = "1GiB")]
    pub max_upload: u64,

    /// Largest download allowed, e.g. `512MiB`.
    #[arg(long, value_parser = parse_size_arg, default_value = "1GiB")]
    pub max_download: u64,

    /// `fast`, `secure` or `seeded:<n>`.
    #[arg(long, default_value = "fast")]
    pub random_source: RandomSource,

    /// Print the result as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Show live progress on stderr.
    #[arg(long, global = true)]
    pub progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download SIZE random bytes and discard them.
    Download {
        #[arg(value_parser = parse_size_arg)]
        size: u64,
        /// Use the deprecated JSON-body route.
        #[arg(long)]
        legacy: bool,
    },
    /// Upload SIZE random bytes.
    Upload {
        #[arg(value_parser = parse_size_arg)]
        size: u64,
    },
    /// Download SIZE random bytes into PATH.
    DownloadFile {
        #[arg(value_parser = parse_size_arg)]
        size: u64,
        path: PathBuf,
    },
    /// Upload the contents of PATH.
    UploadFile { path: PathBuf },
    /// Download SIZE bytes as an event stream and count the chunks.
    Stream {
        #[arg(value_parser = parse_size_arg)]
        size: u64,
    },
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.host.clone(), self.port)
            .with_scheme(self.scheme.clone())
            .with_api_version(self.api_version.clone())
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_socket_timeout(Duration::from_secs(self.socket_timeout_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_limits(SizeLimits {
                max_upload_bytes: self.max_upload,
                max_download_bytes: self.max_download,
            })
            .with_random_source(self.random_source)
    }
}
