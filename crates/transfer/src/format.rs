//! Human-readable sizes and rates.
//!
//! Byte counts use binary units (1 KB = 1024 B), the convention transfer
//! sizes are requested in. Bit rates use decimal units (1 Mbps = 1_000_000
//! bits/s), the convention links are rated in.

use netgauge_protocol::TransferResult;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Output examples: `"512 B"`, `"1.50 KB"`, `"10.00 MB"`, `"1.00 GB"`.
pub fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < MIB {
        format!("{:.2} KB", b / KIB)
    } else if b < GIB {
        format!("{:.2} MB", b / MIB)
    } else {
        format!("{:.2} GB", b / GIB)
    }
}

/// Output examples: `"0 B/s"`, `"1.50 KB/s"`, `"23.40 MB/s"`.
pub fn format_bytes_per_second(bytes_per_sec: f64) -> String {
    let rate = bytes_per_sec.max(0.0);
    if rate < KIB {
        format!("{rate:.0} B/s")
    } else if rate < MIB {
        format!("{:.2} KB/s", rate / KIB)
    } else if rate < GIB {
        format!("{:.2} MB/s", rate / MIB)
    } else {
        format!("{:.2} GB/s", rate / GIB)
    }
}

/// Output examples: `"0 bps"`, `"1.50 Kbps"`, `"8.00 Mbps"`, `"1.20 Gbps"`.
pub fn format_bits_per_second(bits_per_sec: f64) -> String {
    const K: f64 = 1_000.0;
    const M: f64 = 1_000_000.0;
    const G: f64 = 1_000_000_000.0;

    let rate = bits_per_sec.max(0.0);
    if rate < K {
        format!("{rate:.0} bps")
    } else if rate < M {
        format!("{:.2} Kbps", rate / K)
    } else if rate < G {
        format!("{:.2} Mbps", rate / M)
    } else {
        format!("{:.2} Gbps", rate / G)
    }
}

/// One-line summary, e.g. `"10.00 MB in 1.250 s (67.11 Mbps, 8.00 MB/s)"`.
pub fn format_result(result: &TransferResult) -> String {
    format!(
        "{} in {:.3} s ({}, {})",
        format_bytes(result.size_bytes),
        result.duration().as_secs_f64(),
        format_bits_per_second(result.throughput_bits_per_second()),
        format_bytes_per_second(result.throughput_bytes_per_second()),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSizeError {
    #[error("empty size")]
    Empty,
    #[error("invalid number in size: {0}")]
    InvalidNumber(String),
    #[error("unknown size unit: {0}")]
    UnknownUnit(String),
    #[error("size does not fit in 64 bits: {0}")]
    Overflow(String),
}

/// Parses sizes such as `1048576`, `512k`, `10MiB` or `1.5g`.
///
/// Units are case-insensitive and always binary: `k`, `kb` and `kib` all
/// mean 1024 bytes.
pub fn parse_size(input: &str) -> Result<u64, ParseSizeError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ParseSizeError::Empty);
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        other => return Err(ParseSizeError::UnknownUnit(other.to_string())),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| ParseSizeError::Overflow(input.to_string()));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| ParseSizeError::InvalidNumber(number.to_string()))?;
    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(ParseSizeError::Overflow(input.to_string()));
    }
    Ok(bytes as u64)
}
