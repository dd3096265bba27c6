// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Download counters reported at the end of every run.

use std::fmt;
use std::time::Duration;

/// Per-client counters. Created with the client and never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub files_downloaded: u64,
    pub bytes_downloaded: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    /// Wall time spent receiving successful downloads.
    pub download_time: Duration,
}

impl DownloadStats {
    pub fn record_download(&mut self, bytes: u64, elapsed: Duration) {
        self.files_downloaded += 1;
        self.bytes_downloaded += bytes;
        self.download_time += elapsed;
    }

    pub fn record_skip(&mut self) {
        self.files_skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.files_failed += 1;
    }

    pub fn files_total(&self) -> u64 {
        self.files_downloaded + self.files_skipped + self.files_failed
    }

    /// Average throughput over all successful downloads, in bytes/s.
    pub fn throughput(&self) -> u64 {
        throughput(self.bytes_downloaded, self.download_time)
    }
}

impl fmt::Display for DownloadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files downloaded ({}, {}ps), {} files skipped, {} files failed, {} files total",
            self.files_downloaded,
            format_bytes(self.bytes_downloaded),
            format_bytes(self.throughput()),
            self.files_skipped,
            self.files_failed,
            self.files_total()
        )
    }
}

pub fn throughput(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return bytes;
    }
    (bytes as f64 / secs) as u64
}

/// Human readable size with binary units, truncated to two decimals: `1.5 mb`.
pub fn format_bytes(size: u64) -> String {
    const LABELS: [&str; 5] = ["", "k", "m", "g", "t"];
    let mut value = size as f64;
    let mut power = 0;
    while value > 1024.0 && power < LABELS.len() - 1 {
        value /= 1024.0;
        power += 1;
    }
    format!("{} {}b", (value * 100.0).trunc() / 100.0, LABELS[power])
}
