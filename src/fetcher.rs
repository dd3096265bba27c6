// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Segment fetcher: one download target → one file on disk.
//!
//! Each fetch:
//!  1. Short-circuits when skip-existing is on and the file is already there.
//!     Skipped targets never wait and never touch the network.
//!  2. Waits `download_wait` unless this is the first request of the run,
//!     then optionally leaves an empty placeholder so an interrupted run
//!     steps over this target next time.
//!  3. Issues an authorized GET (the session re-authenticates once on 401).
//!  4. Streams a 200 body into `<file>.part`, then renames it into place.
//!  5. Retries unexpected statuses and network errors, sleeping between
//!     attempts, up to `max_retries` attempts.
//!
//! Partial files never survive a failed attempt.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::api::error_message;
use crate::camera::id_suffix;
use crate::config::DownloadConfig;
use crate::error::{ProtectError, Result};
use crate::session::Session;
use crate::stats::{format_bytes, throughput, DownloadStats};

/// What to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// A slice of continuous recording, at most one hour long.
    FootageSegment {
        camera_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Snapshot {
        camera_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The clip covering one motion event.
    MotionEvent {
        event_id: String,
        camera_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Motion heatmap image attached to an event.
    Heatmap { event_id: String, heatmap_id: String },
}

impl DownloadTarget {
    /// Path and query relative to the API base path.
    pub fn request_path(&self) -> String {
        match self {
            DownloadTarget::FootageSegment { camera_id, start, end }
            | DownloadTarget::MotionEvent { camera_id, start, end, .. } => format!(
                "/video/export?camera={camera_id}&start={}&end={}",
                start.timestamp_millis(),
                end.timestamp_millis()
            ),
            DownloadTarget::Snapshot { camera_id, timestamp } => format!(
                "/cameras/{camera_id}/snapshot?ts={}",
                timestamp.timestamp_millis()
            ),
            DownloadTarget::Heatmap { heatmap_id, .. } => format!("/heatmaps/{heatmap_id}"),
        }
    }

    fn label(&self) -> String {
        match self {
            DownloadTarget::FootageSegment { camera_id, start, end } => {
                format!("footage {} {start} - {end}", id_suffix(camera_id))
            }
            DownloadTarget::Snapshot { camera_id, timestamp } => {
                format!("snapshot {} {timestamp}", id_suffix(camera_id))
            }
            DownloadTarget::MotionEvent { event_id, .. } => format!("event {}", id_suffix(event_id)),
            DownloadTarget::Heatmap { event_id, .. } => format!("heatmap {}", id_suffix(event_id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
    /// The server answered with an empty placeholder clip.
    TooSmall { bytes: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Http { status: u16 },
    Transport,
}

impl FailureKind {
    fn from_error(error: &ProtectError) -> Self {
        match error {
            ProtectError::DownloadFailed { status, .. } => FailureKind::Http { status: *status },
            _ => FailureKind::Transport,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64, elapsed: Duration },
    Skipped(SkipReason),
    /// Retries exhausted while failed downloads are ignored.
    Failed(FailureKind),
}

/// Knobs the fetcher needs from [`DownloadConfig`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub skip_existing_files: bool,
    pub ignore_failed_downloads: bool,
    /// Leave an empty file at the destination before the first attempt.
    pub touch_files: bool,
    /// Pause before every request after the first one that reached the server.
    pub download_wait: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub min_payload_bytes: u64,
}

impl From<&DownloadConfig> for FetchPolicy {
    fn from(cfg: &DownloadConfig) -> Self {
        Self {
            skip_existing_files: cfg.skip_existing_files,
            ignore_failed_downloads: cfg.ignore_failed_downloads,
            touch_files: cfg.touch_files,
            download_wait: cfg.download_wait(),
            max_retries: cfg.max_retries,
            // Never below the configured floor, even with no download wait.
            retry_delay: cfg.download_wait().max(Duration::from_secs(cfg.min_retry_delay_secs)),
            min_payload_bytes: cfg.min_payload_bytes,
        }
    }
}

/// Downloads targets one at a time and keeps the run's counters.
pub struct Fetcher {
    policy: FetchPolicy,
    stats: DownloadStats,
    /// Targets that went past the skip-existing check.
    requested: u64,
}

impl Fetcher {
    pub fn new(policy: FetchPolicy) -> Self {
        Self { policy, stats: DownloadStats::default(), requested: 0 }
    }

    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Download `target` to `dest`.
    ///
    /// `Err` is fatal for the run: authentication problems, local I/O errors,
    /// and exhausted retries unless failed downloads are ignored.
    pub async fn fetch(
        &mut self,
        session: &Session,
        target: &DownloadTarget,
        dest: &Path,
    ) -> Result<FetchOutcome> {
        if self.policy.skip_existing_files && dest.exists() {
            info!(path = ?dest, "File already exists on disk, skipping download");
            self.stats.record_skip();
            return Ok(FetchOutcome::Skipped(SkipReason::AlreadyExists));
        }

        if self.requested > 0 && !self.policy.download_wait.is_zero() {
            debug!(secs = self.policy.download_wait.as_secs(), "Waiting before next download");
            tokio::time::sleep(self.policy.download_wait).await;
        }
        self.requested += 1;

        if self.policy.touch_files && !dest.exists() {
            debug!(path = ?dest, "Creating placeholder file");
            tokio::fs::File::create(dest).await?;
        }

        let url = session.api_url(&target.request_path());
        let label = target.label();
        let mut last_error = None;

        for attempt in 1..=self.policy.max_retries {
            debug!(target = %label, attempt, url = %url, "Requesting");
            match self.attempt(session, &url, dest).await {
                Ok(outcome) => {
                    self.record(&outcome);
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() => {
                    warn!(target = %label, attempt, error = %e, "Download failed");
                    if attempt < self.policy.max_retries {
                        warn!(delay_secs = self.policy.retry_delay.as_secs(), "Retrying");
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let error = last_error
            .unwrap_or_else(|| ProtectError::Config("max_retries must be > 0".into()));

        if self.policy.ignore_failed_downloads {
            warn!(target = %label, error = %error, "Giving up on download, continuing with next file");
            self.stats.record_failure();
            return Ok(FetchOutcome::Failed(FailureKind::from_error(&error)));
        }

        info!("Enable ignore_failed_downloads to skip failed downloads and continue");
        Err(error)
    }

    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Downloaded { bytes, elapsed } => {
                self.stats.record_download(*bytes, *elapsed)
            }
            FetchOutcome::Skipped(_) => self.stats.record_skip(),
            FetchOutcome::Failed(_) => self.stats.record_failure(),
        }
    }

    async fn attempt(&self, session: &Session, url: &str, dest: &Path) -> Result<FetchOutcome> {
        let started = Instant::now();
        let response = session.get(url).await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ProtectError::DownloadFailed {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let min = self.policy.min_payload_bytes;
        if let Some(len) = response.content_length().filter(|len| *len < min) {
            warn!(bytes = len, "Response is an empty clip, skipping download");
            return Ok(FetchOutcome::Skipped(SkipReason::TooSmall { bytes: len }));
        }

        let part = partial_path(dest);
        let bytes = match write_body(response, &part).await {
            Ok(bytes) => bytes,
            Err(e) => {
                discard(&part).await;
                return Err(e);
            }
        };

        if bytes < min {
            discard(&part).await;
            warn!(bytes, "Response is an empty clip, skipping download");
            return Ok(FetchOutcome::Skipped(SkipReason::TooSmall { bytes }));
        }

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            discard(&part).await;
            return Err(e.into());
        }

        let elapsed = started.elapsed();
        info!(
            path = ?dest,
            secs = elapsed.as_secs(),
            size = %format_bytes(bytes),
            rate = %format!("{}ps", format_bytes(throughput(bytes, elapsed))),
            "Download successful"
        );
        Ok(FetchOutcome::Downloaded { bytes, elapsed })
    }
}

/// Sibling path the body is streamed into before the final rename.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_body(response: Response, part: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = ?path, error = %e, "Could not remove partial file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).single().expect("valid")
    }

    #[test]
    fn test_footage_request_path() {
        let target = DownloadTarget::FootageSegment {
            camera_id: "cam1".into(),
            start: ts(8, 0),
            end: ts(9, 0) - chrono::Duration::milliseconds(1),
        };
        assert_eq!(
            target.request_path(),
            "/video/export?camera=cam1&start=1709280000000&end=1709283599999"
        );
    }

    #[test]
    fn test_snapshot_and_heatmap_paths() {
        let snap = DownloadTarget::Snapshot { camera_id: "cam1".into(), timestamp: ts(8, 0) };
        assert_eq!(snap.request_path(), "/cameras/cam1/snapshot?ts=1709280000000");
        let heat = DownloadTarget::Heatmap { event_id: "ev".into(), heatmap_id: "hm42".into() };
        assert_eq!(heat.request_path(), "/heatmaps/hm42");
    }

    #[test]
    fn test_retry_delay_floor() {
        let cfg = DownloadConfig::default();
        assert_eq!(FetchPolicy::from(&cfg).retry_delay, Duration::from_secs(3));

        let slow = DownloadConfig { download_wait_secs: 10, ..DownloadConfig::default() };
        assert_eq!(FetchPolicy::from(&slow).retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/cam - 08.00.mp4")),
            PathBuf::from("/data/cam - 08.00.mp4.part")
        );
    }
}
