// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Protect client: owns the configuration, the authenticated session, the
//! fetcher and its counters for the lifetime of one run.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::api;
use crate::camera::{Camera, MotionEvent};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{DownloadTarget, FetchOutcome, FetchPolicy, Fetcher};
use crate::paths::PathBuilder;
use crate::session::Session;
use crate::stats::DownloadStats;

pub struct ProtectClient {
    config: Config,
    session: Session,
    fetcher: Fetcher,
    paths: PathBuilder,
}

impl ProtectClient {
    /// Create the client from a [`Config`]. No network activity happens here;
    /// the first request logs in.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let session = Session::new(&config.server, &config.download)?;
        let fetcher = Fetcher::new(FetchPolicy::from(&config.download));
        let paths = PathBuilder::new(
            config.download.destination_path.clone(),
            config.download.use_subfolders,
            config.download.use_utc_filenames,
        );

        info!(
            server = %session.authority(),
            strategy = ?session.strategy(),
            destination = ?config.download.destination_path,
            "Protect client ready"
        );

        Ok(Self { config, session, fetcher, paths })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn paths(&self) -> &PathBuilder {
        &self.paths
    }

    /// Counters accumulated so far; valid after an aborted run too.
    pub fn stats(&self) -> &DownloadStats {
        self.fetcher.stats()
    }

    pub async fn list_cameras(&self) -> Result<Vec<Camera>> {
        api::list_cameras(&self.session).await
    }

    pub async fn list_motion_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cameras: &[Camera],
    ) -> Result<Vec<MotionEvent>> {
        api::list_motion_events(&self.session, start, end, cameras).await
    }

    pub async fn fetch(&mut self, target: &DownloadTarget, dest: &Path) -> Result<FetchOutcome> {
        self.fetcher.fetch(&self.session, target, dest).await
    }
}

/// Keep the cameras named in a `--cameras` selection; `all` keeps everything.
pub fn select_cameras(cameras: Vec<Camera>, selection: &str) -> Vec<Camera> {
    let selection = selection.trim();
    if selection.is_empty() || selection.eq_ignore_ascii_case("all") {
        return cameras;
    }
    let wanted: Vec<&str> = selection.split(',').map(str::trim).collect();
    cameras.into_iter().filter(|c| wanted.contains(&c.id.as_str())).collect()
}
