// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Destination file names.
//!
//! Names must be a pure function of camera + timestamp: skip-existing and
//! sync rely on a later run landing on the same path.
//!
//!   flat:        <dest>/<camera> - 2024-03-01 - 08.30.00+0000.mp4
//!   subfolders:  <dest>/2024/03/01/<camera>/<camera> - 2024-03-01 - 08.30.00+0000.mp4

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Utc};
use tracing::info;

use crate::camera::Camera;
use crate::error::Result;

/// File type of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Snapshot,
    Heatmap,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Video => "mp4",
            ArtifactKind::Snapshot => "jpg",
            ArtifactKind::Heatmap => "pgm",
        }
    }
}

/// Builds destination paths for one run.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    destination: PathBuf,
    use_subfolders: bool,
    use_utc: bool,
}

impl PathBuilder {
    pub fn new(destination: impl Into<PathBuf>, use_subfolders: bool, use_utc: bool) -> Self {
        Self { destination: destination.into(), use_subfolders, use_utc }
    }

    /// Timestamp in the zone used for names.
    fn localize(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        if self.use_utc {
            ts.fixed_offset()
        } else {
            ts.with_timezone(&Local).fixed_offset()
        }
    }

    pub fn directory(&self, camera: &Camera, ts: DateTime<Utc>) -> PathBuf {
        if !self.use_subfolders {
            return self.destination.clone();
        }
        let local = self.localize(ts);
        self.destination
            .join(local.format("%Y").to_string())
            .join(local.format("%m").to_string())
            .join(local.format("%d").to_string())
            .join(camera.fs_safe_name())
    }

    pub fn file_name(&self, camera: &Camera, ts: DateTime<Utc>, kind: ArtifactKind) -> String {
        let stamp = self.localize(ts).format("%Y-%m-%d - %H.%M.%S%z");
        format!("{} - {}.{}", camera.fs_safe_name(), stamp, kind.extension())
    }

    pub fn file_path(&self, camera: &Camera, ts: DateTime<Utc>, kind: ArtifactKind) -> PathBuf {
        self.directory(camera, ts).join(self.file_name(camera, ts, kind))
    }
}

/// Create the parent directory of `file` when missing.
pub fn ensure_parent(file: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            std::fs::create_dir_all(parent)?;
            info!(path = ?parent, "Created path");
        }
    }
    Ok(())
}
