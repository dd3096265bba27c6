// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Incremental sync: download everything recorded since the last run.
//!
//! Progress is kept in a JSON state file inside the destination directory:
//!
//! ```json
//! {"cameras": {"<camera id>": {"last": "2024-03-01T08:59:59.999Z", "name": "Front"}}}
//! ```
//!
//! The file is rewritten after every camera, whether its sync succeeded or
//! not, so an interrupted run resumes where it stopped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};

use crate::camera::Camera;
use crate::client::ProtectClient;
use crate::error::{ProtectError, Result};
use crate::fetcher::FetchOutcome;
use crate::footage::download_interval;
use crate::planner::{floor_to_hour, plan, tick, PlanOptions};

/// Per-camera progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    /// Inclusive end of the last interval handled.
    #[serde(
        default,
        deserialize_with = "deserialize_last",
        skip_serializing_if = "Option::is_none"
    )]
    pub last: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub cameras: BTreeMap<String, CameraState>,
}

impl SyncState {
    /// First instant that still needs downloading for `camera_id`.
    pub fn resume_point(&self, camera_id: &str) -> Option<DateTime<Utc>> {
        self.cameras
            .get(camera_id)
            .and_then(|c| c.last)
            .map(|last| last + tick())
    }

    pub fn mark(&mut self, camera: &Camera, last: DateTime<Utc>) {
        self.cameras.insert(
            camera.id.clone(),
            CameraState { last: Some(last), name: camera.name.clone() },
        );
    }
}

/// Accepts RFC 3339 as well as naive ISO 8601 written in local time.
fn deserialize_last<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw).map(Some).map_err(serde::de::Error::custom)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| format!("timestamp '{raw}' does not exist in local time"))
}

/// The state file on disk.
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(destination: &Path, name: &str) -> Self {
        Self { path: destination.join(name) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty state.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.is_file() {
            return Ok(SyncState::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ProtectError::StateFile(format!("read {:?}: {e}", self.path)))?;
        serde_json::from_str(&content)
            .map_err(|e| ProtectError::StateFile(format!("parse {:?}: {e}", self.path)))
    }

    pub fn save(&self, state: &SyncState) -> Result<()> {
        let content = serde_json::to_string(state)?;
        std::fs::write(&self.path, content)
            .map_err(|e| ProtectError::StateFile(format!("write {:?}: {e}", self.path)))
    }
}

/// Sync every camera up to the current full hour.
pub async fn run(client: &mut ProtectClient, cameras: &[Camera], ignore_state: bool) -> Result<()> {
    run_until(client, cameras, ignore_state, Utc::now()).await
}

/// Sync every camera up to the full hour before `now`.
///
/// Errors of one camera are logged and the next camera is processed, except
/// authentication failures which end the run after the state is saved.
pub async fn run_until(
    client: &mut ProtectClient,
    cameras: &[Camera],
    ignore_state: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let store = StateFile::new(
        &client.config().download.destination_path,
        &client.config().sync.statefile,
    );
    let mut state = if ignore_state { SyncState::default() } else { store.load()? };

    info!(
        server = %client.session().authority(),
        cameras = cameras.len(),
        statefile = ?store.path(),
        "Synchronizing video files"
    );

    for camera in cameras {
        let result = sync_camera(client, camera, &mut state, now).await;
        store.save(&state)?;

        match result {
            Ok(()) => {}
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                error!(camera = %camera.id, name = %camera.name, error = %e,
                    "Failed to sync camera, continuing with next device");
            }
        }
    }
    Ok(())
}

async fn sync_camera(
    client: &mut ProtectClient,
    camera: &Camera,
    state: &mut SyncState,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(from) = state.resume_point(&camera.id).or(camera.recording_start) else {
        warn!(camera = %camera.id, name = %camera.name, "Camera has no recordings, skipping");
        return Ok(());
    };

    let start = floor_to_hour(&from.with_timezone(&Local));
    let end = floor_to_hour(&now.with_timezone(&Local));
    info!(camera = %camera.id, name = %camera.name, %start, %end, "Syncing camera");

    for interval in plan(start, end, PlanOptions::default()) {
        let outcome = download_interval(client, camera, &interval).await?;
        if !matches!(outcome, FetchOutcome::Failed(_)) {
            state.mark(camera, interval.end.with_timezone(&Utc));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = StateFile::new(dir.path(), "sync.state");
        assert_eq!(store.load().expect("load missing"), SyncState::default());

        let cam = Camera { id: "cam1".into(), name: "Front".into(), recording_start: None };
        let mut state = SyncState::default();
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 8, 59, 59).single().expect("valid");
        state.mark(&cam, last);
        store.save(&state).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, state);
        assert_eq!(loaded.resume_point("cam1"), Some(last + tick()));
    }

    #[test]
    fn test_reads_legacy_entries() {
        let json = r#"{"cameras": {
            "a": {"last": "2024-03-01T08:59:59.999000+00:00", "name": "A"},
            "b": {"last": "2024-03-01T08:59:59", "name": "B"},
            "c": {}
        }}"#;
        let state: SyncState = serde_json::from_str(json).expect("parse");
        assert_eq!(
            state.cameras["a"].last,
            Some(
                Utc.with_ymd_and_hms(2024, 3, 1, 8, 59, 59).single().expect("valid")
                    + chrono::Duration::milliseconds(999)
            )
        );
        assert!(state.cameras["b"].last.is_some());
        assert_eq!(state.resume_point("c"), None);
        assert_eq!(state.resume_point("missing"), None);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("sync.state"), "{not json").expect("write");
        let store = StateFile::new(dir.path(), "sync.state");
        assert!(matches!(store.load(), Err(ProtectError::StateFile(_))));
    }
}
