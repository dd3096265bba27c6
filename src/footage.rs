// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Export: footage ranges, snapshots and motion events to local files.
//!
//! Footage ranges are cut by the planner into requests of at most one hour
//! and fetched strictly in order, one at a time.

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::camera::{id_suffix, Camera, MotionEvent};
use crate::client::ProtectClient;
use crate::error::Result;
use crate::fetcher::{DownloadTarget, FetchOutcome};
use crate::paths::{ensure_parent, ArtifactKind};
use crate::planner::{plan, Interval, PlanOptions};

/// Export recorded footage for `camera` in `[start, end)`.
///
/// Alignment to full hours happens in the time zone of `start`/`end`.
/// Returns the outcome of every planned interval, in order.
pub async fn download_footage<Tz: TimeZone>(
    client: &mut ProtectClient,
    camera: &Camera,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    options: PlanOptions,
) -> Result<Vec<FetchOutcome>> {
    info!(camera = %camera.id, name = %camera.name, "Downloading footage");

    let mut outcomes = Vec::new();
    for interval in plan(start, end, options) {
        outcomes.push(download_interval(client, camera, &interval).await?);
    }
    Ok(outcomes)
}

/// Fetch one planned interval as a single export request.
pub async fn download_interval<Tz: TimeZone>(
    client: &mut ProtectClient,
    camera: &Camera,
    interval: &Interval<Tz>,
) -> Result<FetchOutcome> {
    let start = interval.start.with_timezone(&Utc);
    let end = interval.end.with_timezone(&Utc);

    let dest = client.paths().file_path(camera, start, ArtifactKind::Video);
    ensure_parent(&dest)?;

    info!(camera = %camera.id, %start, %end, path = ?dest, "Downloading video");
    let target = DownloadTarget::FootageSegment { camera_id: camera.id.clone(), start, end };
    client.fetch(&target, &dest).await
}

/// Download a still image from `camera` at `at`.
pub async fn download_snapshot(
    client: &mut ProtectClient,
    camera: &Camera,
    at: DateTime<Utc>,
) -> Result<FetchOutcome> {
    let dest = client.paths().file_path(camera, at, ArtifactKind::Snapshot);
    ensure_parent(&dest)?;

    info!(camera = %camera.id, name = %camera.name, %at, path = ?dest, "Downloading snapshot");
    let target = DownloadTarget::Snapshot { camera_id: camera.id.clone(), timestamp: at };
    client.fetch(&target, &dest).await
}

/// Download the clip of a motion event and, when asked for and available,
/// its heatmap next to it.
pub async fn download_motion_event(
    client: &mut ProtectClient,
    event: &MotionEvent,
    camera: &Camera,
    with_heatmap: bool,
) -> Result<Vec<FetchOutcome>> {
    let dest = client.paths().file_path(camera, event.start, ArtifactKind::Video);
    ensure_parent(&dest)?;

    info!(
        event = id_suffix(&event.id),
        camera = %camera.id,
        name = %camera.name,
        start = %event.start,
        secs = event.duration_secs(),
        path = ?dest,
        "Downloading motion event"
    );
    let clip = DownloadTarget::MotionEvent {
        event_id: event.id.clone(),
        camera_id: camera.id.clone(),
        start: event.start,
        end: event.end,
    };
    let mut outcomes = vec![client.fetch(&clip, &dest).await?];

    if let Some(heatmap_id) = event.heatmap_id.as_ref().filter(|_| with_heatmap) {
        let heatmap_dest = client.paths().file_path(camera, event.start, ArtifactKind::Heatmap);
        info!(event = id_suffix(&event.id), path = ?heatmap_dest, "Downloading heatmap");
        let heatmap = DownloadTarget::Heatmap {
            event_id: event.id.clone(),
            heatmap_id: heatmap_id.clone(),
        };
        outcomes.push(client.fetch(&heatmap, &heatmap_dest).await?);
    }

    Ok(outcomes)
}
