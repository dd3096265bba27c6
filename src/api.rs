// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Read-only Protect API calls used to decide what to download.
//!
//! Endpoints (relative to the strategy's API base path):
//!   GET /cameras                                   → camera list
//!   GET /events?type=motion&...&start=MS&end=MS     → motion / smart events

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::camera::{Camera, MotionEvent};
use crate::error::{ProtectError, Result};
use crate::session::Session;

/// Event types requested from `/events`.
const EVENT_QUERY: &str = "type=motion&type=smartDetectZone&type=smartDetectLine\
    &type=smartAudioDetect&type=ring&type=doorAccess\
    &smartDetectType=licensePlate&withoutDescriptions=true";

// ──────────────── wire types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct RawCamera {
    id: String,
    name: String,
    #[serde(default)]
    stats: Option<RawCameraStats>,
}

#[derive(Deserialize)]
struct RawCameraStats {
    #[serde(default)]
    video: Option<RawVideoStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideoStats {
    #[serde(default)]
    recording_start: Option<i64>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    start: i64,
    #[serde(default)]
    end: Option<i64>,
    camera: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    heatmap: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ──────────────── decoding ────────────────────────────────────────────────

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

impl From<RawCamera> for Camera {
    fn from(raw: RawCamera) -> Self {
        let recording_start = raw
            .stats
            .and_then(|s| s.video)
            .and_then(|v| v.recording_start)
            .filter(|ms| *ms > 0)
            .and_then(from_millis);
        Camera { id: raw.id, name: raw.name, recording_start }
    }
}

impl RawEvent {
    /// Ongoing events (no end yet) and events without a camera are dropped.
    fn into_event(self) -> Option<MotionEvent> {
        Some(MotionEvent {
            start: from_millis(self.start)?,
            end: from_millis(self.end?)?,
            camera_id: self.camera?,
            id: self.id,
            score: self.score,
            thumbnail_id: self.thumbnail,
            heatmap_id: self.heatmap,
        })
    }
}

/// Decode a camera list payload.
pub fn parse_cameras(body: &str) -> Result<Vec<Camera>> {
    let raw: Vec<RawCamera> = serde_json::from_str(body)?;
    Ok(raw.into_iter().map(Camera::from).collect())
}

/// Decode an event list payload, dropping events that are still in progress.
pub fn parse_motion_events(body: &str) -> Result<Vec<MotionEvent>> {
    let raw: Vec<RawEvent> = serde_json::from_str(body)?;
    Ok(raw.into_iter().filter_map(RawEvent::into_event).collect())
}

/// Best-effort diagnostic from an error response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(msg) }) => msg,
        _ if body.trim().is_empty() => "(no information available)".into(),
        _ => body.trim().to_string(),
    }
}

async fn ok_body(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status != StatusCode::OK {
        return Err(ProtectError::Api { status: status.as_u16(), message: error_message(&body) });
    }
    Ok(body)
}

// ──────────────── calls ───────────────────────────────────────────────────

/// All cameras known to the console.
pub async fn list_cameras(session: &Session) -> Result<Vec<Camera>> {
    let url = session.api_url("/cameras");
    let body = ok_body(session.get(&url).await?).await?;
    let cameras = parse_cameras(&body)?;

    info!(count = cameras.len(), "Retrieved camera list");
    for cam in &cameras {
        info!(camera = %cam.id, name = %cam.name, "Camera found");
    }
    Ok(cameras)
}

/// Finished events between `start` and `end`, logged per camera.
pub async fn list_motion_events(
    session: &Session,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cameras: &[Camera],
) -> Result<Vec<MotionEvent>> {
    let url = session.api_url(&format!(
        "/events?{EVENT_QUERY}&start={}&end={}",
        start.timestamp_millis(),
        end.timestamp_millis()
    ));
    let body = ok_body(session.get(&url).await?).await?;
    let events = parse_motion_events(&body)?;

    let mut per_camera: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &events {
        *per_camera.entry(event.camera_id.as_str()).or_default() += 1;
    }
    for (camera_id, count) in per_camera {
        match cameras.iter().find(|c| c.id == camera_id) {
            Some(cam) => info!(camera = camera_id, name = %cam.name, count, "Motion events found"),
            None => warn!(camera = camera_id, count, "Motion events found for unknown camera"),
        }
    }
    info!(total = events.len(), %start, %end, "Motion events found for all cameras");

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cameras_recording_start() {
        let body = r#"[
            {"id": "exteriorCameraId", "name": "Exterior",
             "stats": {"video": {"recordingStart": 1578525969586}}},
            {"id": "newCameraId", "name": "New", "stats": {"video": {"recordingStart": null}}}
        ]"#;
        let cams = parse_cameras(body).expect("parse");
        assert_eq!(cams.len(), 2);
        assert_eq!(
            cams[0].recording_start.map(|t| t.timestamp_millis()),
            Some(1_578_525_969_586)
        );
        assert_eq!(cams[1].recording_start, None);
    }

    #[test]
    fn test_parse_events_drops_ongoing() {
        let body = r#"[
            {"id": "e1", "start": 1700000000000, "end": 1700000030000, "camera": "c1",
             "score": 80, "thumbnail": "t1", "heatmap": "h1"},
            {"id": "e2", "start": 1700000100000, "end": null, "camera": "c1",
             "score": 10, "thumbnail": null, "heatmap": null}
        ]"#;
        let events = parse_motion_events(body).expect("parse");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e1");
        assert_eq!(events[0].heatmap_id.as_deref(), Some("h1"));
        assert_eq!(events[0].duration_secs(), 30);
    }

    #[test]
    fn test_error_message_variants() {
        assert_eq!(error_message(r#"{"error":"Camera offline"}"#), "Camera offline");
        assert_eq!(error_message(""), "(no information available)");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
