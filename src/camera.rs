// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Camera and motion event records as reported by the Protect API.

use chrono::{DateTime, Utc};

/// A camera adopted by the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera {
    pub id: String,
    pub name: String,
    /// First available recording; `None` when the camera never recorded.
    pub recording_start: Option<DateTime<Utc>>,
}

impl Camera {
    /// Name usable in file and directory names.
    ///
    /// Keeps letters, digits and spaces, then appends the last four
    /// characters of the id so two cameras with the same label stay apart:
    /// `"Front Door!"` / `…a1b2` → `"Front Door (a1b2)"`.
    pub fn fs_safe_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ')
            .collect();
        format!("{} ({})", cleaned.trim_end(), id_suffix(&self.id))
    }
}

/// Last four characters of an id, used in names and log lines.
pub fn id_suffix(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(i, _)| i);
    &id[start..]
}

/// A finished motion (or smart detection) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionEvent {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub camera_id: String,
    pub score: i64,
    pub thumbnail_id: Option<String>,
    pub heatmap_id: Option<String>,
}

impl MotionEvent {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str, name: &str) -> Camera {
        Camera { id: id.into(), name: name.into(), recording_start: None }
    }

    #[test]
    fn test_fs_safe_name_strips_symbols() {
        let cam = camera("5f1a2b3c4d5e6f7a8b9cabcd", "Front/Door: #1 ");
        assert_eq!(cam.fs_safe_name(), "FrontDoor 1 (abcd)");
    }

    #[test]
    fn test_fs_safe_name_short_id() {
        let cam = camera("ab", "Garage");
        assert_eq!(cam.fs_safe_name(), "Garage (ab)");
    }

    #[test]
    fn test_id_suffix() {
        assert_eq!(id_suffix("exteriorCameraId"), "raId");
        assert_eq!(id_suffix(""), "");
    }
}
