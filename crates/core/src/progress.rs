// Progress and time display derived from a snapshot

use crate::status::StatusSnapshot;
use serde::Serialize;
use std::fmt;

/// Fraction of the media played, in [0, 1]. Zero while the duration is unknown.
pub fn fraction(snapshot: &StatusSnapshot) -> f64 {
    if snapshot.duration_millis == 0 {
        return 0.0;
    }
    (snapshot.position_millis as f64 / snapshot.duration_millis as f64).clamp(0.0, 1.0)
}

/// Format milliseconds as `M:SS`.
///
/// Minutes are not padded and there is no hours field, so 75 minutes and
/// 3 seconds renders as `75:03`. Zero, negative and non-finite input all
/// render as `0:00`.
pub fn format_time(millis: f64) -> String {
    if !millis.is_finite() || millis <= 0.0 {
        return "0:00".to_string();
    }
    let total_seconds = (millis / 1000.0).floor() as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Convert a tap at `offset` along a progress bar `extent` wide into a seek fraction
pub fn fraction_from_offset(offset: f64, extent: f64) -> f64 {
    if !offset.is_finite() || !extent.is_finite() || extent <= 0.0 {
        return 0.0;
    }
    (offset / extent).clamp(0.0, 1.0)
}

/// Everything a progress bar needs to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDisplay {
    pub fraction: f64,
    pub position: String,
    pub duration: String,
}

impl ProgressDisplay {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            fraction: fraction(snapshot),
            position: format_time(snapshot.position_millis as f64),
            duration: format_time(snapshot.duration_millis as f64),
        }
    }
}

impl fmt::Display for ProgressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} / {}", self.position, self.duration)
    }
}
