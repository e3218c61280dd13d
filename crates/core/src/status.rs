// Normalization of raw engine status events into typed snapshots

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Where in the session lifecycle an engine error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The source could not be resolved or parsed
    Load,
    /// The engine failed after the source was loaded
    Playback,
}

/// Error details carried by a snapshot in the Error state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn load(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Load,
            message: message.into(),
        }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Playback,
            message: message.into(),
        }
    }
}

/// Status exactly as the engine reported it.
///
/// Every field is optional: engines report partial updates, omit the
/// duration until metadata arrives, and may send numbers that are not
/// finite. Nothing here is trusted until it has been projected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatus {
    pub is_loaded: Option<bool>,
    pub is_playing: Option<bool>,
    pub position_millis: Option<f64>,
    pub duration_millis: Option<f64>,
    pub error: Option<String>,
}

impl RawStatus {
    /// Status for an engine that has failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Parse the engine's camelCase JSON status object.
    ///
    /// Parsing is lenient: fields of an unexpected type are dropped and a
    /// non-object payload yields an empty status, which projects to
    /// `StatusClass::Unrecognized`. Only invalid JSON text is an error.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let error = match object.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self {
            is_loaded: object.get("isLoaded").and_then(Value::as_bool),
            is_playing: object.get("isPlaying").and_then(Value::as_bool),
            position_millis: object.get("positionMillis").and_then(Value::as_f64),
            duration_millis: object.get("durationMillis").and_then(Value::as_f64),
            error,
        }
    }

    fn is_empty(&self) -> bool {
        self.is_loaded.is_none()
            && self.is_playing.is_none()
            && self.position_millis.is_none()
            && self.duration_millis.is_none()
            && self.error.is_none()
    }
}

/// Normalized engine status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_millis: u64,
    /// Zero until the engine has reported metadata
    pub duration_millis: u64,
    pub error_info: Option<ErrorInfo>,
}

/// Classification of a projected event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Loaded with a known duration
    Progress,
    /// Loaded, duration not reported yet
    MetadataPending,
    /// Engine explicitly reports that nothing is loaded
    NotLoaded,
    /// Error indicator present; wins over every other field
    Error,
    /// None of the known fields were present
    Unrecognized,
}

/// Result of projecting one raw event
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub class: StatusClass,
    pub snapshot: StatusSnapshot,
}

/// Project a raw event with no prior status to inherit from
pub fn project(raw: &RawStatus) -> Projection {
    project_onto(raw, &StatusSnapshot::default())
}

/// Project a raw event, filling omitted fields from `previous`
pub fn project_onto(raw: &RawStatus, previous: &StatusSnapshot) -> Projection {
    if let Some(message) = &raw.error {
        let info = if previous.is_loaded {
            ErrorInfo::playback(message.clone())
        } else {
            ErrorInfo::load(message.clone())
        };
        return Projection {
            class: StatusClass::Error,
            snapshot: StatusSnapshot {
                is_loaded: raw.is_loaded.unwrap_or(false),
                is_playing: false,
                position_millis: previous.position_millis,
                duration_millis: previous.duration_millis,
                error_info: Some(info),
            },
        };
    }

    if raw.is_empty() {
        return Projection {
            class: StatusClass::Unrecognized,
            snapshot: previous.clone(),
        };
    }

    let is_loaded = raw.is_loaded.unwrap_or(previous.is_loaded);
    if !is_loaded {
        return Projection {
            class: StatusClass::NotLoaded,
            snapshot: StatusSnapshot::default(),
        };
    }

    let duration_millis = raw
        .duration_millis
        .and_then(to_millis)
        .unwrap_or(previous.duration_millis);
    let mut position_millis = raw
        .position_millis
        .and_then(to_millis)
        .unwrap_or(previous.position_millis);
    // Live streams report no duration; only clamp once one is known
    if duration_millis > 0 {
        position_millis = position_millis.min(duration_millis);
    }

    let class = if duration_millis == 0 {
        StatusClass::MetadataPending
    } else {
        StatusClass::Progress
    };

    Projection {
        class,
        snapshot: StatusSnapshot {
            is_loaded: true,
            is_playing: raw.is_playing.unwrap_or(previous.is_playing),
            position_millis,
            duration_millis,
            error_info: None,
        },
    }
}

fn to_millis(value: f64) -> Option<u64> {
    if !value.is_finite() {
        return None;
    }
    if value <= 0.0 {
        return Some(0);
    }
    Some(value.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(position: f64, duration: f64, playing: bool) -> RawStatus {
        RawStatus {
            is_loaded: Some(true),
            is_playing: Some(playing),
            position_millis: Some(position),
            duration_millis: Some(duration),
            error: None,
        }
    }

    #[test]
    fn test_progress_event() {
        let projection = project(&loaded(1500.0, 120_000.0, true));
        assert_eq!(projection.class, StatusClass::Progress);
        assert_eq!(projection.snapshot.position_millis, 1500);
        assert_eq!(projection.snapshot.duration_millis, 120_000);
        assert!(projection.snapshot.is_playing);
    }

    #[test]
    fn test_missing_duration_is_metadata_pending() {
        let raw = RawStatus {
            is_loaded: Some(true),
            is_playing: Some(false),
            ..RawStatus::default()
        };
        let projection = project(&raw);
        assert_eq!(projection.class, StatusClass::MetadataPending);
        assert_eq!(projection.snapshot.duration_millis, 0);
        assert!(projection.snapshot.error_info.is_none());
    }

    #[test]
    fn test_error_wins_over_other_fields() {
        let mut raw = loaded(1000.0, 5000.0, true);
        raw.error = Some("decoder crashed".to_string());

        let previous = project(&loaded(900.0, 5000.0, true)).snapshot;
        let projection = project_onto(&raw, &previous);
        assert_eq!(projection.class, StatusClass::Error);
        assert!(!projection.snapshot.is_playing);
        assert_eq!(
            projection.snapshot.error_info,
            Some(ErrorInfo::playback("decoder crashed"))
        );
    }

    #[test]
    fn test_error_before_load_is_load_error() {
        let projection = project(&RawStatus::failed("network"));
        assert_eq!(projection.class, StatusClass::Error);
        assert_eq!(projection.snapshot.error_info, Some(ErrorInfo::load("network")));
    }

    #[test]
    fn test_partial_event_inherits_previous() {
        let previous = project(&loaded(0.0, 120_000.0, false)).snapshot;
        let raw = RawStatus {
            is_playing: Some(true),
            ..RawStatus::default()
        };
        let projection = project_onto(&raw, &previous);
        assert_eq!(projection.class, StatusClass::Progress);
        assert!(projection.snapshot.is_loaded);
        assert!(projection.snapshot.is_playing);
        assert_eq!(projection.snapshot.duration_millis, 120_000);
    }

    #[test]
    fn test_engine_values_are_clamped() {
        let projection = project(&loaded(-40.0, 10_000.0, true));
        assert_eq!(projection.snapshot.position_millis, 0);

        let projection = project(&loaded(12_500.0, 10_000.0, true));
        assert_eq!(projection.snapshot.position_millis, 10_000);

        let projection = project(&loaded(f64::NAN, f64::INFINITY, false));
        assert_eq!(projection.snapshot.position_millis, 0);
        assert_eq!(projection.snapshot.duration_millis, 0);
        assert_eq!(projection.class, StatusClass::MetadataPending);
    }

    #[test]
    fn test_live_stream_position_not_clamped_without_duration() {
        let raw = RawStatus {
            is_loaded: Some(true),
            position_millis: Some(42_000.0),
            ..RawStatus::default()
        };
        let projection = project(&raw);
        assert_eq!(projection.snapshot.position_millis, 42_000);
    }

    #[test]
    fn test_empty_event_is_unrecognized() {
        let previous = project(&loaded(10.0, 20.0, false)).snapshot;
        let projection = project_onto(&RawStatus::default(), &previous);
        assert_eq!(projection.class, StatusClass::Unrecognized);
        assert_eq!(projection.snapshot, previous);
    }

    #[test]
    fn test_not_loaded_event() {
        let raw = RawStatus {
            is_loaded: Some(false),
            ..RawStatus::default()
        };
        assert_eq!(project(&raw).class, StatusClass::NotLoaded);
    }

    #[test]
    fn test_parse_json_status() {
        let raw = RawStatus::from_json(
            r#"{"isLoaded":true,"isPlaying":false,"positionMillis":0,"durationMillis":120000}"#,
        )
        .unwrap();
        assert_eq!(raw, loaded(0.0, 120_000.0, false));
    }

    #[test]
    fn test_parse_json_is_lenient() {
        let raw = RawStatus::from_json(r#"{"isLoaded":"yes","durationMillis":null}"#).unwrap();
        assert_eq!(raw, RawStatus::default());

        let raw = RawStatus::from_json(r#"{"error":{"code":-1100}}"#).unwrap();
        assert_eq!(raw.error.as_deref(), Some(r#"{"code":-1100}"#));

        let raw = RawStatus::from_json(r#"{"error":false,"isLoaded":false}"#).unwrap();
        assert!(raw.error.is_none());

        let raw = RawStatus::from_json("[1, 2, 3]").unwrap();
        assert_eq!(project(&raw).class, StatusClass::Unrecognized);

        assert!(RawStatus::from_json("not json").is_err());
    }
}
