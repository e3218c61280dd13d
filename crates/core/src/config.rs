// Controller configuration

use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;

/// Default time a seek may stay unconfirmed before it is abandoned
pub const DEFAULT_SEEK_TIMEOUT_MS: u64 = 5_000;

/// Default distance between a reported position and the seek target that
/// still counts as the engine having arrived
pub const DEFAULT_SEEK_TOLERANCE_MS: u64 = 500;

/// Default minimum interval between position-only observer updates
pub const DEFAULT_PROGRESS_THROTTLE_MS: u64 = 250;

/// Playback controller settings
///
/// Hosts usually pass these as JSON; any omitted field keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub seek_timeout_millis: u64,
    pub seek_tolerance_millis: u64,
    pub progress_throttle_millis: u64,
    /// Manual retries allowed per source; `None` means unlimited
    pub max_retry_attempts: Option<u32>,
}

impl PlayerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_millis)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            seek_timeout_millis: DEFAULT_SEEK_TIMEOUT_MS,
            seek_tolerance_millis: DEFAULT_SEEK_TOLERANCE_MS,
            progress_throttle_millis: DEFAULT_PROGRESS_THROTTLE_MS,
            max_retry_attempts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlayerConfig::from_json(r#"{"maxRetryAttempts": 3}"#).unwrap();
        assert_eq!(config.max_retry_attempts, Some(3));
        assert_eq!(config.seek_timeout_millis, DEFAULT_SEEK_TIMEOUT_MS);
        assert_eq!(config.seek_tolerance_millis, DEFAULT_SEEK_TOLERANCE_MS);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(PlayerConfig::from_json("{}").unwrap(), PlayerConfig::default());
        assert!(PlayerConfig::from_json(r#"{"seekTimeoutMillis": "soon"}"#).is_err());
    }
}
