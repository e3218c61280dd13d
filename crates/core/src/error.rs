// Error handling for the playback controller

use std::fmt;

/// Playback controller error types
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// The engine could not resolve or parse the source
    LoadError(String),

    /// The engine failed after the source was loaded
    PlaybackError(String),

    /// Invalid state transition
    InvalidState(String),

    /// Caller supplied an unusable argument
    InvalidArgument(String),

    /// An engine call failed synchronously
    EngineError(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerError::LoadError(msg) => write!(f, "Load error: {}", msg),
            PlayerError::PlaybackError(msg) => write!(f, "Playback error: {}", msg),
            PlayerError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            PlayerError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            PlayerError::EngineError(msg) => write!(f, "Engine error: {}", msg),
            PlayerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for PlayerError {}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, PlayerError>;

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::InvalidArgument(format!("malformed JSON: {}", err))
    }
}
