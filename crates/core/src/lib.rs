// Core types and traits for the Atlas playback controller

pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod state;
pub mod status;
pub mod view;

// Re-export commonly used types
pub use callback::{CallbackEvent, CallbackManager, PlayerCallback};
pub use config::PlayerConfig;
pub use engine::{EngineFactory, MediaEngine, SeekSeq, SessionToken, StatusSink};
pub use error::{PlayerError, Result};
pub use progress::{format_time, fraction, fraction_from_offset, ProgressDisplay};
pub use state::{PlaybackState, PlaybackStateMachine, ResumeTarget, TransportIntent};
pub use status::{ErrorInfo, ErrorKind, Projection, RawStatus, StatusClass, StatusSnapshot};
pub use view::{PlayButton, PlayerView};
