// Playback controller: sessions, transport commands and retry

pub mod controller;
pub mod dispatcher;
pub mod retry;
pub mod session;
pub mod sources;

#[cfg(test)]
mod testing;

pub use controller::PlayerController;
pub use dispatcher::{EngineCall, TransportDispatcher};
pub use retry::RetryCoordinator;
pub use session::{EngineHandle, PendingSeek, PlaybackSession};
pub use sources::{SourceFormat, VideoSource};
