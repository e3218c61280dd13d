// Media engine collaborator contract
//
// The controller never decodes or renders anything itself. It drives an
// engine supplied by the host and learns what happened through a
// `StatusSink` bound to the session that created the engine.

use crate::error::Result;
use crate::status::RawStatus;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifies one `load` lineage. Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionToken(u64);

impl SessionToken {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Identifies one seek request within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeekSeq(u64);

impl SeekSeq {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SeekSeq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "seek#{}", self.0)
    }
}

/// Engine handle owned by exactly one session.
///
/// Every call is a request: returning `Ok` means the engine accepted it,
/// not that it has happened. Outcomes arrive later through the session's
/// `StatusSink`.
pub trait MediaEngine: Send {
    /// Start resolving and buffering `uri` without playing it
    fn load(&mut self, uri: &str) -> Result<()>;

    /// Start or resume playback
    fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Move to an absolute position; completion is reported for `seq`
    fn set_position(&mut self, position_millis: u64, seq: SeekSeq) -> Result<()>;

    /// Release everything the engine holds. Called once, on teardown or
    /// when a newer session replaces this one.
    fn release(&mut self) -> Result<()>;
}

/// Channel from an engine back to the session that created it.
/// Implementations should be lightweight and non-blocking.
pub trait StatusSink: Send + Sync {
    /// Session this sink reports for
    fn token(&self) -> SessionToken;

    /// Deliver a status update
    fn status(&self, raw: RawStatus);

    /// The seek identified by `seq` has landed
    fn seek_completed(&self, seq: SeekSeq);

    /// The seek identified by `seq` failed
    fn seek_failed(&self, seq: SeekSeq, message: String);
}

/// Creates one engine per session
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self, sink: Arc<dyn StatusSink>) -> Result<Box<dyn MediaEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_ordered() {
        let first = SessionToken::from_raw(1);
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.as_raw(), 2);
        assert_eq!(second.to_string(), "session#2");
        assert_eq!(SeekSeq::from_raw(7).next(), SeekSeq::from_raw(8));
    }
}
