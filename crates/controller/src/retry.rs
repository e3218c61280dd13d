// Manual recovery from the Error state

use crate::session::PlaybackSession;
use atlas_core::PlaybackState;

/// Tracks load attempts per source and decides whether a retry may run.
///
/// Retries are only ever user initiated; nothing here schedules one.
#[derive(Debug, Default)]
pub struct RetryCoordinator {
    max_retries: Option<u32>,
    source_uri: Option<String>,
    attempts: u32,
}

impl RetryCoordinator {
    pub fn new(max_retries: Option<u32>) -> Self {
        Self {
            max_retries,
            source_uri: None,
            attempts: 0,
        }
    }

    /// Count a load of `uri`. Loading a different source starts over.
    pub fn record_load(&mut self, uri: &str) {
        if self.source_uri.as_deref() == Some(uri) {
            self.attempts = self.attempts.saturating_add(1);
        } else {
            self.source_uri = Some(uri.to_string());
            self.attempts = 1;
        }
    }

    /// Loads of the current source, the first one included
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retries_used(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Source to reload, if `session` is in Error and the cap allows it
    pub fn retry_target(&self, session: Option<&PlaybackSession>) -> Option<String> {
        let session = session?;
        if session.state() != PlaybackState::Error {
            log::debug!("Retry ignored while {:?}", session.state());
            return None;
        }
        if let Some(max) = self.max_retries {
            if self.retries_used() >= max {
                log::warn!(
                    "Retry refused for {}: {} of {} retries used",
                    session.source_uri(),
                    self.retries_used(),
                    max
                );
                return None;
            }
        }
        Some(session.source_uri().to_string())
    }
}
