// Playback session state machine

use crate::error::{PlayerError, Result};
use crate::status::{ErrorInfo, Projection, StatusClass, StatusSnapshot};
use serde::{Serialize, Serializer};

/// State a seek returns to once the engine confirms it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResumeTarget {
    Ready,
    Playing,
    Paused,
}

impl ResumeTarget {
    pub fn state(self) -> PlaybackState {
        match self {
            ResumeTarget::Ready => PlaybackState::Ready,
            ResumeTarget::Playing => PlaybackState::Playing,
            ResumeTarget::Paused => PlaybackState::Paused,
        }
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing has been loaded yet
    Idle,
    /// Source handed to the engine, waiting for it to report loaded
    Loading,
    /// Loaded and ready to play
    Ready,
    /// Engine confirmed it is playing
    Playing,
    /// Engine confirmed it is paused
    Paused,
    /// A seek is in flight
    Seeking { resume: ResumeTarget },
    /// Engine reported an error; only a new load leaves this state
    Error,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Seeking { .. } => "seeking",
            PlaybackState::Error => "error",
        }
    }

    /// Stable integer code used across the C ABI
    pub fn code(&self) -> i32 {
        match self {
            PlaybackState::Idle => 0,
            PlaybackState::Loading => 1,
            PlaybackState::Ready => 2,
            PlaybackState::Playing => 3,
            PlaybackState::Paused => 4,
            PlaybackState::Seeking { .. } => 5,
            PlaybackState::Error => 6,
        }
    }

    fn resume_target(&self) -> Option<ResumeTarget> {
        match self {
            PlaybackState::Ready => Some(ResumeTarget::Ready),
            PlaybackState::Playing => Some(ResumeTarget::Playing),
            PlaybackState::Paused => Some(ResumeTarget::Paused),
            PlaybackState::Seeking { resume } => Some(*resume),
            _ => None,
        }
    }
}

impl Serialize for PlaybackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Transport command the engine has been asked for but not yet echoed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportIntent {
    Play,
    Pause,
}

/// Check an edge against the transition table
pub fn validate_transition(from: PlaybackState, to: PlaybackState) -> Result<()> {
    use PlaybackState::*;

    match (from, to) {
        // Load is accepted from anywhere, including a retry out of Error
        (_, Loading) => Ok(()),

        // From Loading
        (Loading, Ready) => Ok(()),
        (Loading, Playing) => Ok(()),

        // Play / pause, confirmed by the engine
        (Ready, Playing) => Ok(()),
        (Paused, Playing) => Ok(()),
        (Playing, Paused) => Ok(()),

        // Seeking, including a seek superseding another
        (Ready | Playing | Paused | Seeking { .. }, Seeking { .. }) => Ok(()),
        (Seeking { .. }, Ready | Playing | Paused) => Ok(()),

        // Errors can surface from any loaded lineage
        (Idle, Error) => Err(PlayerError::InvalidState(
            "Error reported before any load".to_string(),
        )),
        (_, Error) => Ok(()),

        // Invalid transitions
        _ => Err(PlayerError::InvalidState(format!(
            "Invalid state transition from {:?} to {:?}",
            from, to
        ))),
    }
}

/// Authoritative state of one playback session.
///
/// The machine is a plain value; callers own the single-writer discipline
/// (the controller keeps it behind one mutex).
#[derive(Debug, Clone)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    snapshot: StatusSnapshot,
    pending_intent: Option<TransportIntent>,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            snapshot: StatusSnapshot::default(),
            pending_intent: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn pending_intent(&self) -> Option<TransportIntent> {
        self.pending_intent
    }

    fn set_state(&mut self, new_state: PlaybackState) -> Result<()> {
        validate_transition(self.state, new_state)?;
        if self.state != new_state {
            log::debug!("Playback state changed: {:?} -> {:?}", self.state, new_state);
        }
        self.state = new_state;
        Ok(())
    }

    /// Enter Loading for a fresh session, dropping everything the previous
    /// session knew.
    pub fn begin_loading(&mut self) -> Result<()> {
        self.set_state(PlaybackState::Loading)?;
        self.snapshot = StatusSnapshot::default();
        self.pending_intent = None;
        Ok(())
    }

    /// Record a play/pause request.
    ///
    /// Returns true when the engine should be asked to act. Requests that are
    /// meaningless in the current state, or that repeat an intent the engine
    /// has not echoed yet, return false.
    pub fn request(&mut self, intent: TransportIntent) -> bool {
        let playing_or_heading_there = match self.pending_intent {
            Some(TransportIntent::Play) => true,
            Some(TransportIntent::Pause) => false,
            None => self.snapshot.is_playing,
        };

        let accepted = match (self.state, intent) {
            (PlaybackState::Ready | PlaybackState::Paused, TransportIntent::Play) => {
                self.pending_intent != Some(TransportIntent::Play)
            }
            (PlaybackState::Playing, TransportIntent::Play) => {
                self.pending_intent == Some(TransportIntent::Pause)
            }
            (PlaybackState::Playing, TransportIntent::Pause) => {
                self.pending_intent != Some(TransportIntent::Pause)
            }
            (PlaybackState::Ready | PlaybackState::Paused, TransportIntent::Pause) => {
                self.pending_intent == Some(TransportIntent::Play)
            }
            (PlaybackState::Seeking { .. }, TransportIntent::Play) => !playing_or_heading_there,
            (PlaybackState::Seeking { .. }, TransportIntent::Pause) => playing_or_heading_there,
            (PlaybackState::Idle | PlaybackState::Loading | PlaybackState::Error, _) => false,
        };

        if accepted {
            self.pending_intent = Some(intent);
        } else {
            log::debug!("Ignoring {:?} while {:?}", intent, self.state);
        }
        accepted
    }

    /// Enter Seeking and pin the reported position to the seek target
    pub fn begin_seek(&mut self, target_millis: u64) -> Result<()> {
        let resume = self.state.resume_target().ok_or_else(|| {
            PlayerError::InvalidState(format!("Cannot seek while {:?}", self.state))
        })?;
        self.set_state(PlaybackState::Seeking { resume })?;
        self.snapshot.position_millis = target_millis;
        Ok(())
    }

    /// Leave Seeking at `position_millis`.
    ///
    /// Returns to Playing when the engine reports it is playing, otherwise to
    /// the pre-seek Ready/Paused state.
    pub fn finish_seek(&mut self, position_millis: u64) -> Result<()> {
        let PlaybackState::Seeking { resume } = self.state else {
            return Err(PlayerError::InvalidState(format!(
                "No seek in progress while {:?}",
                self.state
            )));
        };

        let next = if self.snapshot.is_playing {
            PlaybackState::Playing
        } else {
            match resume {
                ResumeTarget::Playing => PlaybackState::Paused,
                other => other.state(),
            }
        };
        self.set_state(next)?;

        self.snapshot.position_millis = if self.snapshot.duration_millis > 0 {
            position_millis.min(self.snapshot.duration_millis)
        } else {
            position_millis
        };
        self.clear_echoed_intent();
        Ok(())
    }

    /// Enter Error with the given details
    pub fn fail(&mut self, info: ErrorInfo) -> Result<()> {
        self.set_state(PlaybackState::Error)?;
        self.snapshot.is_playing = false;
        self.snapshot.error_info = Some(info);
        self.pending_intent = None;
        Ok(())
    }

    /// Apply a projected engine event.
    ///
    /// Returns the position the engine reported when the event was accepted,
    /// `None` when it was ignored. While seeking the snapshot keeps the seek
    /// target as its position; the caller decides whether the reported
    /// position confirms the seek.
    pub fn apply(&mut self, projection: Projection) -> Option<u64> {
        let reported = projection.snapshot.position_millis;

        match projection.class {
            StatusClass::Unrecognized => {
                log::debug!("Ignoring unrecognized engine status");
                None
            }
            StatusClass::Error => {
                let info = projection.snapshot.error_info.clone()?;
                match self.fail(info) {
                    Ok(()) => {
                        self.snapshot = projection.snapshot;
                        Some(reported)
                    }
                    Err(e) => {
                        log::warn!("Dropping engine error: {}", e);
                        None
                    }
                }
            }
            StatusClass::NotLoaded => {
                if self.state == PlaybackState::Loading {
                    self.snapshot = projection.snapshot;
                    Some(reported)
                } else {
                    log::debug!("Ignoring not-loaded status while {:?}", self.state);
                    None
                }
            }
            StatusClass::Progress | StatusClass::MetadataPending => {
                self.apply_loaded(projection.snapshot)
            }
        }
    }

    fn apply_loaded(&mut self, snapshot: StatusSnapshot) -> Option<u64> {
        let reported = snapshot.position_millis;
        let playing = snapshot.is_playing;

        let next = match self.state {
            PlaybackState::Idle | PlaybackState::Error => {
                log::debug!("Ignoring loaded status while {:?}", self.state);
                return None;
            }
            PlaybackState::Loading | PlaybackState::Ready | PlaybackState::Paused => {
                if playing {
                    PlaybackState::Playing
                } else if self.state == PlaybackState::Loading {
                    PlaybackState::Ready
                } else {
                    self.state
                }
            }
            PlaybackState::Playing => {
                if playing {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                }
            }
            PlaybackState::Seeking { .. } => {
                let pinned = self.snapshot.position_millis;
                self.snapshot = snapshot;
                self.snapshot.position_millis = pinned;
                self.clear_echoed_intent();
                return Some(reported);
            }
        };

        if let Err(e) = self.set_state(next) {
            log::warn!("Dropping engine status: {}", e);
            return None;
        }
        self.snapshot = snapshot;
        self.clear_echoed_intent();
        Some(reported)
    }

    fn clear_echoed_intent(&mut self) {
        let echoed = match self.pending_intent {
            Some(TransportIntent::Play) => self.snapshot.is_playing,
            Some(TransportIntent::Pause) => !self.snapshot.is_playing,
            None => false,
        };
        if echoed {
            self.pending_intent = None;
        }
    }
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
