// Read-only view of a session for the UI layer

use crate::engine::SessionToken;
use crate::progress::ProgressDisplay;
use crate::state::{PlaybackState, TransportIntent};
use crate::status::StatusSnapshot;
use serde::Serialize;

/// Icon the single transport button should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayButton {
    Play,
    Pause,
}

/// The `{state, snapshot}` pair the UI renders from, plus the bits of
/// session bookkeeping it may want to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub state: PlaybackState,
    pub snapshot: StatusSnapshot,
    pub pending_intent: Option<TransportIntent>,
    pub pending_seek_fraction: Option<f64>,
    pub token: Option<SessionToken>,
    pub source_uri: Option<String>,
    /// Loads of the current source so far; 1 for the first attempt
    pub attempt: u32,
}

impl PlayerView {
    /// View of a controller that has not loaded anything yet
    pub fn idle() -> Self {
        Self {
            state: PlaybackState::Idle,
            snapshot: StatusSnapshot::default(),
            pending_intent: None,
            pending_seek_fraction: None,
            token: None,
            source_uri: None,
            attempt: 0,
        }
    }

    pub fn shows_loading(&self) -> bool {
        self.state == PlaybackState::Loading
    }

    pub fn shows_error(&self) -> bool {
        self.state == PlaybackState::Error
    }

    /// Transport button is shown once the media is loaded and healthy
    pub fn shows_controls(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking { .. }
        )
    }

    pub fn shows_progress(&self) -> bool {
        self.shows_controls() && self.snapshot.is_loaded
    }

    /// The button reflects a pending request before the engine echoes it
    pub fn play_button(&self) -> PlayButton {
        let playing = match self.pending_intent {
            Some(TransportIntent::Play) => true,
            Some(TransportIntent::Pause) => false,
            None => self.snapshot.is_playing,
        };
        if playing {
            PlayButton::Pause
        } else {
            PlayButton::Play
        }
    }

    pub fn progress(&self) -> ProgressDisplay {
        ProgressDisplay::from_snapshot(&self.snapshot)
    }

    /// True when `other` differs from `self` only in playback position
    pub fn differs_only_in_position(&self, other: &PlayerView) -> bool {
        self.snapshot.position_millis != other.snapshot.position_millis && {
            let mut aligned = other.clone();
            aligned.snapshot.position_millis = self.snapshot.position_millis;
            &aligned == self
        }
    }
}

impl Default for PlayerView {
    fn default() -> Self {
        Self::idle()
    }
}
