// Transport commands: decide what the engine should be asked to do

use crate::session::{EngineHandle, PlaybackSession};
use atlas_core::{
    MediaEngine, PlaybackState, Result, SeekSeq, SessionToken, TransportIntent,
};
use std::time::Instant;

/// A call to make on the session's engine once the session lock is released
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    SetPosition { position_millis: u64, seq: SeekSeq },
}

impl EngineCall {
    pub fn run(&self, engine: &mut dyn MediaEngine) -> Result<()> {
        match self {
            EngineCall::Load(uri) => engine.load(uri),
            EngineCall::Play => engine.play(),
            EngineCall::Pause => engine.pause(),
            EngineCall::SetPosition {
                position_millis,
                seq,
            } => engine.set_position(*position_millis, *seq),
        }
    }
}

/// Translates user commands into state changes plus engine calls.
///
/// Owns the token and seek counters so both stay monotonic across sessions.
#[derive(Debug)]
pub struct TransportDispatcher {
    last_token: SessionToken,
    last_seek: SeekSeq,
}

impl TransportDispatcher {
    pub fn new() -> Self {
        Self {
            last_token: SessionToken::from_raw(0),
            last_seek: SeekSeq::from_raw(0),
        }
    }

    /// Replace whatever session is in `slot` with a fresh one for `uri`.
    ///
    /// Returns the new token and the previous session's engine, which the
    /// caller must release.
    pub fn load(
        &mut self,
        slot: &mut Option<PlaybackSession>,
        uri: &str,
    ) -> Result<(SessionToken, Option<EngineHandle>)> {
        let token = self.last_token.next();
        let session = PlaybackSession::start(uri, token)?;
        self.last_token = token;

        let previous = slot.replace(session);
        let old_engine = previous.and_then(|mut old| {
            log::debug!("{} replaced by {}", old.token(), token);
            old.take_engine()
        });
        Ok((token, old_engine))
    }

    pub fn play(&self, session: &mut PlaybackSession) -> Option<EngineCall> {
        session
            .request(TransportIntent::Play)
            .then_some(EngineCall::Play)
    }

    pub fn pause(&self, session: &mut PlaybackSession) -> Option<EngineCall> {
        session
            .request(TransportIntent::Pause)
            .then_some(EngineCall::Pause)
    }

    /// Pause when playing (or about to), play otherwise
    pub fn toggle(&self, session: &mut PlaybackSession) -> Option<EngineCall> {
        let playing = match session.pending_intent() {
            Some(intent) => intent == TransportIntent::Play,
            None => session.snapshot().is_playing,
        };
        if playing {
            self.pause(session)
        } else {
            self.play(session)
        }
    }

    /// Seek to `fraction` of the duration.
    ///
    /// Out-of-range fractions are clamped. Seeks before the duration is
    /// known are dropped: there is nothing to scale the fraction by.
    pub fn seek_to(
        &mut self,
        session: &mut PlaybackSession,
        fraction: f64,
        now: Instant,
    ) -> Option<EngineCall> {
        if !fraction.is_finite() {
            log::debug!("Seek rejected: fraction {} is not finite", fraction);
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let snapshot = session.snapshot();
        if !snapshot.is_loaded || snapshot.duration_millis == 0 {
            log::debug!("Seek rejected: duration not known yet");
            return None;
        }
        if !matches!(
            session.state(),
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking { .. }
        ) {
            log::debug!("Seek rejected while {:?}", session.state());
            return None;
        }

        let position_millis = (fraction * snapshot.duration_millis as f64).round() as u64;
        let seq = self.last_seek.next();
        if let Err(e) = session.begin_seek(fraction, position_millis, seq, now) {
            log::debug!("Seek rejected: {}", e);
            return None;
        }
        self.last_seek = seq;

        log::info!("{} to {}ms ({:.3})", seq, position_millis, fraction);
        Some(EngineCall::SetPosition {
            position_millis,
            seq,
        })
    }
}

impl Default for TransportDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::{PlayerConfig, RawStatus};

    fn ready_session(dispatcher: &mut TransportDispatcher) -> PlaybackSession {
        let mut slot = None;
        dispatcher.load(&mut slot, "stream.m3u8").unwrap();
        let mut session = slot.unwrap();
        let raw = RawStatus {
            is_loaded: Some(true),
            is_playing: Some(false),
            position_millis: Some(0.0),
            duration_millis: Some(120_000.0),
            error: None,
        };
        session.apply_status(&raw, &PlayerConfig::default(), Instant::now());
        session
    }

    #[test]
    fn test_load_allocates_increasing_tokens() {
        let mut dispatcher = TransportDispatcher::new();
        let mut slot = None;
        let (first, old) = dispatcher.load(&mut slot, "a.m3u8").unwrap();
        assert!(old.is_none());
        let (second, _) = dispatcher.load(&mut slot, "a.m3u8").unwrap();
        assert!(second > first);
        assert_eq!(slot.as_ref().map(|s| s.token()), Some(second));
        assert_eq!(slot.as_ref().map(|s| s.state()), Some(PlaybackState::Loading));
    }

    #[test]
    fn test_seek_clamps_fraction() {
        let mut dispatcher = TransportDispatcher::new();
        let mut session = ready_session(&mut dispatcher);

        let call = dispatcher.seek_to(&mut session, 1.7, Instant::now());
        assert!(matches!(
            call,
            Some(EngineCall::SetPosition {
                position_millis: 120_000,
                ..
            })
        ));

        let call = dispatcher.seek_to(&mut session, -0.3, Instant::now());
        assert!(matches!(
            call,
            Some(EngineCall::SetPosition {
                position_millis: 0,
                ..
            })
        ));
        assert_eq!(session.pending_seek().map(|s| s.fraction), Some(0.0));
    }

    #[test]
    fn test_seek_rejected_without_duration() {
        let mut dispatcher = TransportDispatcher::new();
        let mut slot = None;
        dispatcher.load(&mut slot, "live.m3u8").unwrap();
        let mut session = slot.unwrap();

        assert_eq!(dispatcher.seek_to(&mut session, 0.5, Instant::now()), None);

        let raw = RawStatus {
            is_loaded: Some(true),
            ..RawStatus::default()
        };
        session.apply_status(&raw, &PlayerConfig::default(), Instant::now());
        assert_eq!(session.state(), PlaybackState::Ready);
        assert_eq!(dispatcher.seek_to(&mut session, 0.5, Instant::now()), None);
        assert_eq!(dispatcher.seek_to(&mut session, f64::NAN, Instant::now()), None);
        assert_eq!(session.state(), PlaybackState::Ready);
    }

    #[test]
    fn test_seek_sequence_advances() {
        let mut dispatcher = TransportDispatcher::new();
        let mut session = ready_session(&mut dispatcher);
        let first = dispatcher.seek_to(&mut session, 0.25, Instant::now());
        let second = dispatcher.seek_to(&mut session, 0.5, Instant::now());
        match (first, second) {
            (
                Some(EngineCall::SetPosition { seq: a, .. }),
                Some(EngineCall::SetPosition { seq: b, .. }),
            ) => assert!(b > a),
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[test]
    fn test_toggle_alternates() {
        let mut dispatcher = TransportDispatcher::new();
        let mut session = ready_session(&mut dispatcher);
        assert_eq!(dispatcher.toggle(&mut session), Some(EngineCall::Play));
        // Play is pending, so the next toggle pauses
        assert_eq!(dispatcher.toggle(&mut session), Some(EngineCall::Pause));
    }
}
