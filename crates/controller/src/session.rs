// One playback session: a source, its token, its engine and its state

use atlas_core::status::project_onto;
use atlas_core::{
    ErrorInfo, MediaEngine, PlaybackState, PlaybackStateMachine, PlayerConfig, RawStatus, Result,
    SeekSeq, SessionToken, StatusSnapshot, TransportIntent,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared handle to the engine owned by a session
pub type EngineHandle = Arc<Mutex<Box<dyn MediaEngine>>>;

/// A seek the engine has not confirmed yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSeek {
    pub fraction: f64,
    pub target_millis: u64,
    pub seq: SeekSeq,
    pub issued_at: Instant,
    /// Last position the engine itself reported while the seek was pending
    pub reported_millis: u64,
}

/// State of one `load` lineage
pub struct PlaybackSession {
    source_uri: String,
    token: SessionToken,
    machine: PlaybackStateMachine,
    pending_seek: Option<PendingSeek>,
    engine: Option<EngineHandle>,
}

impl PlaybackSession {
    /// Create a session already in Loading
    pub fn start(source_uri: &str, token: SessionToken) -> Result<Self> {
        let mut machine = PlaybackStateMachine::new();
        machine.begin_loading()?;
        Ok(Self {
            source_uri: source_uri.to_string(),
            token,
            machine,
            pending_seek: None,
            engine: None,
        })
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn state(&self) -> PlaybackState {
        self.machine.state()
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        self.machine.snapshot()
    }

    pub fn pending_intent(&self) -> Option<TransportIntent> {
        self.machine.pending_intent()
    }

    pub fn pending_seek(&self) -> Option<&PendingSeek> {
        self.pending_seek.as_ref()
    }

    pub fn engine(&self) -> Option<EngineHandle> {
        self.engine.clone()
    }

    pub fn attach_engine(&mut self, engine: EngineHandle) {
        self.engine = Some(engine);
    }

    pub fn take_engine(&mut self) -> Option<EngineHandle> {
        self.engine.take()
    }

    pub fn request(&mut self, intent: TransportIntent) -> bool {
        self.machine.request(intent)
    }

    /// Enter Seeking towards `target_millis`, superseding any pending seek
    pub fn begin_seek(
        &mut self,
        fraction: f64,
        target_millis: u64,
        seq: SeekSeq,
        now: Instant,
    ) -> Result<()> {
        let reported_millis = match &self.pending_seek {
            Some(previous) => previous.reported_millis,
            None => self.snapshot().position_millis,
        };
        self.machine.begin_seek(target_millis)?;
        if let Some(previous) = self.pending_seek.replace(PendingSeek {
            fraction,
            target_millis,
            seq,
            issued_at: now,
            reported_millis,
        }) {
            log::debug!("{} supersedes {}", seq, previous.seq);
        }
        Ok(())
    }

    /// Apply one status event from this session's engine
    pub fn apply_status(&mut self, raw: &RawStatus, config: &PlayerConfig, now: Instant) {
        let projection = project_onto(raw, self.machine.snapshot());
        if let Some(reported) = self.machine.apply(projection) {
            if !matches!(self.machine.state(), PlaybackState::Seeking { .. }) {
                self.pending_seek = None;
            } else if let Some(seek) = self.pending_seek.as_mut() {
                seek.reported_millis = reported;
                if reported.abs_diff(seek.target_millis) <= config.seek_tolerance_millis {
                    let seq = seek.seq;
                    self.confirm_seek(seq, reported);
                }
            }
        }
        self.expire_seek(now, config.seek_timeout());
    }

    /// Engine finished the seek `seq`. Completions of superseded seeks are dropped.
    pub fn complete_seek(&mut self, seq: SeekSeq) -> bool {
        match self.pending_seek {
            Some(seek) if seek.seq == seq => self.confirm_seek(seq, seek.target_millis),
            _ => {
                log::debug!("Discarding stale completion of {}", seq);
                false
            }
        }
    }

    /// Engine failed the seek `seq`; the session goes back to where it was
    pub fn fail_seek(&mut self, seq: SeekSeq, message: &str) -> bool {
        match self.pending_seek {
            Some(seek) if seek.seq == seq => {
                log::warn!("{} failed: {}", seq, message);
                self.abandon_seek()
            }
            _ => {
                log::debug!("Discarding stale failure of {}", seq);
                false
            }
        }
    }

    /// Abandon a seek that has been pending for longer than `timeout`
    pub fn expire_seek(&mut self, now: Instant, timeout: Duration) -> bool {
        match self.pending_seek {
            Some(seek) if now.saturating_duration_since(seek.issued_at) >= timeout => {
                log::warn!(
                    "{} not confirmed within {:?}, abandoning",
                    seek.seq,
                    timeout
                );
                self.abandon_seek()
            }
            _ => false,
        }
    }

    /// Enter Error; any pending seek is dropped
    pub fn fail(&mut self, info: ErrorInfo) -> bool {
        self.pending_seek = None;
        match self.machine.fail(info) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot fail {}: {}", self.token, e);
                false
            }
        }
    }

    fn confirm_seek(&mut self, seq: SeekSeq, position_millis: u64) -> bool {
        self.pending_seek = None;
        match self.machine.finish_seek(position_millis) {
            Ok(()) => {
                log::debug!("{} confirmed at {}ms", seq, position_millis);
                true
            }
            Err(e) => {
                log::warn!("Cannot confirm {}: {}", seq, e);
                false
            }
        }
    }

    fn abandon_seek(&mut self) -> bool {
        let Some(seek) = self.pending_seek.take() else {
            return false;
        };
        match self.machine.finish_seek(seek.reported_millis) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot abandon {}: {}", seek.seq, e);
                false
            }
        }
    }
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

    fn playing_session(config: &PlayerConfig) -> PlaybackSession {
        let mut session = PlaybackSession::start("stream.m3u8", SessionToken::from_raw(1)).unwrap();
        session.apply_status(&loaded(10_000.0, 120_000.0, true), config, Instant::now());
        assert_eq!(session.state(), PlaybackState::Playing);
        session
    }

    #[test]
    fn test_start_is_loading() {
        let session = PlaybackSession::start("a.m3u8", SessionToken::from_raw(3)).unwrap();
        assert_eq!(session.state(), PlaybackState::Loading);
        assert_eq!(session.source_uri(), "a.m3u8");
        assert_eq!(session.token(), SessionToken::from_raw(3));
        assert!(session.engine().is_none());
    }

    #[test]
    fn test_position_echo_confirms_seek() {
        let config = PlayerConfig::default();
        let mut session = playing_session(&config);
        let now = Instant::now();
        session
            .begin_seek(0.5, 60_000, SeekSeq::from_raw(1), now)
            .unwrap();

        // Far from the target: still seeking, position pinned
        session.apply_status(&loaded(10_250.0, 120_000.0, true), &config, now);
        assert!(session.pending_seek().is_some());
        assert_eq!(session.snapshot().position_millis, 60_000);

        let echo = RawStatus {
            position_millis: Some(60_120.0),
            ..RawStatus::default()
        };
        session.apply_status(&echo, &config, now);
        assert!(session.pending_seek().is_none());
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.snapshot().position_millis, 60_120);
    }

    #[test]
    fn test_stale_completion_ignored() {
        let config = PlayerConfig::default();
        let mut session = playing_session(&config);
        let now = Instant::now();
        session.begin_seek(0.25, 30_000, SeekSeq::from_raw(1), now).unwrap();
        session.begin_seek(0.75, 90_000, SeekSeq::from_raw(2), now).unwrap();

        assert!(!session.complete_seek(SeekSeq::from_raw(1)));
        assert_eq!(session.pending_seek().map(|s| s.seq), Some(SeekSeq::from_raw(2)));
        assert_eq!(session.snapshot().position_millis, 90_000);

        assert!(session.complete_seek(SeekSeq::from_raw(2)));
        assert_eq!(session.snapshot().position_millis, 90_000);
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_seek_timeout_restores_reported_position() {
        let config = PlayerConfig {
            seek_timeout_millis: 1_000,
            ..PlayerConfig::default()
        };
        let mut session = playing_session(&config);
        let issued = Instant::now();
        session.begin_seek(0.5, 60_000, SeekSeq::from_raw(1), issued).unwrap();
        session.apply_status(&loaded(11_000.0, 120_000.0, true), &config, issued);
        assert!(session.pending_seek().is_some());

        assert!(session.expire_seek(issued + Duration::from_millis(1_000), config.seek_timeout()));
        assert!(session.pending_seek().is_none());
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.snapshot().position_millis, 11_000);
    }

    #[test]
    fn test_failed_seek_is_abandoned() {
        let config = PlayerConfig::default();
        let mut session = playing_session(&config);
        session
            .begin_seek(0.9, 108_000, SeekSeq::from_raw(4), Instant::now())
            .unwrap();
        assert!(!session.fail_seek(SeekSeq::from_raw(3), "old"));
        assert!(session.fail_seek(SeekSeq::from_raw(4), "not seekable"));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.snapshot().position_millis, 10_000);
    }

    #[test]
    fn test_error_drops_pending_seek() {
        let config = PlayerConfig::default();
        let mut session = playing_session(&config);
        session
            .begin_seek(0.5, 60_000, SeekSeq::from_raw(1), Instant::now())
            .unwrap();
        session.apply_status(&RawStatus::failed("stalled"), &config, Instant::now());
        assert_eq!(session.state(), PlaybackState::Error);
        assert!(session.pending_seek().is_none());
        assert!(!session.complete_seek(SeekSeq::from_raw(1)));
    }
}
