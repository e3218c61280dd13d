// Playback controller facade
//
// Two producers feed one session: UI commands and engine callbacks.
// Both go through `Shared::mutate`, which holds the session lock only while
// the state machine runs. Engine calls always happen after that lock is
// released, so an engine may report status synchronously from inside `load`
// or `play`. Observer events are queued under the session lock and handed
// out by one thread at a time, so observers see transitions in the order
// they were applied.

use crate::dispatcher::{EngineCall, TransportDispatcher};
use crate::retry::RetryCoordinator;
use crate::session::{EngineHandle, PlaybackSession};
use crate::sources;
use atlas_core::{
    fraction_from_offset, CallbackEvent, CallbackManager, EngineFactory, ErrorInfo,
    PlaybackState, PlayerCallback, PlayerConfig, PlayerView, RawStatus, SeekSeq, SessionToken,
    StatusSink,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// A user command, kept so it can run after the command in progress
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Load(String),
    Play,
    Pause,
    Toggle,
    SeekTo(f64),
    Retry,
    LoadFallback,
    Teardown,
}

struct ControllerInner {
    session: Option<PlaybackSession>,
    dispatcher: TransportDispatcher,
    retry: RetryCoordinator,
    torn_down: bool,
}

impl ControllerInner {
    fn view(&self) -> PlayerView {
        let Some(session) = &self.session else {
            return PlayerView::idle();
        };
        PlayerView {
            state: session.state(),
            snapshot: session.snapshot().clone(),
            pending_intent: session.pending_intent(),
            pending_seek_fraction: session.pending_seek().map(|seek| seek.fraction),
            token: Some(session.token()),
            source_uri: Some(session.source_uri().to_string()),
            attempt: self.retry.attempts(),
        }
    }

    /// The session `token` belongs to, if it is still the live one
    fn current(&mut self, token: SessionToken) -> Option<&mut PlaybackSession> {
        if self.torn_down {
            log::debug!("Discarding event for {} after teardown", token);
            return None;
        }
        match self.session.as_mut() {
            Some(session) if session.token() == token => Some(session),
            _ => {
                log::debug!("Discarding stale event for {}", token);
                None
            }
        }
    }
}

struct Shared {
    inner: Mutex<ControllerInner>,
    /// Serializes commands so engine calls reach the engine in command order.
    /// The flag is set while the owning thread is running a command.
    commands: ReentrantMutex<Cell<bool>>,
    /// Commands issued from inside a running command on the same thread
    deferred: Mutex<VecDeque<Command>>,
    /// Observer events in the order their transitions were applied
    events: Mutex<VecDeque<CallbackEvent>>,
    delivering: Mutex<()>,
    callbacks: CallbackManager,
    factory: Arc<dyn EngineFactory>,
    config: PlayerConfig,
}

impl Shared {
    /// Run `f` under the session lock, then deliver what changed to observers
    fn mutate<R>(&self, f: impl FnOnce(&mut ControllerInner) -> R) -> R {
        let result = {
            let mut inner = self.inner.lock();
            let before = inner.view();
            let result = f(&mut inner);
            let after = inner.view();
            self.queue_events(&before, &after);
            result
        };
        self.deliver();
        result
    }

    fn queue_events(&self, before: &PlayerView, after: &PlayerView) {
        if before == after {
            return;
        }
        let mut events = self.events.lock();
        if before.state != after.state {
            events.push_back(CallbackEvent::StateChanged {
                old_state: before.state,
                new_state: after.state,
            });
        }
        if after.state == PlaybackState::Error && before.state != PlaybackState::Error {
            if let Some(info) = &after.snapshot.error_info {
                events.push_back(CallbackEvent::Error { info: info.clone() });
            }
        }
        events.push_back(CallbackEvent::ViewUpdated {
            view: after.clone(),
            position_only: before.differs_only_in_position(after),
        });
    }

    /// Hand queued events to observers.
    ///
    /// Only one thread delivers at a time. A thread that finds delivery in
    /// progress, including an observer producing events from inside its
    /// own callback, leaves its events to the delivering thread.
    fn deliver(&self) {
        loop {
            let Some(delivering) = self.delivering.try_lock() else {
                return;
            };
            loop {
                let next = self.events.lock().pop_front();
                let Some(event) = next else {
                    break;
                };
                self.callbacks.dispatch_event(event);
            }
            drop(delivering);
            // Events queued between the last pop and the unlock
            if self.events.lock().is_empty() {
                return;
            }
        }
    }

    fn on_status(&self, token: SessionToken, raw: RawStatus) {
        let config = &self.config;
        self.mutate(|inner| {
            if let Some(session) = inner.current(token) {
                session.apply_status(&raw, config, Instant::now());
            }
        });
    }

    fn on_seek_completed(&self, token: SessionToken, seq: SeekSeq) {
        self.mutate(|inner| {
            if let Some(session) = inner.current(token) {
                session.complete_seek(seq);
            }
        });
    }

    fn on_seek_failed(&self, token: SessionToken, seq: SeekSeq, message: &str) {
        self.mutate(|inner| {
            if let Some(session) = inner.current(token) {
                session.fail_seek(seq, message);
            }
        });
    }

    fn fail_session(&self, token: SessionToken, info: ErrorInfo) {
        log::warn!("{} failed: {}", token, info.message);
        self.mutate(|inner| {
            if let Some(session) = inner.current(token) {
                session.fail(info);
            }
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let engine = self
            .inner
            .get_mut()
            .session
            .as_mut()
            .and_then(PlaybackSession::take_engine);
        release_engine(engine);
    }
}

fn release_engine(engine: Option<EngineHandle>) {
    if let Some(engine) = engine {
        if let Err(e) = engine.lock().release() {
            log::warn!("Engine release failed: {}", e);
        }
    }
}

/// Status sink handed to each engine, bound to the session that created it.
///
/// Holds the controller weakly: once the controller is gone every call is
/// a no-op.
struct SessionSink {
    shared: Weak<Shared>,
    token: SessionToken,
}

impl StatusSink for SessionSink {
    fn token(&self) -> SessionToken {
        self.token
    }

    fn status(&self, raw: RawStatus) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_status(self.token, raw);
        }
    }

    fn seek_completed(&self, seq: SeekSeq) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_seek_completed(self.token, seq);
        }
    }

    fn seek_failed(&self, seq: SeekSeq, message: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_seek_failed(self.token, seq, &message);
        }
    }
}

/// Drives one player view's video session.
///
/// Cloning yields another handle to the same controller. Every command is
/// fire-and-forget: it returns immediately and its outcome shows up in
/// `view()` and in callbacks once the engine reports back. A command issued
/// from an observer callback while the same thread is running another
/// command runs once that command has finished.
#[derive(Clone)]
pub struct PlayerController {
    shared: Arc<Shared>,
}

impl PlayerController {
    pub fn new(factory: Arc<dyn EngineFactory>, config: PlayerConfig) -> Self {
        log::info!("PlayerController::new");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(ControllerInner {
                    session: None,
                    dispatcher: TransportDispatcher::new(),
                    retry: RetryCoordinator::new(config.max_retry_attempts),
                    torn_down: false,
                }),
                commands: ReentrantMutex::new(Cell::new(false)),
                deferred: Mutex::new(VecDeque::new()),
                events: Mutex::new(VecDeque::new()),
                delivering: Mutex::new(()),
                callbacks: CallbackManager::new(),
                factory,
                config,
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Register an observer; position-only updates are throttled per config
    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>) {
        self.shared
            .callbacks
            .add_callback(callback, self.shared.config.progress_throttle_millis);
    }

    pub fn clear_callbacks(&self) {
        self.shared.callbacks.clear_callbacks();
    }

    pub fn view(&self) -> PlayerView {
        self.shared.inner.lock().view()
    }

    pub fn state(&self) -> PlaybackState {
        self.view().state
    }

    /// Start a new session for `uri`, replacing the current one
    pub fn load(&self, uri: &str) {
        log::info!("load called: {}", uri);
        self.run(Command::Load(uri.to_string()));
    }

    pub fn play(&self) {
        log::info!("play called");
        self.run(Command::Play);
    }

    pub fn pause(&self) {
        log::info!("pause called");
        self.run(Command::Pause);
    }

    /// The single play/pause button
    pub fn toggle(&self) {
        log::info!("toggle called");
        self.run(Command::Toggle);
    }

    pub fn seek_to(&self, fraction: f64) {
        log::info!("seek_to called -> {}", fraction);
        self.run(Command::SeekTo(fraction));
    }

    /// Seek to a tap at `offset` along a progress bar `extent` wide
    pub fn seek_to_offset(&self, offset: f64, extent: f64) {
        self.seek_to(fraction_from_offset(offset, extent));
    }

    /// Reload the current source; only meaningful in the Error state
    pub fn retry(&self) {
        log::info!("retry called");
        self.run(Command::Retry);
    }

    /// Switch to the next built-in fallback source after an error
    pub fn load_fallback(&self) {
        self.run(Command::LoadFallback);
    }

    /// Abandon a seek the engine never confirmed. Hosts call this from a
    /// timer when the engine may go quiet.
    pub fn poll(&self) {
        let timeout = self.shared.config.seek_timeout();
        self.shared.mutate(|inner| {
            if inner.torn_down {
                return;
            }
            if let Some(session) = inner.session.as_mut() {
                session.expire_seek(Instant::now(), timeout);
            }
        });
    }

    /// Unmount: invalidate the session and release its engine.
    /// Engine events arriving afterwards are ignored.
    pub fn teardown(&self) {
        log::info!("teardown called");
        self.run(Command::Teardown);
    }

    /// Status from the engine of session `token`
    pub fn on_status(&self, token: SessionToken, raw: RawStatus) {
        self.shared.on_status(token, raw);
    }

    pub fn on_seek_completed(&self, token: SessionToken, seq: SeekSeq) {
        self.shared.on_seek_completed(token, seq);
    }

    pub fn on_seek_failed(&self, token: SessionToken, seq: SeekSeq, message: &str) {
        self.shared.on_seek_failed(token, seq, message);
    }

    /// Run `command` in command order, deferring it when this thread is
    /// already inside a command
    fn run(&self, command: Command) {
        let running = self.shared.commands.lock();
        if running.get() {
            log::debug!("Deferring {:?} until the running command finishes", command);
            self.shared.deferred.lock().push_back(command);
            return;
        }

        running.set(true);
        self.execute(command);
        loop {
            let next = self.shared.deferred.lock().pop_front();
            let Some(command) = next else {
                break;
            };
            self.execute(command);
        }
        running.set(false);
    }

    fn execute(&self, command: Command) {
        match command {
            Command::Load(uri) => self.start_session(&uri),
            Command::Play => self.transport(|dispatcher, session, _| dispatcher.play(session)),
            Command::Pause => self.transport(|dispatcher, session, _| dispatcher.pause(session)),
            Command::Toggle => self.transport(|dispatcher, session, _| dispatcher.toggle(session)),
            Command::SeekTo(fraction) => self.transport(|dispatcher, session, now| {
                dispatcher.seek_to(session, fraction, now)
            }),
            Command::Retry => self.reload_failed(),
            Command::LoadFallback => self.load_next_fallback(),
            Command::Teardown => self.release_session(),
        }
    }

    fn start_session(&self, uri: &str) {
        let started = self.shared.mutate(|inner| {
            if inner.torn_down {
                log::debug!("load ignored after teardown");
                return None;
            }
            let ControllerInner {
                session,
                dispatcher,
                retry,
                ..
            } = inner;
            match dispatcher.load(session, uri) {
                Ok((token, old_engine)) => {
                    retry.record_load(uri);
                    Some((token, old_engine))
                }
                Err(e) => {
                    log::error!("load failed to start a session: {}", e);
                    None
                }
            }
        });
        let Some((token, old_engine)) = started else {
            return;
        };

        release_engine(old_engine);

        let sink: Arc<dyn StatusSink> = Arc::new(SessionSink {
            shared: Arc::downgrade(&self.shared),
            token,
        });
        let engine: EngineHandle = match self.shared.factory.create_engine(sink) {
            Ok(engine) => Arc::new(Mutex::new(engine)),
            Err(e) => {
                self.shared
                    .fail_session(token, ErrorInfo::load(e.to_string()));
                return;
            }
        };

        let attached = {
            let mut inner = self.shared.inner.lock();
            match inner.current(token) {
                Some(session) => {
                    session.attach_engine(engine.clone());
                    true
                }
                None => false,
            }
        };
        if !attached {
            release_engine(Some(engine));
            return;
        }

        let call = EngineCall::Load(uri.to_string());
        let result = call.run(&mut **engine.lock());
        if let Err(e) = result {
            self.shared
                .fail_session(token, ErrorInfo::load(e.to_string()));
        }
    }

    fn reload_failed(&self) {
        let target = {
            let inner = self.shared.inner.lock();
            if inner.torn_down {
                None
            } else {
                inner.retry.retry_target(inner.session.as_ref())
            }
        };
        if let Some(uri) = target {
            self.start_session(&uri);
        }
    }

    fn load_next_fallback(&self) {
        let next = {
            let inner = self.shared.inner.lock();
            match &inner.session {
                Some(session) if session.state() == PlaybackState::Error => {
                    sources::fallback_for(session.source_uri())
                }
                _ => None,
            }
        };
        match next {
            Some(source) => {
                log::info!("Falling back to {}", source.title);
                self.start_session(source.url);
            }
            None => log::debug!("No fallback source to load"),
        }
    }

    fn release_session(&self) {
        let engine = {
            let mut inner = self.shared.inner.lock();
            inner.torn_down = true;
            inner.session.as_mut().and_then(PlaybackSession::take_engine)
        };
        release_engine(engine);
        self.shared.callbacks.clear_callbacks();
    }

    fn transport(
        &self,
        plan: impl FnOnce(&mut TransportDispatcher, &mut PlaybackSession, Instant) -> Option<EngineCall>,
    ) {
        let planned = self.shared.mutate(|inner| {
            if inner.torn_down {
                return None;
            }
            let ControllerInner {
                session, dispatcher, ..
            } = inner;
            let session = session.as_mut()?;
            let call = plan(dispatcher, session, Instant::now())?;
            let engine = session.engine()?;
            Some((session.token(), engine, call))
        });
        let Some((token, engine, call)) = planned else {
            return;
        };

        let result = call.run(&mut **engine.lock());
        if let Err(e) = result {
            match call {
                EngineCall::SetPosition { seq, .. } => {
                    self.shared.on_seek_failed(token, seq, &e.to_string())
                }
                _ => self
                    .shared
                    .fail_session(token, ErrorInfo::playback(e.to_string())),
            }
        }
    }
}
