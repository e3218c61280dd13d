// Recording media engine for controller tests

use atlas_core::{
    EngineFactory, MediaEngine, PlayerError, RawStatus, Result, SeekSeq, SessionToken, StatusSink,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Play,
    Pause,
    SetPosition(u64, SeekSeq),
    Release,
}

#[derive(Default)]
struct Recorder {
    calls: Vec<(SessionToken, Call)>,
    sinks: Vec<Arc<dyn StatusSink>>,
    fail_create: Option<String>,
    fail_load: Option<String>,
    fail_play: Option<String>,
    fail_seek: Option<String>,
    echo_on_load: Option<RawStatus>,
}

/// Hands out engines that record every call, tagged with their session
#[derive(Default)]
pub struct RecordingFactory {
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(SessionToken, Call)> {
        self.recorder.lock().calls.clone()
    }

    pub fn calls_for(&self, token: SessionToken) -> Vec<Call> {
        self.recorder
            .lock()
            .calls
            .iter()
            .filter(|(owner, _)| *owner == token)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.recorder
            .lock()
            .calls
            .iter()
            .filter(|(_, call)| matches(call))
            .count()
    }

    /// Sink given to the `index`th engine created
    pub fn sink(&self, index: usize) -> Arc<dyn StatusSink> {
        self.recorder.lock().sinks[index].clone()
    }

    pub fn fail_next_create(&self, message: &str) {
        self.recorder.lock().fail_create = Some(message.to_string());
    }

    pub fn fail_next_load(&self, message: &str) {
        self.recorder.lock().fail_load = Some(message.to_string());
    }

    pub fn fail_next_play(&self, message: &str) {
        self.recorder.lock().fail_play = Some(message.to_string());
    }

    pub fn fail_next_seek(&self, message: &str) {
        self.recorder.lock().fail_seek = Some(message.to_string());
    }

    /// Report `status` from inside the next `load` call, before it returns
    pub fn echo_on_load(&self, status: RawStatus) {
        self.recorder.lock().echo_on_load = Some(status);
    }
}

impl EngineFactory for RecordingFactory {
    fn create_engine(&self, sink: Arc<dyn StatusSink>) -> Result<Box<dyn MediaEngine>> {
        let mut recorder = self.recorder.lock();
        if let Some(message) = recorder.fail_create.take() {
            return Err(PlayerError::EngineError(message));
        }
        recorder.sinks.push(sink.clone());
        Ok(Box::new(RecordingEngine {
            recorder: self.recorder.clone(),
            sink,
        }))
    }
}

struct RecordingEngine {
    recorder: Arc<Mutex<Recorder>>,
    sink: Arc<dyn StatusSink>,
}

impl RecordingEngine {
    fn record(&self, call: Call) {
        let token = self.sink.token();
        self.recorder.lock().calls.push((token, call));
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&mut self, uri: &str) -> Result<()> {
        self.record(Call::Load(uri.to_string()));
        let (failure, echo) = {
            let mut recorder = self.recorder.lock();
            (recorder.fail_load.take(), recorder.echo_on_load.take())
        };
        if let Some(message) = failure {
            return Err(PlayerError::LoadError(message));
        }
        if let Some(status) = echo {
            self.sink.status(status);
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(Call::Play);
        match self.recorder.lock().fail_play.take() {
            Some(message) => Err(PlayerError::PlaybackError(message)),
            None => Ok(()),
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.record(Call::Pause);
        Ok(())
    }

    fn set_position(&mut self, position_millis: u64, seq: SeekSeq) -> Result<()> {
        self.record(Call::SetPosition(position_millis, seq));
        match self.recorder.lock().fail_seek.take() {
            Some(message) => Err(PlayerError::EngineError(message)),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        self.record(Call::Release);
        Ok(())
    }
}
