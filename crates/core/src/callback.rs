// Thread-safe callback mechanism for controller events
// Position-only updates are throttled per callback; state changes never are

use crate::state::PlaybackState;
use crate::status::ErrorInfo;
use crate::view::PlayerView;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Controller event types
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    /// Session state changed
    StateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
    },

    /// The observable view changed
    ViewUpdated {
        view: PlayerView,
        /// Only the playback position moved
        position_only: bool,
    },

    /// The session entered the Error state
    Error { info: ErrorInfo },
}

/// Controller callback trait
/// Implementations should be lightweight and non-blocking
pub trait PlayerCallback: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: CallbackEvent);
}

/// Throttled callback wrapper
/// Prevents excessive callback frequency for position-only updates
pub struct ThrottledCallback {
    inner: Arc<dyn PlayerCallback>,
    last_position_update: Mutex<Option<Instant>>,
    position_update_interval: Duration,
}

impl ThrottledCallback {
    pub fn new(callback: Arc<dyn PlayerCallback>, update_interval_ms: u64) -> Self {
        Self {
            inner: callback,
            last_position_update: Mutex::new(None),
            position_update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    pub fn dispatch(&self, event: CallbackEvent) {
        match &event {
            CallbackEvent::ViewUpdated {
                position_only: true,
                ..
            } => {
                let mut last_update = self.last_position_update.lock();
                let due = last_update
                    .map_or(true, |at| at.elapsed() >= self.position_update_interval);
                if due {
                    *last_update = Some(Instant::now());
                    drop(last_update);
                    self.inner.on_event(event);
                }
            }
            _ => {
                self.inner.on_event(event);
            }
        }
    }
}

/// Callback manager for handling multiple callbacks
pub struct CallbackManager {
    callbacks: Mutex<Vec<Arc<ThrottledCallback>>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn PlayerCallback>, throttle_ms: u64) {
        let throttled = Arc::new(ThrottledCallback::new(callback, throttle_ms));
        self.callbacks.lock().push(throttled);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    pub fn dispatch_event(&self, event: CallbackEvent) {
        // Snapshot the list so callbacks may register further callbacks
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks.iter() {
            callback.dispatch(event.clone());
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple callback implementation for testing
#[cfg(any(test, feature = "test-util"))]
pub struct TestCallback {
    events: Mutex<Vec<CallbackEvent>>,
}

#[cfg(any(test, feature = "test-util"))]
impl TestCallback {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn get_events(&self) -> Vec<CallbackEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// `new_state` of every StateChanged event, in order
    pub fn states(&self) -> Vec<PlaybackState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                CallbackEvent::StateChanged { new_state, .. } => Some(*new_state),
                _ => None,
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for TestCallback {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl PlayerCallback for TestCallback {
    fn on_event(&self, event: CallbackEvent) {
        self.events.lock().push(event);
    }
}
