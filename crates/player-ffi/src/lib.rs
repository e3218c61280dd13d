// FFI bridge for the Atlas playback controller
// Exposes a C ABI: the host supplies the media engine as a vtable and pushes
// engine status back in as JSON.

use atlas_controller::{sources, PlayerController};
use atlas_core::{
    format_time, CallbackEvent, EngineFactory, MediaEngine, PlayerCallback, PlayerConfig,
    PlayerError, RawStatus, Result, SeekSeq, SessionToken, StatusSink,
};
use libc::{c_char, c_void, size_t};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::{Arc, Once};

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, PlayerController>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();
static PRIMARY_SOURCE_URL: Lazy<CString> =
    Lazy::new(|| CString::new(sources::primary_source().url).unwrap_or_default());

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("AtlasPlayer"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(log::LevelFilter::Info)
                .try_init();
        }
    });
}

fn next_player_id() -> i64 {
    let mut next = NEXT_PLAYER_ID.lock();
    let id = *next;
    *next += 1;
    id
}

/// Look up a controller. The registry lock is released before `f` runs, so
/// engine callbacks re-entering the registry cannot deadlock.
fn with_player<R>(id: i64, f: impl FnOnce(&PlayerController) -> Result<R>) -> Result<R> {
    let player = PLAYER_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(|| PlayerError::InvalidState("Invalid player ID".into()))?;
    f(&player)
}

fn command(id: i64, f: impl FnOnce(&PlayerController)) -> i32 {
    to_code(with_player(id, |p| {
        f(p);
        Ok(())
    }))
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

/// Borrow a C string argument
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn read_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(PlayerError::InvalidArgument("null string".into()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| PlayerError::InvalidArgument(e.to_string()))
}

/// Copy `text` into a caller buffer, always NUL-terminated when `len > 0`.
/// Returns the full length of `text`, so callers can detect truncation.
///
/// # Safety
/// `buf` must be null or valid for `len` bytes of writes.
unsafe fn write_str(text: &str, buf: *mut c_char, len: size_t) -> i32 {
    if !buf.is_null() && len > 0 {
        let count = text.len().min(len - 1);
        std::ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, buf, count);
        *buf.add(count) = 0;
    }
    i32::try_from(text.len()).unwrap_or(i32::MAX)
}

// -----------------------------------------------------------------------------
// Host media engine
// -----------------------------------------------------------------------------

/// Media engine implemented by the host.
///
/// Every function returns 0 when the request was accepted. Outcomes are
/// reported back through `atlas_player_push_status`,
/// `atlas_player_seek_completed` and `atlas_player_seek_failed`, tagged with
/// the `token` the call carried. Calls may arrive on any thread.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AtlasEngineVTable {
    pub context: *mut c_void,
    pub load: extern "C" fn(context: *mut c_void, player_id: i64, token: u64, uri: *const c_char) -> i32,
    pub play: extern "C" fn(context: *mut c_void, player_id: i64, token: u64) -> i32,
    pub pause: extern "C" fn(context: *mut c_void, player_id: i64, token: u64) -> i32,
    pub set_position: extern "C" fn(
        context: *mut c_void,
        player_id: i64,
        token: u64,
        position_ms: u64,
        seek_seq: u64,
    ) -> i32,
    pub release: extern "C" fn(context: *mut c_void, player_id: i64, token: u64),
}

// The host promises the context may be used from any thread.
unsafe impl Send for AtlasEngineVTable {}
unsafe impl Sync for AtlasEngineVTable {}

fn host_result(code: i32, what: &str) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(PlayerError::EngineError(format!("host {} returned {}", what, code)))
    }
}

struct FfiEngineFactory {
    player_id: i64,
    vtable: AtlasEngineVTable,
}

impl EngineFactory for FfiEngineFactory {
    fn create_engine(&self, sink: Arc<dyn StatusSink>) -> Result<Box<dyn MediaEngine>> {
        Ok(Box::new(FfiEngine {
            player_id: self.player_id,
            token: sink.token().as_raw(),
            vtable: self.vtable,
        }))
    }
}

struct FfiEngine {
    player_id: i64,
    token: u64,
    vtable: AtlasEngineVTable,
}

impl MediaEngine for FfiEngine {
    fn load(&mut self, uri: &str) -> Result<()> {
        let uri = CString::new(uri).map_err(|e| PlayerError::InvalidArgument(e.to_string()))?;
        let code = (self.vtable.load)(self.vtable.context, self.player_id, self.token, uri.as_ptr());
        host_result(code, "load")
    }

    fn play(&mut self) -> Result<()> {
        let code = (self.vtable.play)(self.vtable.context, self.player_id, self.token);
        host_result(code, "play")
    }

    fn pause(&mut self) -> Result<()> {
        let code = (self.vtable.pause)(self.vtable.context, self.player_id, self.token);
        host_result(code, "pause")
    }

    fn set_position(&mut self, position_millis: u64, seq: SeekSeq) -> Result<()> {
        let code = (self.vtable.set_position)(
            self.vtable.context,
            self.player_id,
            self.token,
            position_millis,
            seq.as_raw(),
        );
        host_result(code, "set_position")
    }

    fn release(&mut self) -> Result<()> {
        (self.vtable.release)(self.vtable.context, self.player_id, self.token);
        Ok(())
    }
}

/// Receives `(context, player_id, state_code, view_json)` whenever the view changes
pub type AtlasViewListener =
    extern "C" fn(context: *mut c_void, player_id: i64, state: i32, view_json: *const c_char);

struct FfiListener {
    player_id: i64,
    context: *mut c_void,
    callback: AtlasViewListener,
}

unsafe impl Send for FfiListener {}
unsafe impl Sync for FfiListener {}

impl PlayerCallback for FfiListener {
    fn on_event(&self, event: CallbackEvent) {
        let CallbackEvent::ViewUpdated { view, .. } = event else {
            return;
        };
        let json = match serde_json::to_string(&view) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize view: {}", e);
                return;
            }
        };
        if let Ok(json) = CString::new(json) {
            (self.callback)(self.context, self.player_id, view.state.code(), json.as_ptr());
        }
    }
}

// -------------------------------
// C ABI
// -------------------------------

/// Create a controller. `config_json` may be null for defaults.
/// Returns the player id, or -1 on failure.
///
/// # Safety
/// `vtable` must point to a valid vtable; `config_json` must be null or a
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_create(
    vtable: *const AtlasEngineVTable,
    config_json: *const c_char,
) -> i64 {
    init_logging();
    if vtable.is_null() {
        log::error!("atlas_player_create: null vtable");
        return -1;
    }
    let config = if config_json.is_null() {
        Ok(PlayerConfig::default())
    } else {
        read_str(config_json).and_then(PlayerConfig::from_json)
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            log::error!("atlas_player_create: {}", err);
            return -1;
        }
    };

    let id = next_player_id();
    let factory = Arc::new(FfiEngineFactory {
        player_id: id,
        vtable: *vtable,
    });
    PLAYER_REGISTRY
        .lock()
        .insert(id, PlayerController::new(factory, config));
    id
}

/// Tear the controller down and forget it
#[no_mangle]
pub extern "C" fn atlas_player_destroy(player_id: i64) -> i32 {
    let removed = PLAYER_REGISTRY.lock().remove(&player_id);
    match removed {
        Some(player) => {
            player.teardown();
            0
        }
        None => -1,
    }
}

/// # Safety
/// `context` is handed back to `listener` untouched and must stay valid
/// until the player is destroyed.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_set_listener(
    player_id: i64,
    context: *mut c_void,
    listener: AtlasViewListener,
) -> i32 {
    to_code(with_player(player_id, |p| {
        p.add_callback(Arc::new(FfiListener {
            player_id,
            context,
            callback: listener,
        }));
        Ok(())
    }))
}

/// # Safety
/// `uri` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_load(player_id: i64, uri: *const c_char) -> i32 {
    to_code(read_str(uri).and_then(|uri| {
        with_player(player_id, |p| {
            p.load(uri);
            Ok(())
        })
    }))
}

#[no_mangle]
pub extern "C" fn atlas_player_play(player_id: i64) -> i32 {
    command(player_id, |p| p.play())
}

#[no_mangle]
pub extern "C" fn atlas_player_pause(player_id: i64) -> i32 {
    command(player_id, |p| p.pause())
}

#[no_mangle]
pub extern "C" fn atlas_player_toggle(player_id: i64) -> i32 {
    command(player_id, |p| p.toggle())
}

#[no_mangle]
pub extern "C" fn atlas_player_seek_to(player_id: i64, fraction: f64) -> i32 {
    command(player_id, |p| p.seek_to(fraction))
}

#[no_mangle]
pub extern "C" fn atlas_player_seek_to_offset(player_id: i64, offset: f64, extent: f64) -> i32 {
    command(player_id, |p| p.seek_to_offset(offset, extent))
}

#[no_mangle]
pub extern "C" fn atlas_player_retry(player_id: i64) -> i32 {
    command(player_id, |p| p.retry())
}

#[no_mangle]
pub extern "C" fn atlas_player_load_fallback(player_id: i64) -> i32 {
    command(player_id, |p| p.load_fallback())
}

/// Expire an unconfirmed seek; hosts call this from a timer
#[no_mangle]
pub extern "C" fn atlas_player_poll(player_id: i64) -> i32 {
    command(player_id, |p| p.poll())
}

#[no_mangle]
pub extern "C" fn atlas_player_get_state(player_id: i64) -> i32 {
    match with_player(player_id, |p| Ok(p.state())) {
        Ok(state) => state.code(),
        Err(err) => {
            log::error!("Failed to get state: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn atlas_player_get_position(player_id: i64) -> i64 {
    match with_player(player_id, |p| Ok(p.view().snapshot.position_millis)) {
        Ok(pos) => pos as i64,
        Err(err) => {
            log::error!("Failed to get position: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn atlas_player_get_duration(player_id: i64) -> i64 {
    match with_player(player_id, |p| Ok(p.view().snapshot.duration_millis)) {
        Ok(dur) => dur as i64,
        Err(err) => {
            log::error!("Failed to get duration: {}", err);
            -1
        }
    }
}

/// Progress bar fill in [0, 1], or -1 for an unknown player
#[no_mangle]
pub extern "C" fn atlas_player_get_progress(player_id: i64) -> f64 {
    with_player(player_id, |p| Ok(p.view().progress().fraction)).unwrap_or(-1.0)
}

/// Write the current view as JSON. Returns the JSON length, or -1.
///
/// # Safety
/// `buf` must be null or valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_view_json(
    player_id: i64,
    buf: *mut c_char,
    len: size_t,
) -> i32 {
    let json = with_player(player_id, |p| Ok(serde_json::to_string(&p.view())?));
    match json {
        Ok(json) => write_str(&json, buf, len),
        Err(err) => {
            log::error!("Failed to get view: {}", err);
            -1
        }
    }
}

/// Deliver a status object from the engine of session `token`
///
/// # Safety
/// `status_json` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_push_status(
    player_id: i64,
    token: u64,
    status_json: *const c_char,
) -> i32 {
    to_code(
        read_str(status_json)
            .and_then(RawStatus::from_json)
            .and_then(|raw| {
                with_player(player_id, |p| {
                    p.on_status(SessionToken::from_raw(token), raw);
                    Ok(())
                })
            }),
    )
}

#[no_mangle]
pub extern "C" fn atlas_player_seek_completed(player_id: i64, token: u64, seek_seq: u64) -> i32 {
    to_code(with_player(player_id, |p| {
        p.on_seek_completed(SessionToken::from_raw(token), SeekSeq::from_raw(seek_seq));
        Ok(())
    }))
}

/// # Safety
/// `message` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn atlas_player_seek_failed(
    player_id: i64,
    token: u64,
    seek_seq: u64,
    message: *const c_char,
) -> i32 {
    let message = read_str(message).unwrap_or("seek failed");
    to_code(with_player(player_id, |p| {
        p.on_seek_failed(
            SessionToken::from_raw(token),
            SeekSeq::from_raw(seek_seq),
            message,
        );
        Ok(())
    }))
}

/// Format milliseconds as `M:SS`. Returns the text length.
///
/// # Safety
/// `buf` must be null or valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn atlas_format_time(millis: f64, buf: *mut c_char, len: size_t) -> i32 {
    write_str(&format_time(millis), buf, len)
}

/// URL of the default demo stream; static, never freed
#[no_mangle]
pub extern "C" fn atlas_primary_source_url() -> *const c_char {
    PRIMARY_SOURCE_URL.as_ptr()
}
