//! FFI bindings for Synheart Relay
//!
//! C-compatible entry points for host runtimes written in other languages.
//! The host registers a dispatch callback when it configures its engine and
//! forwards data-layer batches as JSON. Both calls operate on the
//! process-wide [`crate::channel::ChannelBridge`].

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::error::RelayError;
use crate::host::{BinaryMessenger, EngineLifecycle, HostActivity};
use crate::relay::{DataListener, VitalsRelay};
use crate::schema::JsonEventBuffer;

/// Host callback receiving `(channel, method, payload, user_data)`.
///
/// Return 0 when the message was accepted, anything else to signal that the
/// application side is not ready. The strings are only valid for the
/// duration of the call.
pub type VitalsDispatchCallback = extern "C" fn(
    channel: *const c_char,
    method: *const c_char,
    payload: *const c_char,
    user_data: *mut c_void,
) -> i32;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Opaque host pointer handed back on every dispatch
struct UserData(*mut c_void);

// The host guarantees `user_data` may be used from any thread for as long as
// the channel stays bound.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Engine messenger that dispatches through a host C callback
struct CallbackMessenger {
    callback: VitalsDispatchCallback,
    user_data: UserData,
}

impl BinaryMessenger for CallbackMessenger {
    fn send(&self, channel: &str, method: &str, payload: &str) -> Result<(), RelayError> {
        let c_channel =
            CString::new(channel).map_err(|e| RelayError::DispatchError(e.to_string()))?;
        let c_method =
            CString::new(method).map_err(|e| RelayError::DispatchError(e.to_string()))?;
        let c_payload =
            CString::new(payload).map_err(|e| RelayError::DispatchError(e.to_string()))?;

        let status = (self.callback)(
            c_channel.as_ptr(),
            c_method.as_ptr(),
            c_payload.as_ptr(),
            self.user_data.0,
        );

        if status == 0 {
            Ok(())
        } else {
            Err(RelayError::DispatchError(format!(
                "host callback returned {status}"
            )))
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Configure the shared host activity with a callback-backed engine. Call
/// once per engine (re)creation; each call replaces the previous binding.
///
/// # Safety
/// - `user_data` is passed back verbatim and must stay valid, and be usable
///   from any thread, until the next call to this function.
/// - Returns 0 on success, -1 if `callback` is NULL.
#[no_mangle]
pub unsafe extern "C" fn vitals_relay_configure_engine(
    callback: Option<VitalsDispatchCallback>,
    user_data: *mut c_void,
) -> i32 {
    clear_last_error();

    let Some(callback) = callback else {
        set_last_error("Null dispatch callback");
        return -1;
    };

    HostActivity::shared().configure_engine(Arc::new(CallbackMessenger {
        callback,
        user_data: UserData(user_data),
    }));
    0
}

// ============================================================================
// Data layer
// ============================================================================

/// Relay a batch of change notifications (JSON array or NDJSON).
///
/// # Safety
/// - `json` must be a valid null-terminated C string, or NULL.
/// - Returns the number of envelopes forwarded. Never fails; on unusable
///   input it returns 0 and sets `vitals_relay_last_error`.
#[no_mangle]
pub unsafe extern "C" fn vitals_relay_on_data_changed(json: *const c_char) -> i32 {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return 0;
        }
    };

    let mut buffer = match JsonEventBuffer::parse(&json_str) {
        Ok(buffer) => buffer,
        Err(e) => {
            set_last_error(&e.to_string());
            return 0;
        }
    };

    let report = VitalsRelay::shared().on_data_changed(&mut buffer);
    i32::try_from(report.forwarded).unwrap_or(i32::MAX)
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next relay call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn vitals_relay_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the relay library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn vitals_relay_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
