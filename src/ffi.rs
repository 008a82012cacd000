//! FFI bindings for Folio Engage
//!
//! This module provides C-compatible functions so a host UI (browser shell,
//! native webview, mobile app) can drive the tracker. All functions use C
//! strings (null-terminated) and return allocated memory that must be freed by
//! the caller using `engage_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use tracing::debug;

use crate::pipeline::{session_to_report, EngagementProcessor};
use crate::types::{Millis, VisibilityEvent};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a recorded session JSON and return the report JSON.
///
/// A negative `now` evaluates at the latest event timestamp.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error; call `engage_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engage_session_to_report(json: *const c_char, now: i64) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let now = if now < 0 { None } else { Some(now as Millis) };

    match session_to_report(&json_str, now) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Tracker API
// ============================================================================

/// Opaque handle to a live page-view tracker
pub struct EngageTrackerHandle {
    processor: EngagementProcessor,
}

/// Create a tracker from a JSON array of section identifiers.
///
/// # Safety
/// - `sections_json` must be a valid null-terminated C string, e.g. `["about","projects"]`.
/// - Returns a pointer that must be freed with `engage_tracker_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_new(sections_json: *const c_char) -> *mut EngageTrackerHandle {
    clear_last_error();

    let json_str = match cstr_to_string(sections_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid sections string pointer");
            return ptr::null_mut();
        }
    };

    let sections: Vec<String> = match serde_json::from_str(&json_str) {
        Ok(ids) => ids,
        Err(e) => {
            set_last_error(&format!("Sections must be a JSON array of strings: {}", e));
            return ptr::null_mut();
        }
    };

    let handle = Box::new(EngageTrackerHandle {
        processor: EngagementProcessor::new(sections),
    });
    Box::into_raw(handle)
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_free(tracker: *mut EngageTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Record a visibility change for a section.
///
/// Unknown sections and repeated states are accepted and ignored.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - `section_id` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on null pointers.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_visibility(
    tracker: *mut EngageTrackerHandle,
    section_id: *const c_char,
    visible: bool,
    now: u64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;

    if section_id.is_null() {
        set_last_error("Null section_id pointer");
        return -1;
    }

    // An id that is not UTF-8 can never match a tracked section
    let id = match CStr::from_ptr(section_id).to_str() {
        Ok(s) => s.to_string(),
        Err(e) => {
            debug!(error = %e, "ignoring visibility change for non UTF-8 section id");
            return 0;
        }
    };

    let event = if visible {
        VisibilityEvent::shown(id, now)
    } else {
        VisibilityEvent::hidden(id, now)
    };
    handle.processor.push_event(&event);
    0
}

/// Return the engagement snapshot at `now` as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_snapshot(
    tracker: *const EngageTrackerHandle,
    now: u64,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &*tracker;

    match serde_json::to_string(&handle.processor.snapshot(now)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the full engagement report at `now` as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns a newly allocated string that must be freed with `engage_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_report(
    tracker: *const EngageTrackerHandle,
    now: u64,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &*tracker;

    match handle.processor.report_json(now) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Discard accumulated state for a new page view.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `engage_tracker_new`.
/// - Returns 0 on success, -1 on a null pointer.
#[no_mangle]
pub unsafe extern "C" fn engage_tracker_reset(tracker: *mut EngageTrackerHandle) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    (*tracker).processor.reset();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Engage functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Engage function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engage_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Engage function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engage_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Engage library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engage_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
