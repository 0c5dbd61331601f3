//! C bindings for SurgSim Score
//!
//! Every function takes null-terminated C strings. Strings returned to the
//! caller are heap-allocated and must be released with `surgsim_free_string`.
//! Failures return NULL (or -1) and leave a message for `surgsim_last_error`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::baseline::DEFAULT_PROGRESS_WINDOW;
use crate::pipeline::{score_attempt_json, ScoringProcessor};

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

/// Read a UTF-8 argument, recording an error naming it when unusable
unsafe fn read_arg(ptr: *const c_char, name: &str) -> Option<String> {
    if ptr.is_null() {
        set_last_error(&format!("Null {name} pointer"));
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s.to_string()),
        Err(_) => {
            set_last_error(&format!("{name} is not valid UTF-8"));
            None
        }
    }
}

/// Caller frees the result with `surgsim_free_string`
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => {
            set_last_error("Output contains an interior NUL byte");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score one attempt against a procedure and return the report JSON.
///
/// # Safety
/// - `attempt_json` and `procedure_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `surgsim_free_string`.
/// - Returns NULL on error; call `surgsim_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn surgsim_score_attempt(
    attempt_json: *const c_char,
    procedure_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(attempt) = read_arg(attempt_json, "attempt_json") else {
        return ptr::null_mut();
    };
    let Some(procedure) = read_arg(procedure_json, "procedure_json") else {
        return ptr::null_mut();
    };

    match score_attempt_json(&attempt, &procedure) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a ScoringProcessor
pub struct ScoringProcessorHandle {
    processor: ScoringProcessor,
}

/// Create a processor keeping `progress_window` attempts (<= 0 selects the default).
///
/// # Safety
/// - Returns a pointer that must be freed with `surgsim_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn surgsim_processor_new(progress_window: i32) -> *mut ScoringProcessorHandle {
    clear_last_error();

    let window = if progress_window <= 0 {
        DEFAULT_PROGRESS_WINDOW
    } else {
        progress_window as usize
    };

    let processor = ScoringProcessor::new().with_progress_window(window);
    Box::into_raw(Box::new(ScoringProcessorHandle { processor }))
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a pointer returned by `surgsim_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn surgsim_processor_free(processor: *mut ScoringProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Score an attempt with a stateful processor and return the report JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `surgsim_processor_new`.
/// - `attempt_json` and `procedure_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `surgsim_free_string`.
/// - Returns NULL on error; call `surgsim_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn surgsim_processor_process(
    processor: *mut ScoringProcessorHandle,
    attempt_json: *const c_char,
    procedure_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let Some(attempt) = read_arg(attempt_json, "attempt_json") else {
        return ptr::null_mut();
    };
    let Some(procedure) = read_arg(procedure_json, "procedure_json") else {
        return ptr::null_mut();
    };

    match handle.processor.process(&attempt, &procedure) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save the processor's per-trainee progress windows to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `surgsim_processor_new`.
/// - Returns a newly allocated string that must be freed with `surgsim_free_string`.
/// - Returns NULL on error; call `surgsim_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn surgsim_processor_save_progress(
    processor: *mut ScoringProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    match handle.processor.save_progress() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Restore the processor's per-trainee progress windows from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `surgsim_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `surgsim_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn surgsim_processor_load_progress(
    processor: *mut ScoringProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;

    let Some(json_str) = read_arg(json, "json") else {
        return -1;
    };

    match handle.processor.load_progress(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `surgsim_*` function.
///
/// # Safety
/// - `ptr` must be a pointer returned by a `surgsim_*` function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn surgsim_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Last error message on this thread, or NULL.
///
/// # Safety
/// - The pointer stays valid until the next `surgsim_*` call on this thread.
/// - Do NOT free the returned pointer.
#[no_mangle]
pub unsafe extern "C" fn surgsim_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn surgsim_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
