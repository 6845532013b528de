//! C interface over rexec's dynamically typed senders.
//!
//! Every function returns a [`Status`] and hands results back through out
//! pointers. Handles are opaque and owned by the caller until they're passed
//! to a function documented as consuming them, or to the matching
//! `*_destroy` function. Consumed handles are consumed even when the call
//! fails. Panics never cross the boundary, they're reported as
//! [`Status::Panicked`].

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use rexec::dynamic::{Value, ValueSender};
use rexec::sched::registry;
use rexec::{just, AnyScheduler, SenderExt};

/// The result of every call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    /// A null pointer, invalid UTF-8 or malformed JSON was passed.
    InvalidArgument = 1,
    /// No scheduler has the requested name.
    NotFound = 2,
    /// The call panicked. Handles passed to it may have leaked.
    Panicked = 3,
    /// The call failed for any other reason.
    Failed = 4,
}

pub type rexec_status_t = Status;

/// A dynamic value.
#[derive(Debug)]
pub struct RexecValue(Value);

/// A type-erased sender completing with one dynamic value.
#[derive(Debug)]
pub struct RexecSender(ValueSender);

/// A type-erased scheduler.
#[derive(Debug)]
pub struct RexecScheduler(AnyScheduler);

/// Called by `rexec_then` with the completed value and the context pointer.
/// The callback owns `value` and returns a new value, or null for a JSON
/// `null`. It may run on any thread.
pub type rexec_then_fn =
    Option<unsafe extern "C" fn(value: *mut RexecValue, context: *mut c_void) -> *mut RexecValue>;

struct Context(*mut c_void);

// The caller guarantees the context may be used from any thread.
unsafe impl Send for Context {}

impl Context {
    fn get(self) -> *mut c_void {
        self.0
    }
}

fn guard<F>(name: &str, f: F) -> Status
where
    F: FnOnce() -> Result<(), Status>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Ok,
        Ok(Err(status)) => status,
        Err(_) => {
            log::error!("{name} panicked");
            Status::Panicked
        }
    }
}

fn non_null<T>(ptr: *mut T) -> Result<*mut T, Status> {
    if ptr.is_null() {
        Err(Status::InvalidArgument)
    } else {
        Ok(ptr)
    }
}

/// Takes ownership of a handle.
unsafe fn take<T>(ptr: *mut T) -> Result<T, Status> {
    let ptr = non_null(ptr)?;
    Ok(*unsafe { Box::from_raw(ptr) })
}

/// Writes a new handle through `out`.
unsafe fn give<T>(out: *mut *mut T, value: T) {
    unsafe { *out = Box::into_raw(Box::new(value)) }
}

unsafe fn destroy<T>(ptr: *mut T) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Parses `json` into a new value.
///
/// # Safety
/// `json` must be a null-terminated string or null, `out` must be writable or
/// null.
#[no_mangle]
pub unsafe extern "C" fn rexec_value_create(json: *const c_char, out: *mut *mut RexecValue) -> Status {
    guard("rexec_value_create", || {
        let out = non_null(out)?;
        let json = non_null(json.cast_mut())?;
        let text = unsafe { CStr::from_ptr(json) }
            .to_str()
            .map_err(|_| Status::InvalidArgument)?;
        let value = serde_json::from_str::<Value>(text).map_err(|err| {
            log::debug!("rejected value: {err}");
            Status::InvalidArgument
        })?;
        unsafe { give(out, RexecValue(value)) };
        Ok(())
    })
}

/// Serializes `value` to a new JSON string. Free it with
/// `rexec_string_destroy`.
///
/// # Safety
/// `value` must be a live value handle or null, `out` must be writable or
/// null.
#[no_mangle]
pub unsafe extern "C" fn rexec_value_to_json(value: *const RexecValue, out: *mut *mut c_char) -> Status {
    guard("rexec_value_to_json", || {
        let out = non_null(out)?;
        let value = unsafe { non_null(value.cast_mut())?.as_ref() }.ok_or(Status::InvalidArgument)?;
        let text = serde_json::to_string(&value.0).map_err(|_| Status::Failed)?;
        let text = CString::new(text).map_err(|_| Status::Failed)?;
        unsafe { *out = text.into_raw() };
        Ok(())
    })
}

/// # Safety
/// `string` must come from `rexec_value_to_json` or be null.
#[no_mangle]
pub unsafe extern "C" fn rexec_string_destroy(string: *mut c_char) {
    if !string.is_null() {
        drop(unsafe { CString::from_raw(string) });
    }
}

/// # Safety
/// `value` must be a live value handle or null.
#[no_mangle]
pub unsafe extern "C" fn rexec_value_destroy(value: *mut RexecValue) {
    unsafe { destroy(value) }
}

/// Looks up a scheduler by name. `"inline"`, `"thread_pool"` and
/// `"single_thread"` are always available.
///
/// # Safety
/// `name` must be a null-terminated string or null, `out` must be writable or
/// null.
#[no_mangle]
pub unsafe extern "C" fn rexec_scheduler_get(name: *const c_char, out: *mut *mut RexecScheduler) -> Status {
    guard("rexec_scheduler_get", || {
        let out = non_null(out)?;
        let name = non_null(name.cast_mut())?;
        let name = unsafe { CStr::from_ptr(name) }
            .to_str()
            .map_err(|_| Status::InvalidArgument)?;
        let scheduler = registry::get(name).map_err(|err| match err {
            rexec::Error::UnknownScheduler(_) => Status::NotFound,
            err => {
                log::warn!("failed to get scheduler '{name}': {err}");
                Status::Failed
            }
        })?;
        unsafe { give(out, RexecScheduler(scheduler)) };
        Ok(())
    })
}

/// # Safety
/// `scheduler` must be a live scheduler handle or null.
#[no_mangle]
pub unsafe extern "C" fn rexec_scheduler_destroy(scheduler: *mut RexecScheduler) {
    unsafe { destroy(scheduler) }
}

/// Creates a sender completing with `value`. Consumes `value`.
///
/// # Safety
/// `value` must be a live value handle or null, `out` must be writable or
/// null.
#[no_mangle]
pub unsafe extern "C" fn rexec_just(value: *mut RexecValue, out: *mut *mut RexecSender) -> Status {
    guard("rexec_just", || {
        let RexecValue(value) = unsafe { take(value)? };
        let out = non_null(out)?;
        unsafe { give(out, RexecSender(just((value,)).boxed())) };
        Ok(())
    })
}

/// Creates a sender completing with the value of `sender` on `scheduler`.
/// Consumes `sender`, but not `scheduler`.
///
/// # Safety
/// `sender` and `scheduler` must be live handles or null, `out` must be
/// writable or null.
#[no_mangle]
pub unsafe extern "C" fn rexec_transfer(
    sender: *mut RexecSender,
    scheduler: *const RexecScheduler,
    out: *mut *mut RexecSender,
) -> Status {
    guard("rexec_transfer", || {
        let RexecSender(sender) = unsafe { take(sender)? };
        let scheduler = unsafe { non_null(scheduler.cast_mut())?.as_ref() }.ok_or(Status::InvalidArgument)?;
        let out = non_null(out)?;
        unsafe { give(out, RexecSender(sender.transfer(scheduler.0.clone()).boxed())) };
        Ok(())
    })
}

/// Creates a sender completing with the result of `callback` called with the
/// value of `sender`. Consumes `sender`.
///
/// # Safety
/// `sender` must be a live handle or null, `out` must be writable or null.
/// `context` must stay valid, and be usable from any thread, until the
/// callback ran or the returned sender is destroyed.
#[no_mangle]
pub unsafe extern "C" fn rexec_then(
    sender: *mut RexecSender,
    callback: rexec_then_fn,
    context: *mut c_void,
    out: *mut *mut RexecSender,
) -> Status {
    guard("rexec_then", || {
        let RexecSender(sender) = unsafe { take(sender)? };
        let callback = callback.ok_or(Status::InvalidArgument)?;
        let out = non_null(out)?;
        let context = Context(context);

        let next = sender.then(move |(value,)| {
            let input = Box::into_raw(Box::new(RexecValue(value)));
            let output = unsafe { callback(input, context.get()) };
            match unsafe { take(output) } {
                Ok(RexecValue(value)) => (value,),
                Err(_) => (Value::Null,),
            }
        });
        unsafe { give(out, RexecSender(next.boxed())) };
        Ok(())
    })
}

/// Blocks until `sender` completes and writes its value to `out`. Consumes
/// `sender`.
///
/// # Safety
/// `sender` must be a live handle or null, `out` must be writable or null.
#[no_mangle]
pub unsafe extern "C" fn rexec_sync_wait(sender: *mut RexecSender, out: *mut *mut RexecValue) -> Status {
    guard("rexec_sync_wait", || {
        let RexecSender(sender) = unsafe { take(sender)? };
        let out = non_null(out)?;
        let (value,) = sender.sync_wait();
        unsafe { give(out, RexecValue(value)) };
        Ok(())
    })
}

/// # Safety
/// `sender` must be a live sender handle or null.
#[no_mangle]
pub unsafe extern "C" fn rexec_sender_destroy(sender: *mut RexecSender) {
    unsafe { destroy(sender) }
}
