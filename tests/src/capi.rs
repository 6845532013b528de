use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use rexec_capi::*;

unsafe extern "C" fn tag(value: *mut RexecValue, context: *mut c_void) -> *mut RexecValue {
    let seen = unsafe { &*context.cast::<Mutex<Vec<ThreadId>>>() };
    seen.lock().unwrap().push(thread::current().id());

    let mut json = ptr::null_mut();
    assert_eq!(unsafe { rexec_value_to_json(value, &mut json) }, Status::Ok);
    let text = unsafe { CStr::from_ptr(json) }.to_str().unwrap().to_owned();
    unsafe {
        rexec_string_destroy(json);
        rexec_value_destroy(value);
    }

    let mut out = ptr::null_mut();
    let wrapped = format!("{{\"seen\":{text}}}\0");
    let wrapped = CStr::from_bytes_with_nul(wrapped.as_bytes()).unwrap();
    assert_eq!(unsafe { rexec_value_create(wrapped.as_ptr(), &mut out) }, Status::Ok);
    out
}

#[test]
fn pipeline_through_the_c_interface() {
    let seen = Mutex::new(Vec::new());
    let context = &seen as *const Mutex<Vec<ThreadId>> as *mut c_void;

    let mut value = ptr::null_mut();
    let mut scheduler = ptr::null_mut();
    let mut sender = ptr::null_mut();
    let mut result = ptr::null_mut();
    let mut json = ptr::null_mut();
    unsafe {
        assert_eq!(rexec_value_create(c"[1,\"two\"]".as_ptr(), &mut value), Status::Ok);
        assert_eq!(rexec_scheduler_get(c"single_thread".as_ptr(), &mut scheduler), Status::Ok);
        assert_eq!(rexec_just(value, &mut sender), Status::Ok);
        assert_eq!(rexec_then(sender, Some(tag), context, &mut sender), Status::Ok);
        assert_eq!(rexec_transfer(sender, scheduler, &mut sender), Status::Ok);
        assert_eq!(rexec_then(sender, Some(tag), context, &mut sender), Status::Ok);
        assert_eq!(rexec_sync_wait(sender, &mut result), Status::Ok);

        assert_eq!(rexec_value_to_json(result, &mut json), Status::Ok);
        assert_eq!(
            CStr::from_ptr(json).to_str().unwrap(),
            "{\"seen\":{\"seen\":[1,\"two\"]}}"
        );

        rexec_string_destroy(json);
        rexec_value_destroy(result);
        rexec_scheduler_destroy(scheduler);
    }

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], thread::current().id());
    assert_ne!(seen[1], seen[0]);
}

#[test]
fn unstarted_senders_are_destroyed() {
    let mut value = ptr::null_mut();
    let mut sender = ptr::null_mut();
    unsafe {
        assert_eq!(rexec_value_create(c"null".as_ptr(), &mut value), Status::Ok);
        assert_eq!(rexec_just(value, &mut sender), Status::Ok);
        rexec_sender_destroy(sender);
        rexec_sender_destroy(ptr::null_mut());
        rexec_value_destroy(ptr::null_mut());
    }
}

#[test]
fn status_codes() {
    let mut out = ptr::null_mut();
    unsafe {
        assert_eq!(rexec_value_create(c"not json".as_ptr(), &mut out), Status::InvalidArgument);
        assert_eq!(rexec_sync_wait(ptr::null_mut(), &mut out), Status::InvalidArgument);
        assert_eq!(rexec_then(ptr::null_mut(), None, ptr::null_mut(), ptr::null_mut()), Status::InvalidArgument);
    }
    assert!(out.is_null());
    assert_eq!(Status::Ok as i32, 0);
}
