//! A lock-free list of operations waiting on a shared completion.
//!
//! The list head cycles through three states:
//!
//! * null: nothing is waiting and the shared work hasn't been started,
//! * a waiter: at least one operation is waiting,
//! * the sentinel: the shared work completed and the list was handed to the
//!   completing thread. Late arrivals observe the values directly.
//!
//! The sentinel is the address of the list itself. The list is embedded in the
//! shared state, so it can never alias a waiter.

use core::cell::UnsafeCell;
use core::marker::PhantomPinned;
use core::ptr::{self, NonNull};
use core::sync::atomic::AtomicPtr;
use core::sync::atomic::Ordering::{AcqRel, Acquire};

/// A waiting operation. Embed it as the first field of a `#[repr(C)]`
/// operation state so `notify` can recover the operation from the node.
#[derive(Debug)]
pub(crate) struct Waiter {
    /// The next waiter in the list. Written before the node is published and
    /// read by the completing thread after it takes the list.
    next: UnsafeCell<*mut Waiter>,

    /// Called exactly once when the shared work completes.
    notify: unsafe fn(NonNull<Waiter>),

    /// Should not be `Unpin`.
    _pinned: PhantomPinned,
}

unsafe impl Send for Waiter {}
unsafe impl Sync for Waiter {}

impl Waiter {
    pub const fn new(notify: unsafe fn(NonNull<Waiter>)) -> Self {
        Self {
            next: UnsafeCell::new(ptr::null_mut()),
            notify,
            _pinned: PhantomPinned,
        }
    }
}

/// The outcome of registering a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The work already completed. The waiter was not linked and must be
    /// notified by the caller.
    Completed,
    /// The waiter is the first one. The caller is responsible for starting
    /// the shared work, if it isn't started already.
    First,
    /// Other waiters were already linked.
    Queued,
}

#[derive(Debug)]
pub(crate) struct WaitList {
    head: AtomicPtr<Waiter>,
}

impl WaitList {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    #[inline]
    fn sentinel(&self) -> *mut Waiter {
        self as *const Self as *mut Waiter
    }

    pub fn is_complete(&self) -> bool {
        self.head.load(Acquire) == self.sentinel()
    }

    /// Links `waiter` in front of the current head.
    ///
    /// # Safety
    ///
    /// The waiter must stay pinned until it is notified, and must not be
    /// registered again.
    pub unsafe fn register(&self, waiter: NonNull<Waiter>) -> Registration {
        let sentinel = self.sentinel();
        let mut head = self.head.load(Acquire);
        loop {
            if head == sentinel {
                return Registration::Completed;
            }

            unsafe { *waiter.as_ref().next.get() = head };

            match self
                .head
                .compare_exchange_weak(head, waiter.as_ptr(), AcqRel, Acquire)
            {
                Ok(_) if head.is_null() => return Registration::First,
                Ok(_) => return Registration::Queued,
                Err(actual) => head = actual,
            }
        }
    }

    /// Marks the list as complete and notifies every linked waiter, most
    /// recently registered first.
    ///
    /// # Safety
    ///
    /// Must be called at most once. The list must stay alive across this call,
    /// even if a notification drops the last other reference to it.
    pub unsafe fn complete(&self) {
        let mut current = self.head.swap(self.sentinel(), AcqRel);
        debug_assert_ne!(current, self.sentinel(), "wait list completed twice");

        while let Some(waiter) = NonNull::new(current) {
            // Notifying may free the waiter, read everything first.
            let (next, notify) = unsafe {
                let waiter = waiter.as_ref();
                (*waiter.next.get(), waiter.notify)
            };
            unsafe { notify(waiter) };
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::pin::pin;

    use assert_matches2::assert_matches;

    thread_local! {
        static NOTIFIED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    #[repr(C)]
    struct Tagged {
        waiter: Waiter,
        tag: usize,
    }

    unsafe fn record(waiter: NonNull<Waiter>) {
        let tag = unsafe { waiter.cast::<Tagged>().as_ref().tag };
        NOTIFIED.with(|n| n.borrow_mut().push(tag));
    }

    fn tagged(tag: usize) -> Tagged {
        Tagged {
            waiter: Waiter::new(record),
            tag,
        }
    }

    #[test]
    fn first_then_queued_then_completed() {
        let list = WaitList::new();
        let a = pin!(tagged(1));
        let b = pin!(tagged(2));
        let c = pin!(tagged(3));

        unsafe {
            assert_matches!(list.register(NonNull::from(&*a).cast::<Waiter>()), Registration::First);
            assert_matches!(list.register(NonNull::from(&*b).cast::<Waiter>()), Registration::Queued);
            assert!(!list.is_complete());

            list.complete();
            assert!(list.is_complete());

            assert_matches!(list.register(NonNull::from(&*c).cast::<Waiter>()), Registration::Completed);
        }

        let notified = NOTIFIED.with(|n| n.take());
        assert_eq!(notified, [2, 1]);
    }

    #[test]
    fn complete_without_waiters() {
        let list = WaitList::new();
        unsafe { list.complete() };
        assert!(list.is_complete());
        assert!(NOTIFIED.with(|n| n.borrow().is_empty()));
    }
}
