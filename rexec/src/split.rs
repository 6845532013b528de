use std::cell::UnsafeCell;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use crate::util::wait_list::{Registration, WaitList, Waiter};
use crate::{OperationState, Receiver, Sender};

/// A multicast sender. Every connected consumer receives a clone of the
/// values of one shared run of the wrapped sender.
#[must_use = "senders do nothing unless connected and started"]
pub struct Split<S: Sender> {
    state: Arc<SplitState<S>>,
}

/// Shares `sender` between any number of consumers.
///
/// The wrapped sender is started by the first consumer that starts. Consumers
/// starting after it completed complete immediately with a clone of the
/// stored values.
pub fn split<S: Sender>(sender: S) -> Split<S>
where
    S::Output: Clone + Sync,
{
    let state = Arc::new_cyclic(|weak: &Weak<SplitState<S>>| {
        // SAFETY: the pointer of a cyclic `Arc` under construction is the
        // final, non-null address of the state.
        let receiver = SplitReceiver {
            state: unsafe { NonNull::new_unchecked(weak.as_ptr().cast_mut()) },
        };
        SplitState {
            waiters: WaitList::new(),
            values: UnsafeCell::new(None),
            source: UnsafeCell::new(sender.connect(receiver)),
        }
    });
    Split { state }
}

impl<S: Sender> Clone for Split<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S: Sender> fmt::Debug for Split<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Split")
            .field("complete", &self.state.waiters.is_complete())
            .field("handles", &Arc::strong_count(&self.state))
            .finish()
    }
}

struct SplitState<S: Sender> {
    waiters: WaitList,
    values: UnsafeCell<Option<S::Output>>,
    source: UnsafeCell<S::Operation<SplitReceiver<S>>>,
}

// The source operation is only touched by the first consumer, the values are
// written once before the list completes and only read after that.
unsafe impl<S: Sender> Send for SplitState<S> {}
unsafe impl<S: Sender> Sync for SplitState<S> where S::Output: Sync {}

struct SplitReceiver<S: Sender> {
    state: NonNull<SplitState<S>>,
}

unsafe impl<S: Sender> Send for SplitReceiver<S> {}

impl<S: Sender> Receiver<S::Output> for SplitReceiver<S> {
    fn set_value(self, values: S::Output) {
        // Notified consumers may drop their references, keep the state alive
        // while walking the list.
        let state = unsafe {
            Arc::increment_strong_count(self.state.as_ptr());
            Arc::from_raw(self.state.as_ptr())
        };
        unsafe {
            *state.values.get() = Some(values);
            state.waiters.complete();
        }
    }
}

impl<S: Sender> Sender for Split<S>
where
    S::Output: Clone + Sync,
{
    type Output = S::Output;
    type Operation<R: Receiver<S::Output>> = SplitOperation<S, R>;

    fn connect<R: Receiver<S::Output>>(self, receiver: R) -> SplitOperation<S, R> {
        SplitOperation {
            waiter: Waiter::new(SplitOperation::<S, R>::notify),
            receiver: UnsafeCell::new(Some(receiver)),
            state: self.state,
            started: false,
        }
    }
}

#[repr(C)]
pub struct SplitOperation<S: Sender, R> {
    waiter: Waiter,
    receiver: UnsafeCell<Option<R>>,
    state: Arc<SplitState<S>>,
    started: bool,
}

unsafe impl<S: Sender, R: Send> Send for SplitOperation<S, R> {}

impl<S: Sender, R: Receiver<S::Output>> SplitOperation<S, R>
where
    S::Output: Clone + Sync,
{
    unsafe fn notify(waiter: NonNull<Waiter>) {
        let this = waiter.cast::<Self>().as_ptr();
        let (values, receiver) = unsafe {
            let state = Arc::clone(&(*this).state);
            let values = (*state.values.get())
                .clone()
                .expect("split completed without values");
            let receiver = (*(*this).receiver.get()).take().expect("split receiver missing");
            (values, receiver)
        };
        receiver.set_value(values);
    }
}

impl<S: Sender, R: Receiver<S::Output>> OperationState for SplitOperation<S, R>
where
    S::Output: Clone + Sync,
{
    unsafe fn start(self: Pin<&mut Self>) {
        let this = unsafe { self.get_unchecked_mut() };
        assert!(!mem::replace(&mut this.started, true), "operation started twice");

        // Held until the end, notifying this operation may drop its own
        // reference.
        let state = this.state.clone();
        let waiter = NonNull::from(this).cast::<Waiter>();

        // SAFETY: the operation is pinned and registered once.
        match unsafe { state.waiters.register(waiter) } {
            Registration::Completed => unsafe { Self::notify(waiter) },
            Registration::First => unsafe { Pin::new_unchecked(&mut *state.source.get()).start() },
            Registration::Queued => {}
        }
    }
}
