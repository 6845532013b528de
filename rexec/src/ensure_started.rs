use std::cell::UnsafeCell;
use std::fmt;
use std::mem;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::util::wait_list::{Registration, WaitList, Waiter};
use crate::{OperationState, Receiver, Sender};

/// A sender whose work was started eagerly.
#[must_use = "the work is already running, connect to this to observe its values"]
pub struct EnsureStarted<S: Sender> {
    state: Arc<EagerState<S>>,
}

/// Connects and starts `sender` right away, before returning.
///
/// The returned sender completes with the values once they're available. It
/// has at most one consumer, since connecting consumes it. If it's dropped
/// without being connected, the values are dropped when the work completes.
pub fn ensure_started<S: Sender>(sender: S) -> EnsureStarted<S> {
    let state = Arc::new(EagerState {
        waiters: WaitList::new(),
        values: UnsafeCell::new(None),
        source: UnsafeCell::new(None),
    });
    let source = sender.connect(EagerReceiver {
        state: state.clone(),
    });

    // SAFETY: the source isn't started yet, so nothing else reads the cell.
    // The receiver keeps the state, and with it the source, alive until it
    // completes.
    unsafe {
        let source = (*state.source.get()).insert(source);
        Pin::new_unchecked(source).start();
    }

    EnsureStarted { state }
}

impl<S: Sender> fmt::Debug for EnsureStarted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnsureStarted")
            .field("complete", &self.state.waiters.is_complete())
            .finish()
    }
}

struct EagerState<S: Sender> {
    waiters: WaitList,
    values: UnsafeCell<Option<S::Output>>,
    source: UnsafeCell<Option<S::Operation<EagerReceiver<S>>>>,
}

unsafe impl<S: Sender> Send for EagerState<S> {}
unsafe impl<S: Sender> Sync for EagerState<S> {}

struct EagerReceiver<S: Sender> {
    state: Arc<EagerState<S>>,
}

impl<S: Sender> Receiver<S::Output> for EagerReceiver<S> {
    fn set_value(self, values: S::Output) {
        // `self.state` keeps the state alive until after the consumer was
        // notified.
        unsafe {
            *self.state.values.get() = Some(values);
            self.state.waiters.complete();
        }
    }
}

impl<S: Sender> Sender for EnsureStarted<S> {
    type Output = S::Output;
    type Operation<R: Receiver<S::Output>> = EnsureStartedOperation<S, R>;

    fn connect<R: Receiver<S::Output>>(self, receiver: R) -> EnsureStartedOperation<S, R> {
        EnsureStartedOperation {
            waiter: Waiter::new(EnsureStartedOperation::<S, R>::notify),
            receiver: UnsafeCell::new(Some(receiver)),
            state: self.state,
            started: false,
        }
    }
}

#[repr(C)]
pub struct EnsureStartedOperation<S: Sender, R> {
    waiter: Waiter,
    receiver: UnsafeCell<Option<R>>,
    state: Arc<EagerState<S>>,
    started: bool,
}

unsafe impl<S: Sender, R: Send> Send for EnsureStartedOperation<S, R> {}

impl<S: Sender, R: Receiver<S::Output>> EnsureStartedOperation<S, R> {
    unsafe fn notify(waiter: NonNull<Waiter>) {
        let this = waiter.cast::<Self>().as_ptr();
        let (values, receiver) = unsafe {
            let state = Arc::clone(&(*this).state);
            let values = (*state.values.get())
                .take()
                .expect("ensure_started completed without values");
            let receiver = (*(*this).receiver.get())
                .take()
                .expect("ensure_started receiver missing");
            (values, receiver)
        };
        receiver.set_value(values);
    }
}

impl<S: Sender, R: Receiver<S::Output>> OperationState for EnsureStartedOperation<S, R> {
    unsafe fn start(self: Pin<&mut Self>) {
        let this = unsafe { self.get_unchecked_mut() };
        assert!(!mem::replace(&mut this.started, true), "operation started twice");

        let state = this.state.clone();
        let waiter = NonNull::from(this).cast::<Waiter>();

        // SAFETY: the operation is pinned and is the only one ever registered.
        // The work was started by `ensure_started`, so registering first just
        // waits for it.
        match unsafe { state.waiters.register(waiter) } {
            Registration::Completed => unsafe { Self::notify(waiter) },
            Registration::First => {}
            Registration::Queued => unreachable!("ensure_started has a single consumer"),
        }
    }
}
