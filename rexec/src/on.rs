use std::cell::UnsafeCell;
use std::pin::Pin;
use std::ptr::NonNull;

use pin_project::pin_project;

use crate::util::Anchor;
use crate::{OperationState, Receiver, Scheduler, Sender};

/// A sender that starts another sender on a scheduler's context.
#[must_use = "senders do nothing unless connected and started"]
pub struct On<Sch, S> {
    scheduler: Sch,
    sender: S,
}

/// Hops to `scheduler` first, then connects and starts `sender` there.
pub fn on<Sch: Scheduler, S: Sender>(scheduler: Sch, sender: S) -> On<Sch, S> {
    On { scheduler, sender }
}

impl<Sch: Scheduler, S: Sender> Sender for On<Sch, S> {
    type Output = S::Output;
    type Operation<R: Receiver<S::Output>> =
        OnOperation<<Sch::Sender as Sender>::Operation<OnReceiver<S, R>>, OnState<S, R>>;

    fn connect<R: Receiver<S::Output>>(self, receiver: R) -> Self::Operation<R> {
        let state = Anchor::new(OnState {
            sender: UnsafeCell::new(Some(self.sender)),
            receiver: UnsafeCell::new(Some(receiver)),
            inner: UnsafeCell::new(None),
        });
        let schedule = self.scheduler.schedule().connect(OnReceiver {
            state: state.as_ptr(),
        });
        OnOperation { schedule, state }
    }
}

/// What [`On`] starts once it reached the scheduler.
pub struct OnState<S: Sender, R: Receiver<S::Output>> {
    sender: UnsafeCell<Option<S>>,
    receiver: UnsafeCell<Option<R>>,
    inner: UnsafeCell<Option<S::Operation<R>>>,
}

#[pin_project]
pub struct OnOperation<Op, St> {
    #[pin]
    schedule: Op,
    state: Anchor<St>,
}

impl<Op: OperationState, St: Send> OperationState for OnOperation<Op, St> {
    unsafe fn start(self: Pin<&mut Self>) {
        unsafe { self.project().schedule.start() }
    }
}

pub struct OnReceiver<S: Sender, R: Receiver<S::Output>> {
    state: NonNull<OnState<S, R>>,
}

unsafe impl<S: Sender, R: Receiver<S::Output>> Send for OnReceiver<S, R> {}

impl<S: Sender, R: Receiver<S::Output>> Receiver<()> for OnReceiver<S, R> {
    fn set_value(self, (): ()) {
        // SAFETY: the anchor outlives the schedule operation, which completes
        // once.
        unsafe {
            let state = self.state.as_ref();
            let sender = (*state.sender.get()).take().expect("on completed twice");
            let receiver = (*state.receiver.get()).take().expect("on receiver missing");
            let inner = (*state.inner.get()).insert(sender.connect(receiver));
            Pin::new_unchecked(inner).start();
        }
    }
}
