use std::cell::UnsafeCell;
use std::pin::Pin;
use std::ptr::{addr_of, NonNull};

use pin_project::pin_project;

use crate::util::Anchor;
use crate::{OperationState, Receiver, Scheduler, Sender};

/// A sender that moves another sender's completion onto a scheduler.
#[must_use = "senders do nothing unless connected and started"]
pub struct ScheduleFrom<Sch, S> {
    scheduler: Sch,
    sender: S,
}

/// Starts `sender` on the current context, then completes with its values on
/// `scheduler`'s context.
pub fn schedule_from<Sch: Scheduler, S: Sender>(scheduler: Sch, sender: S) -> ScheduleFrom<Sch, S> {
    ScheduleFrom { scheduler, sender }
}

/// [`schedule_from`] with the arguments in pipeline order.
pub fn transfer<S: Sender, Sch: Scheduler>(sender: S, scheduler: Sch) -> ScheduleFrom<Sch, S> {
    schedule_from(scheduler, sender)
}

/// The values waiting for the hop and the receiver they go to.
pub struct Stored<V, R> {
    values: UnsafeCell<Option<V>>,
    receiver: UnsafeCell<Option<R>>,
}

/// The anchored part of a [`ScheduleFromOperation`]: the stored values and the
/// already connected schedule operation.
pub struct Hop<V, R, Op> {
    stored: Stored<V, R>,
    schedule: UnsafeCell<Option<Op>>,
}

type HopOf<Sch, V, R> = Hop<V, R, <<Sch as Scheduler>::Sender as Sender>::Operation<ForwardReceiver<V, R>>>;

impl<Sch: Scheduler, S: Sender> Sender for ScheduleFrom<Sch, S> {
    type Output = S::Output;
    type Operation<R: Receiver<S::Output>> = ScheduleFromOperation<
        S::Operation<StoreReceiver<HopOf<Sch, S::Output, R>>>,
        HopOf<Sch, S::Output, R>,
    >;

    fn connect<R: Receiver<S::Output>>(self, receiver: R) -> Self::Operation<R> {
        let hop = Anchor::new(Hop {
            stored: Stored {
                values: UnsafeCell::new(None),
                receiver: UnsafeCell::new(Some(receiver)),
            },
            schedule: UnsafeCell::new(None),
        });

        // SAFETY: nothing else can reach the anchor yet.
        unsafe {
            let hop = hop.as_ptr().as_ptr();
            let stored = NonNull::new_unchecked(addr_of!((*hop).stored).cast_mut());
            let schedule = self.scheduler.schedule().connect(ForwardReceiver { stored });
            *(*hop).schedule.get() = Some(schedule);
        }

        let first = self.sender.connect(StoreReceiver { hop: hop.as_ptr() });
        ScheduleFromOperation { first, hop }
    }
}

#[pin_project]
pub struct ScheduleFromOperation<Op, H> {
    #[pin]
    first: Op,
    hop: Anchor<H>,
}

impl<Op: OperationState, H: Send> OperationState for ScheduleFromOperation<Op, H> {
    unsafe fn start(self: Pin<&mut Self>) {
        unsafe { self.project().first.start() }
    }
}

/// Stores the first sender's values and starts the hop.
pub struct StoreReceiver<H> {
    hop: NonNull<H>,
}

unsafe impl<H: Send> Send for StoreReceiver<H> {}

impl<V, R, Op> Receiver<V> for StoreReceiver<Hop<V, R, Op>>
where
    V: Send + 'static,
    R: Receiver<V>,
    Op: OperationState + 'static,
{
    fn set_value(self, values: V) {
        // SAFETY: the anchor outlives both operations and the schedule
        // operation was connected in place and never moved.
        unsafe {
            let hop = self.hop.as_ref();
            *hop.stored.values.get() = Some(values);
            let schedule = (*hop.schedule.get())
                .as_mut()
                .expect("schedule operation missing");
            Pin::new_unchecked(schedule).start();
        }
    }
}

/// Forwards the stored values from the scheduler's context.
pub struct ForwardReceiver<V, R> {
    stored: NonNull<Stored<V, R>>,
}

unsafe impl<V: Send, R: Send> Send for ForwardReceiver<V, R> {}

impl<V: Send + 'static, R: Receiver<V>> Receiver<()> for ForwardReceiver<V, R> {
    fn set_value(self, (): ()) {
        let (values, receiver) = unsafe {
            let stored = self.stored.as_ref();
            let values = (*stored.values.get()).take().expect("hop has no values");
            let receiver = (*stored.receiver.get()).take().expect("hop has no receiver");
            (values, receiver)
        };
        receiver.set_value(values);
    }
}
