use std::cell::UnsafeCell;
use std::pin::pin;
use std::ptr::NonNull;

use crate::sched::{RunLoop, RunLoopScheduler};
use crate::{OperationState, Receiver, Sender};

struct SyncWaitReceiver<V> {
    slot: NonNull<UnsafeCell<Option<V>>>,
    run_loop: RunLoop,
}

unsafe impl<V: Send> Send for SyncWaitReceiver<V> {}

impl<V: Send + 'static> Receiver<V> for SyncWaitReceiver<V> {
    fn set_value(self, values: V) {
        // SAFETY: the slot lives on the waiting thread's stack until its run
        // loop finishes, which happens below.
        unsafe { *self.slot.as_ref().get() = Some(values) };
        self.run_loop.finish();
    }
}

/// Blocks the current thread until `sender` completes and returns its values.
///
/// While waiting, the thread drives a private run loop. Use
/// [`sync_wait_with`] to schedule work onto that loop.
pub fn sync_wait<S: Sender>(sender: S) -> S::Output {
    sync_wait_with(|_| sender)
}

/// Like [`sync_wait`], with the sender built from a scheduler for the waiting
/// thread's run loop.
///
/// ```
/// use rexec::{sync_wait_with, then, Scheduler};
///
/// let caller = std::thread::current().id();
/// let (id,) = sync_wait_with(|scheduler| {
///     then(scheduler.schedule(), |()| (std::thread::current().id(),))
/// });
/// assert_eq!(id, caller);
/// ```
pub fn sync_wait_with<S, F>(make: F) -> S::Output
where
    S: Sender,
    F: FnOnce(RunLoopScheduler) -> S,
{
    let run_loop = RunLoop::new();
    let slot = UnsafeCell::new(None);
    let receiver = SyncWaitReceiver {
        slot: NonNull::from(&slot),
        run_loop: run_loop.clone(),
    };

    let mut op = pin!(make(run_loop.scheduler()).connect(receiver));
    // SAFETY: `op` lives on this stack frame until the loop finished, and the
    // loop only finishes when the receiver completed.
    unsafe { op.as_mut().start() };
    run_loop.run();

    slot.into_inner().expect("sync_wait finished without a value")
}
