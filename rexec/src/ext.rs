use crate::bulk::{bulk, Bulk};
use crate::dynamic::expand;
use crate::ensure_started::{ensure_started, EnsureStarted};
use crate::let_value::{let_value, LetValue};
use crate::schedule_from::{transfer, ScheduleFrom};
use crate::split::{split, Split};
use crate::start_detached::start_detached;
use crate::sync_wait::sync_wait;
use crate::then::{then, Then};
use crate::values::Values;
use crate::{AnySender, Scheduler, Sender};

/// Postfix forms of the sender adaptors.
///
/// ```
/// use rexec::{just, SenderExt};
///
/// let (sum,) = just((2, 3)).then(|(a, b)| (a + b,)).sync_wait();
/// assert_eq!(sum, 5);
/// ```
pub trait SenderExt: Sender {
    fn then<F, U>(self, func: F) -> Then<Self, F, U>
    where
        F: FnOnce(Self::Output) -> U + Send + 'static,
        U: Values,
    {
        then(self, func)
    }

    fn let_value<F, S2>(self, func: F) -> LetValue<Self, F, S2>
    where
        F: FnOnce(&mut Self::Output) -> S2 + Send + 'static,
        S2: Sender,
    {
        let_value(self, func)
    }

    fn bulk<F>(self, shape: usize, func: F) -> Bulk<Self, F>
    where
        F: FnMut(usize, &mut Self::Output) + Send + 'static,
    {
        bulk(self, shape, func)
    }

    fn transfer<Sch: Scheduler>(self, scheduler: Sch) -> ScheduleFrom<Sch, Self> {
        transfer(self, scheduler)
    }

    fn split(self) -> Split<Self>
    where
        Self::Output: Clone + Sync,
    {
        split(self)
    }

    fn ensure_started(self) -> EnsureStarted<Self> {
        ensure_started(self)
    }

    fn expand<T>(self) -> Then<Self, fn((T,)) -> T, T>
    where
        Self: Sender<Output = (T,)>,
        T: Values,
    {
        expand(self)
    }

    fn boxed(self) -> AnySender<Self::Output> {
        AnySender::new(self)
    }

    fn sync_wait(self) -> Self::Output {
        sync_wait(self)
    }

    fn start_detached(self) {
        start_detached(self)
    }
}

impl<S: Sender> SenderExt for S {}
