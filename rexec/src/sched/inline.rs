use crate::just::{just, Just};
use crate::Scheduler;

/// A scheduler that runs work immediately on the thread that starts it.
///
/// All inline schedulers compare equal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    type Sender = Just<()>;

    #[inline]
    fn schedule(&self) -> Just<()> {
        just(())
    }
}
