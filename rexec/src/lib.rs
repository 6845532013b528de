//! A sender/receiver execution engine.
//!
//! Work is described lazily as a [`Sender`]: a value that, once connected to a
//! [`Receiver`], produces an [`OperationState`] which does nothing until it is
//! started. Senders compose through adaptors like [`then`], [`let_value`],
//! [`when_all()`] and [`split`], and move between execution contexts through
//! [`Scheduler`]s. [`sync_wait`] drives a composition to completion from a
//! plain thread.
//!
//! Values travel as tuples. A sender that completes with no values completes
//! with `()`, one that completes with a single value with `(T,)`. Adaptors
//! that take a function hand it the whole tuple, so closures usually
//! destructure it: `then(just((2, 3)), |(a, b)| (a + b,))`.
//!
//! There is no error or cancellation channel. Domain failures travel as
//! values, usually as a `Result` inside the tuple, and are never inspected by
//! the engine.

use std::io;
use std::pin::Pin;

use thiserror::Error;

mod bulk;
pub mod dynamic;
mod ensure_started;
mod erased;
mod ext;
mod just;
mod let_value;
mod on;
pub mod sched;
mod schedule_from;
mod split;
mod start_detached;
mod sync_wait;
mod then;
mod util;
pub mod values;
mod when_all;


pub use bulk::{bulk, Bulk, BulkOperation, BulkReceiver};
pub use ensure_started::{ensure_started, EnsureStarted, EnsureStartedOperation};
pub use erased::{AnyOperation, AnyReceiver, AnyScheduler, AnySender};
pub use ext::SenderExt;
pub use just::{just, Just, JustOperation};
pub use let_value::{let_value, LetValue, LetValueOperation};
pub use on::{on, On, OnOperation};
pub use sched::{
    InlineScheduler, RunLoop, RunLoopScheduler, SingleThreadContext, SingleThreadOptions,
    ThreadPool, ThreadPoolOptions, TimedScheduler, TimedSingleThreadContext,
};
pub use schedule_from::{schedule_from, transfer, ScheduleFrom, ScheduleFromOperation};
pub use split::{split, Split, SplitOperation};
pub use start_detached::start_detached;
pub use sync_wait::{sync_wait, sync_wait_with};
pub use then::{then, Then, ThenReceiver};
pub use when_all::{when_all, WhenAll, WhenAllOperation};

/// The consumer of a sender's completion.
///
/// `V` is the completion signature, a tuple of the completed values. A
/// receiver is consumed by its completion, so every operation completes its
/// receiver at most once.
pub trait Receiver<V>: Send + 'static {
    /// Delivers the values, consuming the receiver.
    fn set_value(self, values: V);
}

/// The state of a connected sender and receiver pair.
///
/// Operation states are pinned once they are started. Children of composed
/// operations hold raw pointers into their parents, so an operation state must
/// not move after `start` and must not be dropped before its receiver has been
/// completed. Operation states are `Send`: the thread completing a child may
/// be the one that continues with its parent's work.
pub trait OperationState: Send {
    /// Begins the work.
    ///
    /// The receiver may be completed before this returns, on this thread,
    /// or later on any other thread. Completing the receiver can free the
    /// operation state, so implementations must not touch `self` after a call
    /// that may complete it.
    ///
    /// # Safety
    ///
    /// The operation state must stay alive until its receiver has been
    /// completed, and must be started at most once.
    unsafe fn start(self: Pin<&mut Self>);
}

/// A lazy description of work that completes with `Self::Output`.
pub trait Sender: Send + Sized + 'static {
    /// The completion signature, the tuple of values this sender completes
    /// with.
    type Output: Send + 'static;

    /// The operation state produced by connecting to a receiver of type `R`.
    type Operation<R: Receiver<Self::Output>>: OperationState;

    /// Connects this sender to a receiver. This never starts any work.
    fn connect<R: Receiver<Self::Output>>(self, receiver: R) -> Self::Operation<R>;
}

/// A handle to an execution context.
///
/// Two schedulers compare equal if they schedule onto the same context.
pub trait Scheduler: Clone + PartialEq + Send + Sync + 'static {
    /// A sender that completes with no values on the scheduler's context.
    type Sender: Sender<Output = ()>;

    fn schedule(&self) -> Self::Sender;
}

/// Errors returned while building execution contexts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to spawn thread {name:?}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
    #[error("no scheduler named {0:?}")]
    UnknownScheduler(String),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Builds a [`WhenAll`] from a list of senders.
///
/// Up to six senders are joined directly. Longer lists nest the tail into an
/// inner `when_all`, which concatenates to the same values.
///
/// ```
/// use rexec::{just, sync_wait, when_all};
///
/// let values = sync_wait(when_all!(just((1,)), just(()), just((2, 3))));
/// assert_eq!(values, (1, 2, 3));
/// ```
#[macro_export]
macro_rules! when_all {
    ($s0:expr, $s1:expr, $s2:expr, $s3:expr, $s4:expr, $s5:expr, $($rest:expr),+ $(,)?) => {
        $crate::when_all(($s0, $s1, $s2, $s3, $s4, $crate::when_all!($s5, $($rest),+)))
    };
    ($($sender:expr),+ $(,)?) => {
        $crate::when_all(($($sender,)+))
    };
}
