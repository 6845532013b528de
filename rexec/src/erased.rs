//! Type erasure for senders, receivers and schedulers.
//!
//! Everything in the engine is generic. These types box the generic pieces
//! behind trait objects for places where the concrete types can't be named,
//! like graph nodes built at runtime or the C interface.

use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use crate::{OperationState, Receiver, Scheduler, Sender};

trait ErasedReceiver<V>: Send {
    fn set_value_boxed(self: Box<Self>, values: V);
}

impl<V, R: Receiver<V>> ErasedReceiver<V> for R {
    fn set_value_boxed(self: Box<Self>, values: V) {
        (*self).set_value(values)
    }
}

/// A boxed receiver of `V`.
pub struct AnyReceiver<V> {
    inner: Box<dyn ErasedReceiver<V>>,
}

impl<V: 'static> AnyReceiver<V> {
    pub fn new<R: Receiver<V>>(receiver: R) -> Self {
        Self {
            inner: Box::new(receiver),
        }
    }
}

impl<V: 'static> Receiver<V> for AnyReceiver<V> {
    fn set_value(self, values: V) {
        self.inner.set_value_boxed(values)
    }
}

trait ErasedSender<V>: Send {
    fn connect_boxed(self: Box<Self>, receiver: AnyReceiver<V>) -> Pin<Box<dyn OperationState>>;
}

impl<S: Sender> ErasedSender<S::Output> for S {
    fn connect_boxed(self: Box<Self>, receiver: AnyReceiver<S::Output>) -> Pin<Box<dyn OperationState>> {
        Box::pin((*self).connect(receiver))
    }
}

/// A boxed sender completing with `V`.
///
/// Connecting allocates the erased operation state on the heap.
#[must_use = "senders do nothing unless connected and started"]
pub struct AnySender<V> {
    inner: Box<dyn ErasedSender<V>>,
}

impl<V: Send + 'static> AnySender<V> {
    pub fn new<S: Sender<Output = V>>(sender: S) -> Self {
        Self {
            inner: Box::new(sender),
        }
    }
}

impl<V> fmt::Debug for AnySender<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySender").finish_non_exhaustive()
    }
}

impl<V: Send + 'static> Sender for AnySender<V> {
    type Output = V;
    type Operation<R: Receiver<V>> = AnyOperation;

    fn connect<R: Receiver<V>>(self, receiver: R) -> AnyOperation {
        AnyOperation {
            op: self.inner.connect_boxed(AnyReceiver::new(receiver)),
        }
    }
}

pub struct AnyOperation {
    op: Pin<Box<dyn OperationState>>,
}

impl OperationState for AnyOperation {
    unsafe fn start(self: Pin<&mut Self>) {
        unsafe { self.get_mut().op.as_mut().start() }
    }
}

trait ErasedScheduler: Send + Sync {
    fn schedule_boxed(&self) -> AnySender<()>;

    fn as_any(&self) -> &dyn Any;

    fn eq_any(&self, other: &dyn Any) -> bool;
}

impl<S: Scheduler> ErasedScheduler for S {
    fn schedule_boxed(&self) -> AnySender<()> {
        AnySender::new(self.schedule())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_any(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<S>().is_some_and(|other| other == self)
    }
}

/// A shared, type-erased scheduler.
///
/// Two erased schedulers are equal if they wrap the same scheduler type and
/// the wrapped schedulers are equal.
#[derive(Clone)]
pub struct AnyScheduler {
    inner: Arc<dyn ErasedScheduler>,
}

impl AnyScheduler {
    pub fn new<S: Scheduler>(scheduler: S) -> Self {
        // Don't wrap an erased scheduler twice.
        if let Some(erased) = (&scheduler as &dyn Any).downcast_ref::<AnyScheduler>() {
            return erased.clone();
        }
        Self {
            inner: Arc::new(scheduler),
        }
    }
}

impl PartialEq for AnyScheduler {
    fn eq(&self, other: &Self) -> bool {
        self.inner.eq_any(other.inner.as_any())
    }
}

impl fmt::Debug for AnyScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyScheduler")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

impl Scheduler for AnyScheduler {
    type Sender = AnySender<()>;

    fn schedule(&self) -> AnySender<()> {
        self.inner.schedule_boxed()
    }
}
