use std::pin::Pin;

use crate::values::Values;
use crate::{OperationState, Receiver, Sender};

/// A sender that completes immediately with the given values.
#[derive(Debug, Clone)]
#[must_use = "senders do nothing unless connected and started"]
pub struct Just<V> {
    values: V,
}

/// Creates a sender completing with `values` as soon as it's started.
///
/// `values` is the completion tuple, so `just(())` completes with nothing and
/// `just((1, "a"))` with two values.
pub fn just<V: Values>(values: V) -> Just<V> {
    Just { values }
}

impl<V: Values> Sender for Just<V> {
    type Output = V;
    type Operation<R: Receiver<V>> = JustOperation<V, R>;

    fn connect<R: Receiver<V>>(self, receiver: R) -> JustOperation<V, R> {
        JustOperation {
            inner: Some((self.values, receiver)),
        }
    }
}

pub struct JustOperation<V, R> {
    inner: Option<(V, R)>,
}

impl<V: Send, R: Receiver<V>> OperationState for JustOperation<V, R> {
    unsafe fn start(self: Pin<&mut Self>) {
        let this = unsafe { self.get_unchecked_mut() };
        let (values, receiver) = this.inner.take().expect("operation started twice");
        receiver.set_value(values);
    }
}
