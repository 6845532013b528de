use std::marker::PhantomData;

use crate::values::Values;
use crate::{Receiver, Sender};

/// A sender that transforms the values of another sender.
#[must_use = "senders do nothing unless connected and started"]
pub struct Then<S, F, U> {
    sender: S,
    func: F,
    _output: PhantomData<fn() -> U>,
}

/// Calls `func` with the values of `sender` and completes with its result.
///
/// `func` runs exactly once, synchronously, on whichever thread the
/// predecessor completed. It receives the completion tuple and returns the new
/// one, so returning `()` makes an empty completion. Returning anything but a
/// tuple is a compile error.
pub fn then<S, F, U>(sender: S, func: F) -> Then<S, F, U>
where
    S: Sender,
    F: FnOnce(S::Output) -> U + Send + 'static,
    U: Values,
{
    Then {
        sender,
        func,
        _output: PhantomData,
    }
}

impl<S, F, U> Sender for Then<S, F, U>
where
    S: Sender,
    F: FnOnce(S::Output) -> U + Send + 'static,
    U: Values,
{
    type Output = U;
    type Operation<R: Receiver<U>> = S::Operation<ThenReceiver<R, F, U>>;

    fn connect<R: Receiver<U>>(self, receiver: R) -> Self::Operation<R> {
        self.sender.connect(ThenReceiver {
            receiver,
            func: self.func,
            _output: PhantomData,
        })
    }
}

pub struct ThenReceiver<R, F, U> {
    receiver: R,
    func: F,
    _output: PhantomData<fn() -> U>,
}

impl<V, R, F, U> Receiver<V> for ThenReceiver<R, F, U>
where
    R: Receiver<U>,
    F: FnOnce(V) -> U + Send + 'static,
    U: 'static,
{
    fn set_value(self, values: V) {
        self.receiver.set_value((self.func)(values));
    }
}
