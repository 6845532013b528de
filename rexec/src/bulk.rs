use crate::{Receiver, Sender};

/// A sender that runs a function over an index space before forwarding the
/// values of another sender.
#[must_use = "senders do nothing unless connected and started"]
pub struct Bulk<S, F> {
    sender: S,
    shape: usize,
    func: F,
}

/// Calls `func(i, &mut values)` for every `i` in `0..shape`, in order, then
/// completes with the (possibly modified) values.
///
/// Iterations run sequentially on the thread the predecessor completed on.
pub fn bulk<S, F>(sender: S, shape: usize, func: F) -> Bulk<S, F>
where
    S: Sender,
    F: FnMut(usize, &mut S::Output) + Send + 'static,
{
    Bulk {
        sender,
        shape,
        func,
    }
}

impl<S, F> Sender for Bulk<S, F>
where
    S: Sender,
    F: FnMut(usize, &mut S::Output) + Send + 'static,
{
    type Output = S::Output;
    type Operation<R: Receiver<S::Output>> = BulkOperation<S, F, R>;

    fn connect<R: Receiver<S::Output>>(self, receiver: R) -> BulkOperation<S, F, R> {
        self.sender.connect(BulkReceiver {
            receiver,
            shape: self.shape,
            func: self.func,
        })
    }
}

pub type BulkOperation<S, F, R> = <S as Sender>::Operation<BulkReceiver<R, F>>;

pub struct BulkReceiver<R, F> {
    receiver: R,
    shape: usize,
    func: F,
}

impl<V, R, F> Receiver<V> for BulkReceiver<R, F>
where
    R: Receiver<V>,
    F: FnMut(usize, &mut V) + Send + 'static,
{
    fn set_value(mut self, mut values: V) {
        for i in 0..self.shape {
            (self.func)(i, &mut values);
        }
        self.receiver.set_value(values);
    }
}
