use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::pin::Pin;
use std::ptr::NonNull;

use pin_project::pin_project;

use crate::util::Anchor;
use crate::{OperationState, Receiver, Sender};

/// A sender that continues with a sender built from another sender's values.
#[must_use = "senders do nothing unless connected and started"]
pub struct LetValue<S, F, S2> {
    sender: S,
    func: F,
    _next: PhantomData<fn() -> S2>,
}

/// Stores the values of `sender` in the operation state, then calls `func`
/// with a mutable reference to them to build the sender to continue with.
///
/// The values live until the operation state is dropped. The built sender
/// completes the downstream receiver.
pub fn let_value<S, F, S2>(sender: S, func: F) -> LetValue<S, F, S2>
where
    S: Sender,
    F: FnOnce(&mut S::Output) -> S2 + Send + 'static,
    S2: Sender,
{
    LetValue {
        sender,
        func,
        _next: PhantomData,
    }
}

impl<S, F, S2> Sender for LetValue<S, F, S2>
where
    S: Sender,
    F: FnOnce(&mut S::Output) -> S2 + Send + 'static,
    S2: Sender,
{
    type Output = S2::Output;
    type Operation<R: Receiver<S2::Output>> =
        LetValueOperation<S::Operation<LetValueReceiver<S::Output, F, S2, R>>, LetState<S::Output, F, S2, R>>;

    fn connect<R: Receiver<S2::Output>>(self, receiver: R) -> Self::Operation<R> {
        let state = Anchor::new(LetState {
            func: UnsafeCell::new(Some(self.func)),
            receiver: UnsafeCell::new(Some(receiver)),
            values: UnsafeCell::new(None),
            next: UnsafeCell::new(None),
        });
        let first = self.sender.connect(LetValueReceiver {
            state: state.as_ptr(),
        });
        LetValueOperation { first, state }
    }
}

/// The part of a [`LetValueOperation`] its first child points at.
pub struct LetState<V, F, S2: Sender, R: Receiver<S2::Output>> {
    func: UnsafeCell<Option<F>>,
    receiver: UnsafeCell<Option<R>>,
    values: UnsafeCell<Option<V>>,
    next: UnsafeCell<Option<S2::Operation<R>>>,
}

#[pin_project]
pub struct LetValueOperation<Op, St> {
    #[pin]
    first: Op,
    state: Anchor<St>,
}

impl<Op: OperationState, St: Send> OperationState for LetValueOperation<Op, St> {
    unsafe fn start(self: Pin<&mut Self>) {
        unsafe { self.project().first.start() }
    }
}

pub struct LetValueReceiver<V, F, S2: Sender, R: Receiver<S2::Output>> {
    state: NonNull<LetState<V, F, S2, R>>,
}

unsafe impl<V: Send, F: Send, S2: Sender, R: Receiver<S2::Output>> Send for LetValueReceiver<V, F, S2, R> {}

impl<V, F, S2, R> Receiver<V> for LetValueReceiver<V, F, S2, R>
where
    V: Send + 'static,
    F: FnOnce(&mut V) -> S2 + Send + 'static,
    S2: Sender,
    R: Receiver<S2::Output>,
{
    fn set_value(self, values: V) {
        // SAFETY: the anchor outlives the first operation, and each cell is
        // only touched by this one completion.
        unsafe {
            let state = self.state.as_ref();
            let func = (*state.func.get()).take().expect("let_value completed twice");
            let receiver = (*state.receiver.get())
                .take()
                .expect("let_value receiver missing");
            let values = (*state.values.get()).insert(values);
            let next = func(values).connect(receiver);
            let next = (*state.next.get()).insert(next);
            Pin::new_unchecked(next).start();
        }
    }
}
