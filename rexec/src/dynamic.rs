//! Dynamically typed values for graph-style code.
//!
//! Statically typed compositions carry their values as tuples. Code that
//! builds pipelines at runtime instead passes a single [`Value`] between
//! stages, through type-erased [`ValueSender`]s.

use crate::just::just;
use crate::then::{then, Then};
use crate::values::Values;
use crate::{AnySender, Sender};

pub use serde_json::Value;

/// A type-erased sender completing with one dynamic value.
pub type ValueSender = AnySender<(Value,)>;

/// A [`ValueSender`] completing with `value`.
pub fn value_sender(value: impl Into<Value>) -> ValueSender {
    AnySender::new(just((value.into(),)))
}

/// Maps the value of a [`ValueSender`].
pub fn map_value<F>(sender: ValueSender, func: F) -> ValueSender
where
    F: FnOnce(Value) -> Value + Send + 'static,
{
    AnySender::new(then(sender, move |(value,)| (func(value),)))
}

fn unwrap_one<T>((values,): (T,)) -> T {
    values
}

/// Turns a sender completing with a single tuple into one completing with
/// that tuple's elements.
///
/// ```
/// use rexec::dynamic::expand;
/// use rexec::{just, sync_wait};
///
/// assert_eq!(sync_wait(expand(just(((1, "a"),)))), (1, "a"));
/// ```
pub fn expand<S, T>(sender: S) -> Then<S, fn((T,)) -> T, T>
where
    S: Sender<Output = (T,)>,
    T: Values,
{
    then(sender, unwrap_one::<T> as fn((T,)) -> T)
}
