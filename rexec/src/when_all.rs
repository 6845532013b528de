use std::cell::UnsafeCell;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::AcqRel;

use pin_project::pin_project;

use crate::util::Anchor;
use crate::values::ConcatAll;
use crate::{OperationState, Receiver, Sender};

/// A sender that completes once every one of its children completed.
#[must_use = "senders do nothing unless connected and started"]
pub struct WhenAll<T> {
    senders: T,
}

/// Joins a tuple of one to six senders.
///
/// The aggregate completes with the concatenation of the children's values in
/// the order the children were given, independent of the order they complete
/// in. It completes on the thread of whichever child completed last. If any
/// child never completes, neither does the aggregate.
///
/// Use the [`when_all!`](crate::when_all!) macro for longer lists.
pub fn when_all<T>(senders: T) -> WhenAll<T>
where
    WhenAll<T>: Sender,
{
    WhenAll { senders }
}

/// One value slot per child.
type Slot<V> = UnsafeCell<Option<V>>;

/// The state shared by every child of a [`WhenAllOperation`].
pub struct WhenAllState<R, Slots> {
    remaining: AtomicUsize,
    receiver: UnsafeCell<Option<R>>,
    slots: Slots,
}

impl<R, Slots: Default> WhenAllState<R, Slots> {
    fn new(count: usize, receiver: R) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            receiver: UnsafeCell::new(Some(receiver)),
            slots: Slots::default(),
        }
    }
}

/// Stores the values of child `I`, completing the aggregate after the last one.
#[doc(hidden)]
pub trait Arrive<const I: usize, V> {
    /// # Safety
    ///
    /// `this` must point to a live state and child `I` must arrive only once.
    unsafe fn arrive(this: NonNull<Self>, values: V);
}

/// The receiver connected to child `I`.
pub struct WhenAllReceiver<St, const I: usize> {
    state: NonNull<St>,
}

unsafe impl<St: Send, const I: usize> Send for WhenAllReceiver<St, I> {}

impl<V, St, const I: usize> Receiver<V> for WhenAllReceiver<St, I>
where
    St: Arrive<I, V> + Send + 'static,
{
    fn set_value(self, values: V) {
        unsafe { St::arrive(self.state, values) }
    }
}

#[pin_project]
pub struct WhenAllOperation<Ops, St> {
    #[pin]
    ops: Ops,
    state: Anchor<St>,
}

macro_rules! when_all_arrive {
    ([$($all:ident),+]; $v:ident $i:tt) => {
        impl<R, $($all),+> Arrive<$i, $v> for WhenAllState<R, ($(Slot<$all>,)+)>
        where
            ($($all,)+): ConcatAll,
            R: Receiver<<($($all,)+) as ConcatAll>::Output>,
        {
            unsafe fn arrive(this: NonNull<Self>, values: $v) {
                let last = unsafe {
                    let state = this.as_ref();
                    *state.slots.$i.get() = Some(values);
                    state.remaining.fetch_sub(1, AcqRel) == 1
                };
                if last {
                    unsafe { Self::complete(this) }
                }
            }
        }
    };
}

/// The state type for a list of child senders.
macro_rules! state_of {
    ($r:ident; [$($s:ident),+]) => {
        WhenAllState<$r, ($(Slot<<$s as Sender>::Output>,)+)>
    };
}

macro_rules! when_all_impl {
    ($count:literal; $senders:tt; $all:tt; $($s:ident $v:ident $o:ident $i:tt),+) => {
        impl<$($s: Sender),+> Sender for WhenAll<($($s,)+)>
        where
            ($($s::Output,)+): ConcatAll,
            <($($s::Output,)+) as ConcatAll>::Output: Send + 'static,
        {
            type Output = <($($s::Output,)+) as ConcatAll>::Output;
            type Operation<R: Receiver<Self::Output>> = WhenAllOperation<
                ($($s::Operation<WhenAllReceiver<state_of!(R; $senders), $i>>,)+),
                state_of!(R; $senders),
            >;

            #[allow(non_snake_case)]
            fn connect<R: Receiver<Self::Output>>(self, receiver: R) -> Self::Operation<R> {
                let state = Anchor::new(WhenAllState::new($count, receiver));
                let ($($o,)+) = self.senders;
                let ops = ($($o.connect(WhenAllReceiver::<_, $i> { state: state.as_ptr() }),)+);
                WhenAllOperation { ops, state }
            }
        }

        impl<R, $($v),+> WhenAllState<R, ($(Slot<$v>,)+)>
        where
            ($($v,)+): ConcatAll,
            R: Receiver<<($($v,)+) as ConcatAll>::Output>,
        {
            /// # Safety
            ///
            /// Every child must have arrived.
            unsafe fn complete(this: NonNull<Self>) {
                let (values, receiver) = unsafe {
                    let state = this.as_ref();
                    let values = ($(
                        (*state.slots.$i.get()).take().expect("when_all slot empty"),
                    )+);
                    let receiver = (*state.receiver.get())
                        .take()
                        .expect("when_all receiver missing");
                    (values, receiver)
                };
                receiver.set_value(values.concat_all());
            }
        }

        $(when_all_arrive!($all; $v $i);)+

        impl<$($o: OperationState),+, St: Send> OperationState for WhenAllOperation<($($o,)+), St> {
            unsafe fn start(self: Pin<&mut Self>) {
                // The last start can complete the aggregate and free `self`.
                let ops: *mut ($($o,)+) = unsafe { self.project().ops.get_unchecked_mut() };
                $(unsafe { Pin::new_unchecked(&mut (*ops).$i).start() };)+
            }
        }
    };
}

when_all_impl!(1; [S0]; [V0]; S0 V0 O0 0);
when_all_impl!(2; [S0, S1]; [V0, V1]; S0 V0 O0 0, S1 V1 O1 1);
when_all_impl!(3; [S0, S1, S2]; [V0, V1, V2]; S0 V0 O0 0, S1 V1 O1 1, S2 V2 O2 2);
when_all_impl!(
    4; [S0, S1, S2, S3]; [V0, V1, V2, V3];
    S0 V0 O0 0, S1 V1 O1 1, S2 V2 O2 2, S3 V3 O3 3
);
when_all_impl!(
    5; [S0, S1, S2, S3, S4]; [V0, V1, V2, V3, V4];
    S0 V0 O0 0, S1 V1 O1 1, S2 V2 O2 2, S3 V3 O3 3, S4 V4 O4 4
);
when_all_impl!(
    6; [S0, S1, S2, S3, S4, S5]; [V0, V1, V2, V3, V4, V5];
    S0 V0 O0 0, S1 V1 O1 1, S2 V2 O2 2, S3 V3 O3 3, S4 V4 O4 4, S5 V5 O5 5
);
