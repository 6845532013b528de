//! Completion signatures and their type-level concatenation.
//!
//! [`Values`] marks the tuples a sender may complete with. [`Concat`] joins
//! two tuples into one, [`ConcatAll`] folds a tuple of tuples left to right.
//! `when_all` uses them to compute its completion signature from its
//! children's signatures.
//!
//! Left operands are supported up to twelve elements and right operands up to
//! six.

/// A completion tuple of up to twelve values.
///
/// Adaptors that take a completion from user code require it, so a function
/// returning a bare value instead of a tuple doesn't compile:
///
/// ```compile_fail
/// use rexec::{just, then};
///
/// let _ = then(just((1,)), |(x,)| x + 1);
/// ```
pub trait Values: Send + 'static {}

macro_rules! values_impl {
    ($($t:ident)*) => {
        impl<$($t: Send + 'static,)*> Values for ($($t,)*) {}
    };
}

values_impl!();
values_impl!(A0);
values_impl!(A0 A1);
values_impl!(A0 A1 A2);
values_impl!(A0 A1 A2 A3);
values_impl!(A0 A1 A2 A3 A4);
values_impl!(A0 A1 A2 A3 A4 A5);
values_impl!(A0 A1 A2 A3 A4 A5 A6);
values_impl!(A0 A1 A2 A3 A4 A5 A6 A7);
values_impl!(A0 A1 A2 A3 A4 A5 A6 A7 A8);
values_impl!(A0 A1 A2 A3 A4 A5 A6 A7 A8 A9);
values_impl!(A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10);
values_impl!(A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11);

/// Concatenates `Self` with `Rhs`.
pub trait Concat<Rhs> {
    type Output;

    fn concat(self, rhs: Rhs) -> Self::Output;
}

/// Flattens a tuple of tuples into one tuple, preserving order.
///
/// ```
/// use rexec::values::ConcatAll;
///
/// let flat = ((1, 'a'), (), ("b",)).concat_all();
/// assert_eq!(flat, (1, 'a', "b"));
/// ```
pub trait ConcatAll {
    type Output;

    fn concat_all(self) -> Self::Output;
}

macro_rules! concat_impl {
    ([$($a:ident $x:ident),*] [$($b:ident $y:ident),*]) => {
        impl<$($a,)* $($b,)*> Concat<($($b,)*)> for ($($a,)*) {
            type Output = ($($a,)* $($b,)*);

            #[inline]
            #[allow(clippy::unused_unit)]
            fn concat(self, rhs: ($($b,)*)) -> Self::Output {
                let ($($x,)*) = self;
                let ($($y,)*) = rhs;
                ($($x,)* $($y,)*)
            }
        }
    };
}

macro_rules! concat_row {
    ($left:tt; [$($right:tt)*]) => {
        $(concat_impl!($left $right);)*
    };
}

macro_rules! concat_matrix {
    ([$($left:tt)*] $rights:tt) => {
        $(concat_row!($left; $rights);)*
    };
}

concat_matrix!(
    [
        []
        [A0 a0]
        [A0 a0, A1 a1]
        [A0 a0, A1 a1, A2 a2]
        [A0 a0, A1 a1, A2 a2, A3 a3]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8, A9 a9]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8, A9 a9, A10 a10]
        [A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8, A9 a9, A10 a10, A11 a11]
    ]
    [
        []
        [B0 b0]
        [B0 b0, B1 b1]
        [B0 b0, B1 b1, B2 b2]
        [B0 b0, B1 b1, B2 b2, B3 b3]
        [B0 b0, B1 b1, B2 b2, B3 b3, B4 b4]
        [B0 b0, B1 b1, B2 b2, B3 b3, B4 b4, B5 b5]
    ]
);

impl<T0> ConcatAll for (T0,) {
    type Output = T0;

    #[inline]
    fn concat_all(self) -> T0 {
        self.0
    }
}

macro_rules! concat_all_impl {
    ($($t:ident $v:ident),*) => {
        impl<T0, T1, $($t,)*> ConcatAll for (T0, T1, $($t,)*)
        where
            T0: Concat<T1>,
            (<T0 as Concat<T1>>::Output, $($t,)*): ConcatAll,
        {
            type Output = <(<T0 as Concat<T1>>::Output, $($t,)*) as ConcatAll>::Output;

            #[inline]
            fn concat_all(self) -> Self::Output {
                let (t0, t1, $($v,)*) = self;
                (t0.concat(t1), $($v,)*).concat_all()
            }
        }
    };
}

concat_all_impl!();
concat_all_impl!(T2 t2);
concat_all_impl!(T2 t2, T3 t3);
concat_all_impl!(T2 t2, T3 t3, T4 t4);
concat_all_impl!(T2 t2, T3 t3, T4 t4, T5 t5);
concat_all_impl!(T2 t2, T3 t3, T4 t4, T5 t5, T6 t6);
concat_all_impl!(T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7);
