//! Standard accumulation kernels.

use std::fmt;
use std::marker::PhantomData;

use num_complex::Complex;
use num_traits::{One, Zero};
use strided_traits::{Element, FpFlags};

use crate::error::BoxError;
use crate::kernel::{Accumulate, InnerLoop, Initial, LoopContext};

/// Addition and multiplication that report IEEE conditions.
///
/// Integers wrap and never raise anything. Floats raise `OVERFLOW` when
/// finite operands give an infinity and `INVALID` when non-NaN operands
/// give NaN.
pub trait Arithmetic: Element + Zero + One {
    fn add_flagged(self, rhs: Self) -> (Self, FpFlags);
    fn mul_flagged(self, rhs: Self) -> (Self, FpFlags);
}

macro_rules! impl_arithmetic_int {
    ($($t:ty),*) => {$(
        impl Arithmetic for $t {
            #[inline]
            fn add_flagged(self, rhs: Self) -> (Self, FpFlags) {
                (self.wrapping_add(rhs), FpFlags::EMPTY)
            }
            #[inline]
            fn mul_flagged(self, rhs: Self) -> (Self, FpFlags) {
                (self.wrapping_mul(rhs), FpFlags::EMPTY)
            }
        }
    )*};
}

impl_arithmetic_int!(i8, i16, i32, i64, u8, u16, u32, u64);

#[inline]
fn float_flags(a: f64, b: f64, r: f64) -> FpFlags {
    if r.is_nan() && !a.is_nan() && !b.is_nan() {
        FpFlags::INVALID
    } else if r.is_infinite() && a.is_finite() && b.is_finite() {
        FpFlags::OVERFLOW
    } else {
        FpFlags::EMPTY
    }
}

macro_rules! impl_arithmetic_float {
    ($($t:ty),*) => {$(
        impl Arithmetic for $t {
            #[inline]
            fn add_flagged(self, rhs: Self) -> (Self, FpFlags) {
                let r = self + rhs;
                (r, float_flags(self as f64, rhs as f64, r as f64))
            }
            #[inline]
            fn mul_flagged(self, rhs: Self) -> (Self, FpFlags) {
                let r = self * rhs;
                (r, float_flags(self as f64, rhs as f64, r as f64))
            }
        }

        impl Arithmetic for Complex<$t> {
            #[inline]
            fn add_flagged(self, rhs: Self) -> (Self, FpFlags) {
                let r = self + rhs;
                (r, complex_flags(self, rhs, r))
            }
            #[inline]
            fn mul_flagged(self, rhs: Self) -> (Self, FpFlags) {
                let r = self * rhs;
                (r, complex_flags(self, rhs, r))
            }
        }
    )*};
}

impl_arithmetic_float!(f32, f64);

#[inline]
fn complex_flags<F: Into<f64> + Copy>(a: Complex<F>, b: Complex<F>, r: Complex<F>) -> FpFlags {
    let finite = |c: Complex<F>| c.re.into().is_finite() && c.im.into().is_finite();
    let nan = |c: Complex<F>| c.re.into().is_nan() || c.im.into().is_nan();
    if nan(r) && !nan(a) && !nan(b) {
        FpFlags::INVALID
    } else if !finite(r) && finite(a) && finite(b) {
        FpFlags::OVERFLOW
    } else {
        FpFlags::EMPTY
    }
}

/// Sum of elements; identity 0.
pub struct Sum<T>(PhantomData<T>);

impl<T> Sum<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Sum<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Arithmetic> Accumulate for Sum<T> {
    type In = T;
    type Acc = T;

    fn name(&self) -> &str {
        "add"
    }

    fn identity(&self) -> Initial<T> {
        Initial::Identity(T::zero())
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, T, T>,
        ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        let mut flags = FpFlags::EMPTY;
        inner.fold_masked(|a, x| {
            let (r, f) = a.add_flagged(x);
            flags |= f;
            r
        });
        ctx.raise(flags);
        Ok(())
    }
}

/// Product of elements; identity 1.
pub struct Prod<T>(PhantomData<T>);

impl<T> Prod<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Prod<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Arithmetic> Accumulate for Prod<T> {
    type In = T;
    type Acc = T;

    fn name(&self) -> &str {
        "multiply"
    }

    fn identity(&self) -> Initial<T> {
        Initial::Identity(T::one())
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, T, T>,
        ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        let mut flags = FpFlags::EMPTY;
        inner.fold_masked(|a, x| {
            let (r, f) = a.mul_flagged(x);
            flags |= f;
            r
        });
        ctx.raise(flags);
        Ok(())
    }
}

#[inline]
fn is_unordered<T: PartialOrd>(v: &T) -> bool {
    v.partial_cmp(v).is_none()
}

/// Largest element, NaN-propagating; no identity.
pub struct Max<T>(PhantomData<T>);

impl<T> Max<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Max<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + PartialOrd> Accumulate for Max<T> {
    type In = T;
    type Acc = T;

    fn name(&self) -> &str {
        "maximum"
    }

    fn identity(&self) -> Initial<T> {
        Initial::NoIdentity
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, T, T>,
        _ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        inner.fold_masked(|a, x| if a >= x || is_unordered(&a) { a } else { x });
        Ok(())
    }
}

/// Smallest element, NaN-propagating; no identity.
pub struct Min<T>(PhantomData<T>);

impl<T> Min<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Min<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + PartialOrd> Accumulate for Min<T> {
    type In = T;
    type Acc = T;

    fn name(&self) -> &str {
        "minimum"
    }

    fn identity(&self) -> Initial<T> {
        Initial::NoIdentity
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, T, T>,
        _ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        inner.fold_masked(|a, x| if a <= x || is_unordered(&a) { a } else { x });
        Ok(())
    }
}

/// Logical or; identity `false`.
#[derive(Default)]
pub struct Any;

impl Accumulate for Any {
    type In = bool;
    type Acc = bool;

    fn name(&self) -> &str {
        "logical_or"
    }

    fn identity(&self) -> Initial<bool> {
        Initial::Identity(false)
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, bool, bool>,
        _ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        inner.fold_masked(|a, x| a || x);
        Ok(())
    }
}

/// Logical and; identity `true`.
#[derive(Default)]
pub struct All;

impl Accumulate for All {
    type In = bool;
    type Acc = bool;

    fn name(&self) -> &str {
        "logical_and"
    }

    fn identity(&self) -> Initial<bool> {
        Initial::Identity(true)
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, bool, bool>,
        _ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        inner.fold_masked(|a, x| a && x);
        Ok(())
    }
}

/// Kernel from a closure `f(acc, x) -> acc`.
///
/// Defaults to no identity. Whether the closure may be applied in any order
/// is stated at construction.
pub struct FoldFn<A, T, F> {
    name: String,
    f: F,
    identity: Initial<A>,
    reorderable: bool,
    _marker: PhantomData<fn(A, T) -> A>,
}

impl<A: Element, T: Element, F: FnMut(A, T) -> A> FoldFn<A, T, F> {
    pub fn new(name: impl Into<String>, reorderable: bool, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            identity: Initial::NoIdentity,
            reorderable,
            _marker: PhantomData,
        }
    }

    pub fn with_identity(mut self, identity: A) -> Self {
        self.identity = Initial::Identity(identity);
        self
    }
}

impl<A, T, F> fmt::Debug for FoldFn<A, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldFn")
            .field("name", &self.name)
            .field("reorderable", &self.reorderable)
            .finish()
    }
}

impl<A: Element, T: Element, F: FnMut(A, T) -> A> Accumulate for FoldFn<A, T, F> {
    type In = T;
    type Acc = A;

    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> Initial<A> {
        self.identity
    }

    fn reorderable(&self) -> bool {
        self.reorderable
    }

    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, A, T>,
        _ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError> {
        inner.fold_masked(&mut self.f);
        Ok(())
    }
}
