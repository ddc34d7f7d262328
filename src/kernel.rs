//! The accumulation callback interface.
//!
//! A kernel implements [`Accumulate`] for one pair of loop types. The driver
//! calls it once per inner run with an [`InnerLoop`] (typed pointers into
//! the result and operand buffers) and a [`LoopContext`] (error and
//! floating-point reporting).

use std::marker::PhantomData;

use strided_traits::{Element, FpFlags, FpStatus};

use crate::error::BoxError;

/// Identity of a reduction, if it has one.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Initial<T> {
    /// The reduction is undefined on an empty selection and seeds the result
    /// from the data.
    NoIdentity,
    Identity(T),
}

impl<T: Copy> Initial<T> {
    #[inline]
    pub fn value(&self) -> Option<T> {
        match self {
            Self::NoIdentity => None,
            Self::Identity(v) => Some(*v),
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity(_))
    }
}

impl<T> From<Option<T>> for Initial<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NoIdentity, Self::Identity)
    }
}

/// An accumulation routine over loop types `In` (operand) and `Acc` (result).
///
/// `&mut self` is the accumulator state and persists across inner runs.
pub trait Accumulate {
    type In: Element;
    type Acc: Element;

    /// Name used in error messages.
    fn name(&self) -> &str;

    fn identity(&self) -> Initial<Self::Acc>;

    /// Whether the result is independent of the order in which elements are
    /// combined. Non-reorderable kernels reduce over at most one axis.
    fn reorderable(&self) -> bool {
        true
    }

    /// Combine one inner run into the result.
    ///
    /// Returning an error aborts the reduction.
    fn accumulate(
        &mut self,
        inner: &mut InnerLoop<'_, Self::Acc, Self::In>,
        ctx: &mut LoopContext<'_>,
    ) -> Result<(), BoxError>;
}

/// Typed view of one inner run.
///
/// Element `k` of the run pairs `acc[k]` with `input[k]` (and `mask[k]`).
/// When the result is revisited along the run its stride is 0 and every
/// element folds into the same slot.
pub struct InnerLoop<'s, A, T> {
    acc: *mut A,
    acc_stride: isize,
    input: *const T,
    input_stride: isize,
    mask: Option<(*const bool, isize)>,
    len: usize,
    skipped: usize,
    _marker: PhantomData<(&'s mut A, &'s T)>,
}

impl<'s, A: Element, T: Element> InnerLoop<'s, A, T> {
    /// Build a run from byte pointers and byte strides, dropping the first
    /// `skip` elements.
    ///
    /// # Safety
    /// Each pointer must address `count` elements of its type at its
    /// stride, valid for `'s`, and `skip <= count`.
    pub(crate) unsafe fn from_raw(
        ptrs: &[*mut u8],
        strides: &[isize],
        count: usize,
        skip: usize,
    ) -> Self {
        let acc_stride = strides[0] / std::mem::size_of::<A>() as isize;
        let input_stride = strides[1] / std::mem::size_of::<T>() as isize;
        let shift = skip as isize;
        Self {
            acc: (ptrs[0] as *mut A).wrapping_offset(shift * acc_stride),
            acc_stride,
            input: (ptrs[1] as *const T).wrapping_offset(shift * input_stride),
            input_stride,
            mask: ptrs.get(2).map(|&m| {
                let m = m as *const bool;
                (m.wrapping_offset(shift * strides[2]), strides[2])
            }),
            len: count - skip,
            skipped: skip,
            _marker: PhantomData,
        }
    }

    /// Number of elements in the run.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Leading elements dropped because the result already holds them.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[inline]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    #[inline]
    pub fn input(&self, k: usize) -> T {
        assert!(k < self.len);
        unsafe { *self.input.offset(k as isize * self.input_stride) }
    }

    #[inline]
    pub fn acc(&self, k: usize) -> A {
        assert!(k < self.len);
        unsafe { *self.acc.offset(k as isize * self.acc_stride) }
    }

    #[inline]
    pub fn set_acc(&mut self, k: usize, value: A) {
        assert!(k < self.len);
        unsafe { *self.acc.offset(k as isize * self.acc_stride) = value }
    }

    /// Whether element `k` takes part (always true without a mask).
    #[inline]
    pub fn selected(&self, k: usize) -> bool {
        assert!(k < self.len);
        match self.mask {
            Some((m, s)) => unsafe { *m.offset(k as isize * s) },
            None => true,
        }
    }

    /// `acc[k] = f(acc[k], input[k])` for every element, ignoring the mask.
    pub fn fold(&mut self, mut f: impl FnMut(A, T) -> A) {
        let mut a = self.acc;
        let mut x = self.input;
        for _ in 0..self.len {
            unsafe {
                *a = f(*a, *x);
            }
            a = a.wrapping_offset(self.acc_stride);
            x = x.wrapping_offset(self.input_stride);
        }
    }

    /// Like [`fold`](Self::fold), skipping elements the mask deselects.
    pub fn fold_masked(&mut self, mut f: impl FnMut(A, T) -> A) {
        let Some((mut m, ms)) = self.mask else {
            return self.fold(f);
        };
        let mut a = self.acc;
        let mut x = self.input;
        for _ in 0..self.len {
            unsafe {
                if *m {
                    *a = f(*a, *x);
                }
            }
            a = a.wrapping_offset(self.acc_stride);
            x = x.wrapping_offset(self.input_stride);
            m = m.wrapping_offset(ms);
        }
    }
}

/// Reporting channel for an [`Accumulate`] call.
pub struct LoopContext<'s> {
    needs_checks: bool,
    fp: &'s mut FpStatus,
    deferred: &'s mut Option<BoxError>,
}

impl<'s> LoopContext<'s> {
    pub(crate) fn new(
        needs_checks: bool,
        fp: &'s mut FpStatus,
        deferred: &'s mut Option<BoxError>,
    ) -> Self {
        Self {
            needs_checks,
            fp,
            deferred,
        }
    }

    /// Whether some cast feeding this loop can lose information.
    #[inline]
    pub fn needs_checks(&self) -> bool {
        self.needs_checks
    }

    /// Record floating-point conditions.
    #[inline]
    pub fn raise(&mut self, flags: FpFlags) {
        self.fp.raise(flags);
    }

    /// Record an error that fails the reduction once the loop has finished.
    /// Only the first deferred error is kept.
    pub fn defer_error(&mut self, err: BoxError) {
        if self.deferred.is_none() {
            *self.deferred = Some(err);
        }
    }

    #[inline]
    pub fn has_deferred_error(&self) -> bool {
        self.deferred.is_some()
    }
}
