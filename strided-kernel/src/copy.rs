//! Array copy with casting, and fill.

use strided_traits::{load_scalar, store_scalar, DType, Element, FpFlags, FpStatus, Scalar};

use crate::kernel::for_each_inner_block;
use crate::view::{StridedView, StridedViewMut};
use crate::{Result, StridedError};

/// Floating-point conditions raised by converting `value` to `to`.
pub fn cast_flags(value: Scalar, to: DType) -> FpFlags {
    if value.is_invalid_for(to) {
        return FpFlags::INVALID;
    }
    let narrowing = matches!(to, DType::F32 | DType::Complex64);
    let overflows = |v: f64| v.is_finite() && v.abs() > f32::MAX as f64;
    match value {
        Scalar::Float(v) if narrowing && overflows(v) => FpFlags::OVERFLOW,
        Scalar::Complex(c) if narrowing && (overflows(c.re) || overflows(c.im)) => {
            FpFlags::OVERFLOW
        }
        _ => FpFlags::EMPTY,
    }
}

/// Copy `count` elements between type-erased strided runs, casting as needed.
///
/// Strides are in bytes. Conversion problems are recorded in `fp`.
///
/// # Safety
/// Both runs must be valid for `count` elements of their dtype at the given
/// strides, and must not partially overlap.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn cast_run(
    src: *const u8,
    src_dtype: DType,
    src_stride: isize,
    dst: *mut u8,
    dst_dtype: DType,
    dst_stride: isize,
    count: usize,
    fp: &mut FpStatus,
) {
    let mut s = src;
    let mut d = dst;
    if src_dtype == dst_dtype {
        let size = src_dtype.size_in_bytes();
        for _ in 0..count {
            std::ptr::copy(s, d, size);
            s = s.wrapping_offset(src_stride);
            d = d.wrapping_offset(dst_stride);
        }
        return;
    }
    let mut flags = FpFlags::EMPTY;
    for _ in 0..count {
        let value = load_scalar(s, src_dtype);
        flags |= cast_flags(value, dst_dtype);
        store_scalar(d, dst_dtype, value);
        s = s.wrapping_offset(src_stride);
        d = d.wrapping_offset(dst_stride);
    }
    fp.raise(flags);
}

/// Copy a type-erased array into another of the same shape and dtype.
///
/// Strides are in elements.
///
/// # Safety
/// Both arrays must be valid for `dims` at their strides and must not overlap.
pub(crate) unsafe fn copy_raw(
    dst: *mut u8,
    dst_strides: &[isize],
    src: *const u8,
    src_strides: &[isize],
    dims: &[usize],
    dtype: DType,
) -> Result<()> {
    let size = dtype.size_in_bytes() as isize;
    let mut fp = FpStatus::new();
    for_each_inner_block(dims, &[dst_strides, src_strides], Some(0), |offsets, len, inner| {
        cast_run(
            src.wrapping_offset(offsets[1] * size),
            dtype,
            inner[1] * size,
            dst.wrapping_offset(offsets[0] * size),
            dtype,
            inner[0] * size,
            len,
            &mut fp,
        );
        Ok(())
    })
}

/// Copy `src` into `dest`, broadcasting size-1 axes of `src` and casting
/// elements to the destination type.
///
/// Ranks must match. Conversion problems (NaN to integer, overflow when
/// narrowing floats) are recorded in `fp`.
pub fn copy_into<D: Element, S: Element>(
    dest: &mut StridedViewMut<'_, D>,
    src: &StridedView<'_, S>,
    fp: &mut FpStatus,
) -> Result<()> {
    if dest.ndim() != src.ndim() {
        return Err(StridedError::RankMismatch(dest.ndim(), src.ndim()));
    }
    let dims = dest.dims().to_vec();
    let dst_strides = dest.strides().to_vec();
    let src = src.broadcast(&dims)?;

    let dst_ptr = dest.as_mut_ptr() as *mut u8;
    let src_ptr = src.ptr() as *const u8;
    let dsize = D::DTYPE.size_in_bytes() as isize;
    let ssize = S::DTYPE.size_in_bytes() as isize;

    for_each_inner_block(
        &dims,
        &[&dst_strides, src.strides()],
        Some(0),
        |offsets, len, inner| {
            unsafe {
                cast_run(
                    src_ptr.wrapping_offset(offsets[1] * ssize),
                    S::DTYPE,
                    inner[1] * ssize,
                    dst_ptr.wrapping_offset(offsets[0] * dsize),
                    D::DTYPE,
                    inner[0] * dsize,
                    len,
                    fp,
                );
            }
            Ok(())
        },
    )
}

/// Set every element of `dest` to `value`.
pub fn fill<T: Element>(dest: &mut StridedViewMut<'_, T>, value: T) -> Result<()> {
    let dims = dest.dims().to_vec();
    let strides = dest.strides().to_vec();
    let ptr = dest.as_mut_ptr();
    for_each_inner_block(&dims, &[&strides], Some(0), |offsets, len, inner| {
        let mut p = ptr.wrapping_offset(offsets[0]);
        for _ in 0..len {
            unsafe { p.write(value) };
            p = p.wrapping_offset(inner[0]);
        }
        Ok(())
    })
}
