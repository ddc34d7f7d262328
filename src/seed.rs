//! Initial values for reductions without an identity.

use log::debug;
use strided_kernel::{copy_into, StridedView, StridedViewMut};
use strided_traits::{Element, FpStatus};

use crate::{AxisSet, ReduceError, Result};

/// Copy the first slice of `operand` along every reduced axis into `result`.
///
/// The slice takes index 0 of each reduced axis (kept as an extent-1 axis
/// when `keepdims`, dropped otherwise) and the full extent of every other
/// axis. The copy follows the usual cast and broadcast rules, with
/// conversion problems recorded in `fp`.
///
/// Returns the number of elements copied. Those elements are already part
/// of the result and must not be accumulated again.
pub fn seed_initial_values<R: Element, T: Element>(
    result: &mut StridedViewMut<'_, R>,
    operand: &StridedView<'_, T>,
    axes: &AxisSet,
    keepdims: bool,
    op: &str,
    fp: &mut FpStatus,
) -> Result<usize> {
    axes.ensure_rank(operand.ndim())?;

    let mut dims = Vec::with_capacity(operand.ndim());
    let mut strides = Vec::with_capacity(operand.ndim());
    let mut skip_first_count = 1usize;
    for (axis, (&d, &s)) in operand.dims().iter().zip(operand.strides()).enumerate() {
        if axes.is_reduced(axis) {
            if d == 0 {
                return Err(ReduceError::EmptyReduction { op: op.to_string() });
            }
            if keepdims {
                dims.push(1);
                strides.push(0);
            }
        } else {
            skip_first_count *= d;
            dims.push(d);
            strides.push(s);
        }
    }

    let first = operand.relayout(&dims, &strides)?;
    copy_into(result, &first, fp)?;
    debug!("{op}: seeded {skip_first_count} result elements from the first slice");
    Ok(skip_first_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strided_kernel::StridedArray;

    #[test]
    fn test_seed_drops_reduced_axes() {
        let a = StridedArray::<i32>::from_fn_row_major(&[2, 3, 4], |i| {
            (i[0] * 100 + i[1] * 10 + i[2]) as i32
        });
        let mut out = StridedArray::<i32>::row_major(&[2, 4]);
        let mut fp = FpStatus::new();
        let axes = AxisSet::from_flags(&[false, true, false]);
        let n = seed_initial_values(&mut out.view_mut(), &a.view(), &axes, false, "max", &mut fp)
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(out.to_vec_row_major(), vec![0, 1, 2, 3, 100, 101, 102, 103]);
    }

    #[test]
    fn test_seed_keepdims_casts() {
        let a = StridedArray::<i16>::from_fn_col_major(&[3, 2], |i| (i[0] + 10 * i[1]) as i16);
        let mut out = StridedArray::<f64>::row_major(&[1, 2]);
        let mut fp = FpStatus::new();
        let axes = AxisSet::from_flags(&[true, false]);
        let n = seed_initial_values(&mut out.view_mut(), &a.view(), &axes, true, "max", &mut fp)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(out.to_vec_row_major(), vec![0.0, 10.0]);
    }

    #[test]
    fn test_seed_all_axes() {
        let a = StridedArray::<f32>::from_fn_row_major(&[2, 2], |i| (i[0] * 2 + i[1]) as f32 + 5.0);
        let mut out = StridedArray::<f32>::row_major(&[]);
        let mut fp = FpStatus::new();
        let n = seed_initial_values(
            &mut out.view_mut(),
            &a.view(),
            &AxisSet::all(2),
            false,
            "minimum",
            &mut fp,
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(out.get(&[]), 5.0);
    }

    #[test]
    fn test_seed_empty_reduced_axis() {
        let a = StridedArray::<f64>::row_major(&[0, 3]);
        let mut out = StridedArray::<f64>::row_major(&[3]);
        let mut fp = FpStatus::new();
        let err = seed_initial_values(
            &mut out.view_mut(),
            &a.view(),
            &AxisSet::from_flags(&[true, false]),
            false,
            "maximum",
            &mut fp,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "zero-size array to reduction operation maximum which has no identity"
        );
    }

    #[test]
    fn test_seed_empty_kept_axis_is_fine() {
        let a = StridedArray::<f64>::row_major(&[3, 0]);
        let mut out = StridedArray::<f64>::row_major(&[0]);
        let mut fp = FpStatus::new();
        let n = seed_initial_values(
            &mut out.view_mut(),
            &a.view(),
            &AxisSet::from_flags(&[true, false]),
            false,
            "maximum",
            &mut fp,
        )
        .unwrap();
        assert_eq!(n, 0);
    }
}
