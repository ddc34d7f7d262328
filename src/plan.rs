//! Traversal planning: result allocation, axis mapping and iterator flags.

use log::debug;
use strided_kernel::view::keep_order_strides;
use strided_kernel::{AxisMap, IterFlags, IterOperand, NdIter, StridedArray, StridedView};
use strided_traits::{Casting, DType, Element};

use crate::{AxisSet, ReduceError, ReduceOptions, Result};

/// Map each operand axis to the result.
///
/// Kept axes take the next result ordinal. Reduced axes are revisited; with
/// `keepdims` they also take an ordinal for their extent-1 result axis.
/// Returns the map and the number of ordinals used, which is the result rank.
pub fn axis_map(axes: &AxisSet, keepdims: bool) -> (Vec<AxisMap>, usize) {
    let mut ordinal = 0;
    let map = axes
        .flags()
        .iter()
        .map(|&reduced| {
            let entry = match (reduced, keepdims) {
                (false, _) => AxisMap::Kept(ordinal),
                (true, true) => AxisMap::ReducedKeepAt(ordinal),
                (true, false) => return AxisMap::Reduced,
            };
            ordinal += 1;
            entry
        })
        .collect();
    (map, ordinal)
}

/// Everything needed to open the reduction traversal.
///
/// Owns the result array. [`open`](Self::open) borrows it for the lifetime
/// of the iterator; [`into_result`](Self::into_result) hands it back once
/// the iterator is finished.
#[derive(Debug)]
pub struct TraversalPlan<R> {
    result: StridedArray<R>,
    axis_map: Vec<AxisMap>,
    flags: IterFlags,
    casting: Casting,
    buffer_size: usize,
}

/// Plan a reduction of an operand with shape `dims` and element strides
/// `strides`.
///
/// A caller-supplied `out` is adopted after its rank is checked against the
/// axis map; its extents are checked when the traversal is opened. Without
/// `out` the result is allocated in the operand's memory order.
pub fn plan_traversal<R: Element>(
    dims: &[usize],
    strides: &[isize],
    out: Option<StridedArray<R>>,
    axes: &AxisSet,
    options: &ReduceOptions,
    op: &str,
) -> Result<TraversalPlan<R>> {
    axes.ensure_rank(dims.len())?;
    let (axis_map, out_rank) = axis_map(axes, options.keepdims);

    let result = match out {
        Some(out) => {
            if out.ndim() != out_rank {
                return Err(ReduceError::OutputShapeMismatch {
                    op: op.to_string(),
                    found: out.ndim(),
                    expected: out_rank,
                    keepdims: options.keepdims,
                });
            }
            out
        }
        None => {
            let out_dims = axes.output_dims(dims, options.keepdims);
            let like: Vec<isize> = axis_map
                .iter()
                .zip(strides)
                .filter(|(map, _)| map.ordinal().is_some())
                .map(|(_, &s)| s)
                .collect();
            let out_strides = keep_order_strides(&out_dims, &like);
            let len = out_dims.iter().product();
            StridedArray::from_parts(vec![R::zeroed(); len], &out_dims, &out_strides, 0)?
        }
    };

    let flags = IterFlags {
        buffered: true,
        external_loop: true,
        grow_inner: true,
        dont_negate_strides: true,
        zerosize_ok: true,
        delay_bufalloc: true,
        copy_if_overlap: true,
    };
    debug!(
        "{op}: planned reduction of {:?} over {:?} into {:?} (keepdims={})",
        dims,
        axes.flags(),
        result.dims(),
        options.keepdims
    );
    Ok(TraversalPlan {
        result,
        axis_map,
        flags,
        casting: options.casting,
        buffer_size: options.effective_buffer_size(),
    })
}

impl<R: Element> TraversalPlan<R> {
    #[inline]
    pub fn axis_map(&self) -> &[AxisMap] {
        &self.axis_map
    }

    #[inline]
    pub fn flags(&self) -> IterFlags {
        self.flags
    }

    #[inline]
    pub fn result(&self) -> &StridedArray<R> {
        &self.result
    }

    pub fn into_result(self) -> StridedArray<R> {
        self.result
    }

    /// Open the traversal over `(result, operand[, mask])`.
    ///
    /// The result is presented to the loop as `acc` and the operand as
    /// `input`. The mask may broadcast; the operand may not.
    pub fn open<'p, T: Element>(
        &'p mut self,
        operand: &StridedView<'p, T>,
        mask: Option<&StridedView<'p, bool>>,
        acc: DType,
        input: DType,
    ) -> Result<NdIter<'p>> {
        let mut ops = vec![
            IterOperand::readwrite(&mut self.result)
                .with_axes(self.axis_map.clone())
                .with_loop_dtype(acc),
            IterOperand::readonly(operand)
                .no_broadcast()
                .with_loop_dtype(input),
        ];
        if let Some(mask) = mask {
            ops.push(IterOperand::readonly(mask));
        }
        Ok(NdIter::new(ops, self.flags, self.casting, self.buffer_size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strided_kernel::StridedError;

    #[test]
    fn test_axis_map() {
        let axes = AxisSet::from_flags(&[true, false, true, false]);
        let (map, rank) = axis_map(&axes, false);
        assert_eq!(
            map,
            vec![AxisMap::Reduced, AxisMap::Kept(0), AxisMap::Reduced, AxisMap::Kept(1)]
        );
        assert_eq!(rank, 2);
        let (map, rank) = axis_map(&axes, true);
        assert_eq!(
            map,
            vec![
                AxisMap::ReducedKeepAt(0),
                AxisMap::Kept(1),
                AxisMap::ReducedKeepAt(2),
                AxisMap::Kept(3)
            ]
        );
        assert_eq!(rank, 4);
    }

    #[test]
    fn test_allocated_result_follows_operand_order() {
        // column-major operand: the result should be column-major too
        let a = StridedArray::<f64>::col_major(&[3, 4, 5]);
        let axes = AxisSet::from_flags(&[false, true, false]);
        let plan =
            plan_traversal::<f64>(a.dims(), a.strides(), None, &axes, &ReduceOptions::default(), "add")
                .unwrap();
        assert_eq!(plan.result().dims(), &[3, 5]);
        assert_eq!(plan.result().strides(), &[1, 3]);

        let opts = ReduceOptions::default().keepdims(true);
        let plan = plan_traversal::<f64>(a.dims(), a.strides(), None, &axes, &opts, "add").unwrap();
        assert_eq!(plan.result().dims(), &[3, 1, 5]);
    }

    #[test]
    fn test_out_rank_checked_before_traversal() {
        let a = StridedArray::<f64>::row_major(&[2, 3]);
        let axes = AxisSet::from_flags(&[false, true]);
        for keepdims in [false, true] {
            let out = StridedArray::<f64>::row_major(&[2, 1, 1]);
            let opts = ReduceOptions::default().keepdims(keepdims);
            let err = plan_traversal(a.dims(), a.strides(), Some(out), &axes, &opts, "add").unwrap_err();
            match err {
                ReduceError::OutputShapeMismatch {
                    found, expected, ..
                } => {
                    assert_eq!(found, 3);
                    assert_eq!(expected, if keepdims { 2 } else { 1 });
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_open_checks_out_extents() {
        let a = StridedArray::<f64>::row_major(&[2, 3]);
        let axes = AxisSet::from_flags(&[false, true]);
        let out = StridedArray::<f64>::row_major(&[3]);
        let mut plan =
            plan_traversal(a.dims(), a.strides(), Some(out), &axes, &ReduceOptions::default(), "add")
                .unwrap();
        let err = plan.open(&a.view(), None, DType::F64, DType::F64).err();
        assert!(matches!(
            err,
            Some(ReduceError::Strided(StridedError::NonBroadcastable { operand: 0, .. }))
        ));
    }

    #[test]
    fn test_open_reports_casting() {
        let a = StridedArray::<f64>::row_major(&[4]);
        let axes = AxisSet::all(1);
        let mut plan =
            plan_traversal::<i64>(a.dims(), a.strides(), None, &axes, &ReduceOptions::default(), "add")
                .unwrap();
        let err = plan.open(&a.view(), None, DType::I64, DType::I64).err();
        assert!(matches!(
            err,
            Some(ReduceError::Strided(StridedError::Casting {
                operand: 1,
                from: DType::F64,
                to: DType::I64,
                ..
            }))
        ));
    }
}
