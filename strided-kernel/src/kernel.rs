//! Internal-iteration kernel.
//!
//! Pipeline: order → reorder → fuse → compress, then a carry-style loop nest
//! that hands every innermost run to a callback.

use crate::fuse::{compress_dims, fuse_dims};
use crate::{order, Result};

/// Loop layout shared by all operands: dims and per-operand strides in
/// iteration order, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoopLayout {
    pub(crate) dims: Vec<usize>,
    pub(crate) strides: Vec<Vec<isize>>,
}

/// Build the loop layout for `dims` and one stride array per operand.
///
/// `classes` (empty or one tag per dimension of `dims`) keeps dimensions
/// of different classes from fusing. The result always has at least one
/// dimension.
pub(crate) fn build_layout(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
    classes: &[u8],
) -> LoopLayout {
    let order = order::compute_order(dims, strides_list, dest_index);

    let ordered_dims: Vec<usize> = order.iter().map(|&d| dims[d]).collect();
    let ordered_strides: Vec<Vec<isize>> = strides_list
        .iter()
        .map(|strides| order.iter().map(|&d| strides[d]).collect())
        .collect();
    let ordered_classes: Vec<u8> = if classes.is_empty() {
        Vec::new()
    } else {
        order.iter().map(|&d| classes[d]).collect()
    };
    let refs: Vec<&[isize]> = ordered_strides.iter().map(|s| s.as_slice()).collect();

    let fused = fuse_dims(&ordered_dims, &refs, &ordered_classes);
    let (dims, strides) = compress_dims(&fused, &ordered_strides);
    LoopLayout { dims, strides }
}

/// Iterate over innermost runs, calling `f(offsets, len, inner_strides)`.
///
/// Offsets and strides are in elements, one per operand. Nothing is called
/// for an empty iteration space.
pub fn for_each_inner_block<F>(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
    mut f: F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let layout = build_layout(dims, strides_list, dest_index, &[]);
    let mut offsets = vec![0isize; strides_list.len()];
    kernel_nd_inner(&layout.dims, &layout.strides, &mut offsets, &mut f)
}

/// Loop nest over `dims` (innermost first), one callback per innermost run.
fn kernel_nd_inner<F>(
    dims: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let rank = dims.len();
    let d0 = dims[0];
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();
    let mut idx = vec![0usize; rank];

    loop {
        f(offsets, d0, &inner_strides)?;

        // Carry-style increment for outer levels.
        let mut level = 1usize;
        loop {
            if level == rank {
                return Ok(());
            }
            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset += s[level];
            }
            idx[level] += 1;
            if idx[level] < dims[level] {
                break;
            }
            idx[level] = 0;
            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset -= (dims[level] as isize) * s[level];
            }
            level += 1;
        }
    }
}
