//! Dimension fusion.
//!
//! Adjacent dimensions that are contiguous for every operand are merged so
//! the loop nest gets shallower and inner runs get longer.

/// Fuse contiguous dimensions across all operands.
///
/// `dims` and every stride array are in iteration order, innermost first.
/// Dimension `i` merges into `i - 1` when `strides[i] == dims[i - 1] * strides[i - 1]`
/// holds for every operand and both dimensions carry the same class.
/// `classes` is either empty (no restriction) or one tag per dimension.
///
/// Merged dimensions are left with extent 1; strides are unchanged and
/// [`compress_dims`] removes the leftovers.
pub fn fuse_dims(dims: &[usize], all_strides: &[&[isize]], classes: &[u8]) -> Vec<usize> {
    let n = dims.len();
    let mut result = dims.to_vec();
    if n <= 1 || all_strides.is_empty() {
        return result;
    }
    debug_assert!(classes.is_empty() || classes.len() == n);

    for i in (1..n).rev() {
        if !classes.is_empty() && classes[i] != classes[i - 1] {
            continue;
        }
        let contiguous = all_strides
            .iter()
            .all(|s| s[i] == result[i - 1] as isize * s[i - 1]);
        if contiguous {
            result[i - 1] *= result[i];
            result[i] = 1;
        }
    }
    result
}

/// Remove size-1 dimensions, keeping one trivial dimension if nothing remains.
pub fn compress_dims(
    dims: &[usize],
    all_strides: &[Vec<isize>],
) -> (Vec<usize>, Vec<Vec<isize>>) {
    let kept: Vec<usize> = (0..dims.len()).filter(|&i| dims[i] != 1).collect();

    if kept.is_empty() {
        let new_strides = all_strides.iter().map(|_| vec![0]).collect();
        return (vec![1], new_strides);
    }

    let new_dims: Vec<usize> = kept.iter().map(|&i| dims[i]).collect();
    let new_strides: Vec<Vec<isize>> = all_strides
        .iter()
        .map(|s| kept.iter().map(|&i| s[i]).collect())
        .collect();
    (new_dims, new_strides)
}
