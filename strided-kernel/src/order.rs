//! Loop ordering.
//!
//! Dimensions are ranked by how small their strides are across all operands,
//! with the destination operand counted twice. The highest-ranked dimension
//! becomes the innermost loop.

/// Rank of each stride by magnitude, 1 = smallest. Zero strides rank 1.
pub(crate) fn index_order(strides: &[isize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&si| {
            let si = si.unsigned_abs();
            if si == 0 {
                return 1;
            }
            1 + strides
                .iter()
                .filter(|&&s| s != 0 && s.unsigned_abs() < si)
                .count()
        })
        .collect()
}

/// Bit-packed importance score per dimension.
///
/// Each operand contributes `1 << (g * (n - rank))`; the first operand counts
/// twice. Size-1 dimensions score zero so they sort to the back.
fn compute_importance(dims: &[usize], index_orders: &[Vec<usize>]) -> Vec<u64> {
    let n = dims.len();
    let m = index_orders.len();
    if n == 0 || m == 0 {
        return vec![];
    }

    // bits needed to hold a sum of m + 1 contributions
    let g = (64 - (m as u64 + 1).leading_zeros()) as u64;

    let mut importance = vec![0u64; n];
    for (k, orders) in index_orders.iter().enumerate() {
        let weight = if k == 0 { 2 } else { 1 };
        for i in 0..n {
            let shift = g * (n - orders[i]) as u64;
            importance[i] = importance[i].saturating_add(weight * (1u64 << shift.min(63)));
        }
    }

    for i in 0..n {
        if dims[i] <= 1 {
            importance[i] = 0;
        }
    }
    importance
}

/// Compute the iteration order for dimensions, innermost first.
///
/// # Arguments
/// * `dims` - The shared dimensions of all operands
/// * `strides_list` - One stride array per operand
/// * `dest_index` - Operand weighted twice (usually the output)
pub(crate) fn compute_order(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> Vec<usize> {
    let rank = dims.len();
    if rank == 0 {
        return Vec::new();
    }
    if strides_list.is_empty() {
        return (0..rank).collect();
    }

    let mut index_orders: Vec<Vec<usize>> =
        strides_list.iter().map(|s| index_order(s)).collect();
    if let Some(dest) = dest_index.filter(|&d| d != 0 && d < index_orders.len()) {
        let dest_order = index_orders.remove(dest);
        index_orders.insert(0, dest_order);
    }

    let importance = compute_importance(dims, &index_orders);
    let mut order: Vec<usize> = (0..rank).collect();
    // stable: equal importance keeps the last axis innermost
    order.sort_by(|&a, &b| importance[b].cmp(&importance[a]).then(b.cmp(&a)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order() {
        assert_eq!(index_order(&[4, 1, 2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[4, 0, 2]), vec![2, 1, 1]);
        assert_eq!(index_order(&[-4, 1, -2]), vec![3, 1, 2]);
    }

    #[test]
    fn test_compute_order_column_major() {
        let order = compute_order(&[4, 5], &[&[1, 4]], Some(0));
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_compute_order_row_major() {
        let order = compute_order(&[4, 5], &[&[5, 1]], Some(0));
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_compute_order_output_weighted() {
        // Column-major output outweighs a row-major input.
        let order = compute_order(&[4, 5], &[&[5, 1], &[1, 4]], Some(1));
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_compute_order_reduction_axis_innermost() {
        // Summing rows of a row-major 2x3: result strides [1, 0].
        let order = compute_order(&[2, 3], &[&[1, 0], &[3, 1]], Some(0));
        assert_eq!(order[0], 1);
    }

    #[test]
    fn test_compute_order_size_one_last() {
        let order = compute_order(&[4, 1, 5], &[&[1, 4, 4]], Some(0));
        assert_eq!(order[2], 1);
    }

    #[test]
    fn test_compute_order_negative_strides() {
        let order = compute_order(&[4, 5], &[&[-1, -4]], Some(0));
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_compute_order_empty() {
        assert!(compute_order(&[], &[&[]], Some(0)).is_empty());
        assert_eq!(compute_order(&[2, 3], &[], None), vec![0, 1]);
    }
}
