//! Conservative memory-overlap tests.
//!
//! Two arrays "may share memory" when the address ranges spanned by their
//! elements intersect. Interleaved layouts that never touch the same element
//! still count as overlapping.

use crate::view::StridedView;

/// Half-open byte range `[lo, hi)` spanned by an array, `None` if it has no
/// elements.
pub fn byte_extent(
    ptr: *const u8,
    elem_size: usize,
    dims: &[usize],
    strides: &[isize],
) -> Option<(usize, usize)> {
    if dims.iter().any(|&d| d == 0) || elem_size == 0 {
        return None;
    }
    let base = ptr as usize as isize;
    let mut lo = 0isize;
    let mut hi = 0isize;
    for (&dim, &stride) in dims.iter().zip(strides) {
        let end = (dim as isize - 1) * stride * elem_size as isize;
        if end >= 0 {
            hi += end;
        } else {
            lo += end;
        }
    }
    let lo = (base + lo) as usize;
    let hi = (base + hi) as usize + elem_size;
    Some((lo, hi))
}

/// Whether two byte ranges intersect.
pub(crate) fn extents_overlap(a: Option<(usize, usize)>, b: Option<(usize, usize)>) -> bool {
    match (a, b) {
        (Some((alo, ahi)), Some((blo, bhi))) => alo < bhi && blo < ahi,
        _ => false,
    }
}

/// Whether two views may refer to the same memory.
pub fn may_share_memory<A, B>(a: &StridedView<'_, A>, b: &StridedView<'_, B>) -> bool {
    let ea = byte_extent(
        a.ptr() as *const u8,
        std::mem::size_of::<A>(),
        a.dims(),
        a.strides(),
    );
    let eb = byte_extent(
        b.ptr() as *const u8,
        std::mem::size_of::<B>(),
        b.dims(),
        b.strides(),
    );
    extents_overlap(ea, eb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_extent() {
        let p = 1000usize as *const u8;
        assert_eq!(byte_extent(p, 8, &[2, 3], &[3, 1]), Some((1000, 1048)));
        assert_eq!(byte_extent(p, 4, &[3], &[-1]), Some((992, 1004)));
        assert_eq!(byte_extent(p, 4, &[3], &[0]), Some((1000, 1004)));
        assert_eq!(byte_extent(p, 4, &[0, 3], &[3, 1]), None);
    }

    #[test]
    fn test_views_of_same_buffer() {
        let data: Vec<f64> = (0..10).map(|x| x as f64).collect();
        let head = StridedView::new(&data, &[5], &[1], 0).unwrap();
        let tail = StridedView::new(&data, &[5], &[1], 5).unwrap();
        let evens = StridedView::new(&data, &[5], &[2], 0).unwrap();
        let odds = StridedView::new(&data, &[5], &[2], 1).unwrap();
        assert!(!may_share_memory(&head, &tail));
        assert!(may_share_memory(&head, &evens));
        // interleaved, but reported conservatively
        assert!(may_share_memory(&evens, &odds));
    }

    #[test]
    fn test_distinct_buffers() {
        let a = vec![0u8; 16];
        let b = vec![0u8; 16];
        let va = StridedView::new(&a, &[16], &[1], 0).unwrap();
        let vb = StridedView::new(&b, &[16], &[1], 0).unwrap();
        assert!(!may_share_memory(&va, &vb));
    }
}
