//! Dynamic-rank strided view types.
//!
//! - [`StridedView`]: immutable view over borrowed data
//! - [`StridedViewMut`]: mutable view over borrowed data
//! - [`StridedArray`]: owned strided multidimensional array
//!
//! Strides are counted in elements and may be negative or zero.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use crate::{Result, StridedError};

// ============================================================================
// Layout helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
pub fn validate_bounds(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: isize,
) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(StridedError::StrideLengthMismatch);
    }
    // Empty array - no access needed
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(StridedError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 || max_offset as usize >= len {
        return Err(StridedError::OffsetOverflow);
    }
    Ok(())
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1].max(1) as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1].max(1) as isize;
    }
    strides
}

/// Dense non-negative strides for `dims` that follow the memory order of `like`.
///
/// The axis with the largest `|stride|` in `like` becomes the outermost one.
/// Ties keep the axis order, so a `like` without a clear order (all zero, or
/// all size-1) yields row-major strides.
pub fn keep_order_strides(dims: &[usize], like: &[isize]) -> Vec<isize> {
    debug_assert_eq!(dims.len(), like.len());
    let rank = dims.len();
    let mut axes: Vec<usize> = (0..rank).collect();
    axes.sort_by(|&a, &b| like[b].unsigned_abs().cmp(&like[a].unsigned_abs()));

    let mut strides = vec![0isize; rank];
    let mut step = 1isize;
    for &axis in axes.iter().rev() {
        strides[axis] = step;
        step *= dims[axis].max(1) as isize;
    }
    strides
}

fn check_perm(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(StridedError::RankMismatch(perm.len(), rank));
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return Err(StridedError::InvalidAxis { axis: p, rank });
        }
        seen[p] = true;
    }
    Ok(())
}

#[inline]
fn linear_offset(dims: &[usize], strides: &[isize], indices: &[usize]) -> isize {
    assert_eq!(indices.len(), dims.len(), "wrong number of indices");
    let mut idx = 0isize;
    for (i, &index) in indices.iter().enumerate() {
        assert!(
            index < dims[i],
            "index {} out of bounds for dim {}",
            index,
            dims[i]
        );
        idx += index as isize * strides[i];
    }
    idx
}

/// Visit every multi-index of `dims` in row-major order.
fn for_each_index_row_major(dims: &[usize], mut f: impl FnMut(&[usize])) {
    let total: usize = dims.iter().product();
    let rank = dims.len();
    let mut idx = vec![0usize; rank];
    for _ in 0..total {
        f(&idx);
        for d in (0..rank).rev() {
            idx[d] += 1;
            if idx[d] < dims[d] {
                break;
            }
            idx[d] = 0;
        }
    }
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank immutable strided view.
///
/// # Type Parameters
/// - `'a`: Lifetime of the underlying data
/// - `T`: Element type
pub struct StridedView<'a, T> {
    ptr: *const T,
    data: &'a [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

unsafe impl<T: Send> Send for StridedView<'_, T> {}
unsafe impl<T: Sync> Sync for StridedView<'_, T> {}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a new immutable strided view from a borrowed slice.
    pub fn new(data: &'a [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            ptr: data.as_ptr().wrapping_offset(offset),
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Raw const pointer to element at the view's base offset.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.ptr
    }

    fn with_layout(&self, dims: &[usize], strides: &[isize]) -> StridedView<'a, T> {
        StridedView {
            ptr: self.ptr,
            data: self.data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset: self.offset,
        }
    }

    /// Permute dimensions.
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a, T>> {
        check_perm(perm, self.ndim())?;
        let new_dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let new_strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(self.with_layout(&new_dims, &new_strides))
    }

    /// Broadcast this view to a target shape of the same rank.
    ///
    /// Size-1 dimensions are expanded (stride set to 0) to match target.
    pub fn broadcast(&self, target_dims: &[usize]) -> Result<StridedView<'a, T>> {
        if self.dims.len() != target_dims.len() {
            return Err(StridedError::RankMismatch(
                self.dims.len(),
                target_dims.len(),
            ));
        }
        let mut new_strides = Vec::with_capacity(self.dims.len());
        for i in 0..self.dims.len() {
            if self.dims[i] == target_dims[i] {
                new_strides.push(self.strides[i]);
            } else if self.dims[i] == 1 {
                new_strides.push(0);
            } else {
                return Err(StridedError::ShapeMismatch(
                    self.dims.to_vec(),
                    target_dims.to_vec(),
                ));
            }
        }
        Ok(self.with_layout(target_dims, &new_strides))
    }

    /// Reinterpret the same base element with new dims and strides.
    ///
    /// The new layout is bounds-checked against the borrowed data.
    pub fn relayout(&self, dims: &[usize], strides: &[isize]) -> Result<StridedView<'a, T>> {
        validate_bounds(self.data.len(), dims, strides, self.offset)?;
        Ok(self.with_layout(dims, strides))
    }

    /// Remove the listed axes, each of which must have extent 1.
    pub fn squeeze_axes(&self, axes: &[usize]) -> Result<StridedView<'a, T>> {
        let rank = self.ndim();
        let mut drop = vec![false; rank];
        for &axis in axes {
            if axis >= rank {
                return Err(StridedError::InvalidAxis { axis, rank });
            }
            if self.dims[axis] != 1 {
                return Err(StridedError::NonUnitAxis {
                    axis,
                    extent: self.dims[axis],
                });
            }
            drop[axis] = true;
        }
        let (dims, strides): (Vec<usize>, Vec<isize>) = (0..rank)
            .filter(|&i| !drop[i])
            .map(|i| (self.dims[i], self.strides[i]))
            .unzip();
        Ok(self.with_layout(&dims, &strides))
    }
}

impl<T: Copy> StridedView<'_, T> {
    /// Get an element.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = linear_offset(&self.dims, &self.strides, indices);
        unsafe { *self.ptr.offset(idx) }
    }

    /// Get an element without bounds checking.
    ///
    /// # Safety
    /// Caller must ensure indices are within bounds.
    #[inline]
    pub unsafe fn get_unchecked(&self, indices: &[usize]) -> T {
        let mut idx = 0isize;
        for (i, &index) in indices.iter().enumerate() {
            idx += index as isize * self.strides[i];
        }
        *self.ptr.offset(idx)
    }

    /// Collect the elements in row-major (logical) order.
    pub fn to_vec_row_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for_each_index_row_major(&self.dims, |idx| {
            out.push(unsafe { self.get_unchecked(idx) })
        });
        out
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Dynamic-rank mutable strided view.
pub struct StridedViewMut<'a, T> {
    ptr: *mut T,
    data: &'a mut [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

unsafe impl<T: Send> Send for StridedViewMut<'_, T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a new mutable strided view.
    pub fn new(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            ptr: data.as_mut_ptr().wrapping_offset(offset),
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Raw const pointer to element at the view's base offset.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.ptr as *const T
    }

    /// Raw mutable pointer to element at the view's base offset.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// Permute dimensions, consuming the mutable view.
    ///
    /// Takes `self` by value to prevent aliasing of mutable views.
    pub fn permute(self, perm: &[usize]) -> Result<StridedViewMut<'a, T>> {
        check_perm(perm, self.ndim())?;
        let new_dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let new_strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(StridedViewMut {
            ptr: self.ptr,
            data: self.data,
            dims: Arc::from(new_dims),
            strides: Arc::from(new_strides),
            offset: self.offset,
        })
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            ptr: self.ptr as *const T,
            data: &*self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T: Copy> StridedViewMut<'_, T> {
    /// Get an element.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = linear_offset(&self.dims, &self.strides, indices);
        unsafe { *self.ptr.offset(idx) }
    }

    /// Set an element.
    pub fn set(&mut self, indices: &[usize], value: T) {
        let idx = linear_offset(&self.dims, &self.strides, indices);
        unsafe {
            *self.ptr.offset(idx) = value;
        }
    }
}

// ============================================================================
// StridedArray
// ============================================================================

/// Owned strided multidimensional array.
pub struct StridedArray<T> {
    data: Vec<T>,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

impl<T: std::fmt::Debug> std::fmt::Debug for StridedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedArray")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("data", &self.data)
            .finish()
    }
}

impl<T: Clone> Clone for StridedArray<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T: Clone> StridedArray<T> {
    /// Row-major array with every element set to `value`.
    pub fn from_elem(dims: &[usize], value: T) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![value; total],
            dims: Arc::from(dims),
            strides: Arc::from(row_major_strides(dims)),
            offset: 0,
        }
    }
}

impl<T: Clone + Default> StridedArray<T> {
    /// Column-major array filled with default values.
    pub fn col_major(dims: &[usize]) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![T::default(); total],
            dims: Arc::from(dims),
            strides: Arc::from(col_major_strides(dims)),
            offset: 0,
        }
    }

    /// Row-major array filled with default values.
    pub fn row_major(dims: &[usize]) -> Self {
        Self::from_elem(dims, T::default())
    }
}

impl<T> StridedArray<T> {
    /// Column-major array with values produced by a function.
    ///
    /// The function is called with indices in column-major iteration order.
    pub fn from_fn_col_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in 0..rank {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(col_major_strides(dims)),
            offset: 0,
        }
    }

    /// Row-major array with values produced by a function.
    ///
    /// The function is called with indices in row-major iteration order.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let mut data = Vec::with_capacity(dims.iter().product());
        for_each_index_row_major(dims, |idx| data.push(f(idx)));
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(row_major_strides(dims)),
            offset: 0,
        }
    }

    /// Create from raw parts.
    pub fn from_parts(
        data: Vec<T>,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Create an immutable view over this array.
    pub fn view(&self) -> StridedView<'_, T> {
        StridedView {
            ptr: self.data.as_ptr().wrapping_offset(self.offset),
            data: &self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }

    /// Create a mutable view over this array.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            ptr: self.data.as_mut_ptr().wrapping_offset(self.offset),
            data: &mut self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }

    /// Iterate over all elements in memory order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Copy> StridedArray<T> {
    /// Get an element by multi-dimensional index.
    pub fn get(&self, indices: &[usize]) -> T {
        self[indices]
    }

    /// Set an element by multi-dimensional index.
    pub fn set(&mut self, indices: &[usize], value: T) {
        self[indices] = value;
    }

    /// Collect the elements in row-major (logical) order.
    pub fn to_vec_row_major(&self) -> Vec<T> {
        self.view().to_vec_row_major()
    }
}

impl<T> Index<&[usize]> for StridedArray<T> {
    type Output = T;

    fn index(&self, indices: &[usize]) -> &T {
        let idx = self.offset + linear_offset(&self.dims, &self.strides, indices);
        &self.data[idx as usize]
    }
}

impl<T> IndexMut<&[usize]> for StridedArray<T> {
    fn index_mut(&mut self, indices: &[usize]) -> &mut T {
        let idx = self.offset + linear_offset(&self.dims, &self.strides, indices);
        &mut self.data[idx as usize]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_col_major_strides() {
        assert_eq!(col_major_strides(&[3, 4]), vec![1, 3]);
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[3, 4]), vec![4, 1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[]), Vec::<isize>::new());
    }

    #[test]
    fn test_keep_order_strides() {
        // Column-major source keeps column-major order.
        assert_eq!(keep_order_strides(&[2, 3, 4], &[1, 2, 6]), vec![1, 2, 6]);
        // Row-major source with one axis squashed to extent 1.
        assert_eq!(keep_order_strides(&[2, 1, 4], &[12, 4, 1]), vec![4, 4, 1]);
        // Negative strides follow their magnitude.
        assert_eq!(keep_order_strides(&[3, 2], &[-1, 3]), vec![1, 3]);
        // No order information falls back to row-major.
        assert_eq!(keep_order_strides(&[2, 3], &[0, 0]), vec![3, 1]);
    }

    #[test]
    fn test_strided_view_get() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let view = StridedView::<f64>::new(&data, &[2, 3], &[3, 1], 0).unwrap();
        assert_eq!(view.ndim(), 2);
        assert_eq!(view.len(), 6);
        assert_eq!(view.get(&[0, 0]), 1.0);
        assert_eq!(view.get(&[0, 2]), 3.0);
        assert_eq!(view.get(&[1, 0]), 4.0);
        assert_eq!(view.get(&[1, 2]), 6.0);
    }

    #[test]
    fn test_strided_view_negative_stride() {
        let data = vec![1, 2, 3, 4];
        let view = StridedView::<i32>::new(&data, &[4], &[-1], 3).unwrap();
        assert_eq!(view.to_vec_row_major(), vec![4, 3, 2, 1]);
        assert!(StridedView::<i32>::new(&data, &[4], &[-1], 2).is_err());
    }

    #[test]
    fn test_strided_view_permute() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let view = StridedView::<f64>::new(&data, &[2, 3], &[3, 1], 0).unwrap();
        let perm = view.permute(&[1, 0]).unwrap();
        assert_eq!(perm.dims(), &[3, 2]);
        assert_eq!(perm.strides(), &[1, 3]);
        assert_eq!(perm.get(&[1, 0]), 2.0);
        assert_eq!(perm.get(&[0, 1]), 4.0);
        assert!(view.permute(&[0, 0]).is_err());
        assert!(view.permute(&[0]).is_err());
    }

    #[test]
    fn test_strided_view_broadcast() {
        let data = vec![1.0, 2.0, 3.0];
        let view = StridedView::<f64>::new(&data, &[1, 3], &[3, 1], 0).unwrap();
        let broad = view.broadcast(&[4, 3]).unwrap();
        assert_eq!(broad.dims(), &[4, 3]);
        assert_eq!(broad.strides(), &[0, 1]);
        for i in 0..4 {
            assert_eq!(broad.get(&[i, 2]), 3.0);
        }
        assert!(view.broadcast(&[4, 2]).is_err());
    }

    #[test]
    fn test_relayout_first_slice() {
        // 2x3 row-major; select index 0 along axis 1.
        let data: Vec<i64> = (0..6).collect();
        let view = StridedView::<i64>::new(&data, &[2, 3], &[3, 1], 0).unwrap();
        let slice = view.relayout(&[2, 1], &[3, 0]).unwrap();
        assert_eq!(slice.to_vec_row_major(), vec![0, 3]);
        assert!(matches!(
            view.relayout(&[3, 3], &[3, 1]),
            Err(StridedError::OffsetOverflow)
        ));
    }

    #[test]
    fn test_squeeze_axes() {
        let data: Vec<i64> = (0..6).collect();
        let view = StridedView::<i64>::new(&data, &[1, 6, 1], &[6, 1, 1], 0).unwrap();
        let sq = view.squeeze_axes(&[0, 2]).unwrap();
        assert_eq!(sq.dims(), &[6]);
        assert_eq!(sq.strides(), &[1]);
        assert!(matches!(
            view.squeeze_axes(&[1]),
            Err(StridedError::NonUnitAxis { axis: 1, extent: 6 })
        ));
        assert!(matches!(
            view.squeeze_axes(&[3]),
            Err(StridedError::InvalidAxis { axis: 3, rank: 3 })
        ));
    }

    #[test]
    fn test_strided_view_mut() {
        let mut data = vec![0.0; 6];
        {
            let mut view = StridedViewMut::<f64>::new(&mut data, &[2, 3], &[3, 1], 0).unwrap();
            view.set(&[0, 0], 1.0);
            view.set(&[1, 2], 6.0);
            assert_eq!(view.as_view().get(&[1, 2]), 6.0);
        }
        assert_eq!(data[0], 1.0);
        assert_eq!(data[5], 6.0);
    }

    #[test]
    fn test_strided_array_layouts() {
        let c = StridedArray::<f64>::from_fn_col_major(&[2, 3], |idx| (idx[0] * 3 + idx[1]) as f64);
        let r = StridedArray::<f64>::from_fn_row_major(&[2, 3], |idx| (idx[0] * 3 + idx[1]) as f64);
        assert_eq!(c.strides(), &[1, 2]);
        assert_eq!(r.strides(), &[3, 1]);
        assert_eq!(c.to_vec_row_major(), r.to_vec_row_major());
        assert_eq!(c.get(&[1, 2]), 5.0);
    }

    #[test]
    fn test_strided_array_from_elem_and_set() {
        let mut a = StridedArray::from_elem(&[2, 2], Complex64::new(1.0, 0.0));
        a.set(&[1, 0], Complex64::new(0.0, 2.0));
        assert_eq!(a[&[1usize, 0] as &[usize]], Complex64::new(0.0, 2.0));
        assert_eq!(a.data()[2], Complex64::new(0.0, 2.0));
    }

    #[test]
    fn test_strided_array_zero_size() {
        let a = StridedArray::<f32>::row_major(&[0, 3]);
        assert!(a.is_empty());
        assert_eq!(a.len(), 0);
        assert_eq!(a.strides(), &[3, 1]);
        assert!(a.to_vec_row_major().is_empty());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 0).is_ok());
        assert!(validate_bounds(5, &[2, 3], &[3, 1], 0).is_err());
        assert!(validate_bounds(0, &[0, 3], &[3, 1], 0).is_ok());
        assert!(validate_bounds(7, &[2, 3], &[3, 1], 1).is_ok());
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 1).is_err());
        assert!(validate_bounds(6, &[2], &[3, 1], 0).is_err());
    }
}
