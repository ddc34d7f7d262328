//! Axis selection.

use smallvec::SmallVec;

use crate::{ReduceError, Result};

/// One flag per operand axis, `true` where the axis is reduced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AxisSet {
    flags: SmallVec<[bool; 8]>,
}

impl AxisSet {
    pub fn from_flags(flags: &[bool]) -> Self {
        Self {
            flags: SmallVec::from_slice(flags),
        }
    }

    /// Select `axes` of a rank-`rank` array. Negative axes count from the end.
    pub fn from_axes(rank: usize, axes: &[isize]) -> Result<Self> {
        let mut flags: SmallVec<[bool; 8]> = SmallVec::from_elem(false, rank);
        for &axis in axes {
            let wrapped = if axis < 0 { axis + rank as isize } else { axis };
            if wrapped < 0 || wrapped >= rank as isize {
                return Err(ReduceError::AxisOutOfRange { axis, rank });
            }
            let wrapped = wrapped as usize;
            if flags[wrapped] {
                return Err(ReduceError::DuplicateAxis { axis: wrapped });
            }
            flags[wrapped] = true;
        }
        Ok(Self { flags })
    }

    /// Every axis of a rank-`rank` array.
    pub fn all(rank: usize) -> Self {
        Self {
            flags: SmallVec::from_elem(true, rank),
        }
    }

    /// No axis of a rank-`rank` array.
    pub fn none(rank: usize) -> Self {
        Self {
            flags: SmallVec::from_elem(false, rank),
        }
    }

    /// Number of reduced axes.
    #[inline]
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    #[inline]
    pub fn is_reduced(&self, axis: usize) -> bool {
        self.flags.get(axis).copied().unwrap_or(false)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.flags.len()
    }

    #[inline]
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn ensure_rank(&self, rank: usize) -> Result<()> {
        if self.flags.len() != rank {
            return Err(ReduceError::AxisFlagsLength {
                expected: rank,
                found: self.flags.len(),
            });
        }
        Ok(())
    }

    /// Result dims for an operand of shape `dims`: reduced axes become 1
    /// with `keepdims`, otherwise they are dropped.
    pub fn output_dims(&self, dims: &[usize], keepdims: bool) -> Vec<usize> {
        dims.iter()
            .zip(&self.flags)
            .filter_map(|(&d, &reduced)| match (reduced, keepdims) {
                (false, _) => Some(d),
                (true, true) => Some(1),
                (true, false) => None,
            })
            .collect()
    }
}
