//! Dynamic-rank strided view types.
//!
//! # Core Types
//!
//! - [`StridedView`] / [`StridedViewMut`]: views over borrowed data
//! - [`StridedArray`]: owned strided multidimensional array
//!
//! # Metadata Transformations
//!
//! These operate only on dims/strides/offset and never touch the data:
//! - `permute`: reorder dimensions
//! - `broadcast`: expand size-1 dimensions
//! - `relayout`: reinterpret the same storage with new dims and strides
//! - `squeeze_axes`: drop size-1 dimensions

pub mod view;

pub use view::{
    col_major_strides, keep_order_strides, row_major_strides, validate_bounds, StridedArray,
    StridedView, StridedViewMut,
};

use strided_traits::{Casting, DType};

/// Errors that can occur during strided array operations.
#[derive(Debug, thiserror::Error)]
pub enum StridedError {
    /// Array ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Array shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Invalid axis index for the given array rank.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow while computing array offset.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,

    /// Only size-1 axes can be squeezed.
    #[error("cannot squeeze axis {axis} with extent {extent}")]
    NonUnitAxis { axis: usize, extent: usize },

    /// The casting rule forbids converting an operand to the loop dtype.
    #[error("cannot cast operand {operand} from {from} to {to} according to the rule '{casting}'")]
    Casting {
        operand: usize,
        from: DType,
        to: DType,
        casting: Casting,
    },

    /// An operand needs a dtype conversion but the traversal is unbuffered.
    #[error("operand {operand} requires casting or copying, but buffering is not enabled")]
    BufferingRequired { operand: usize },

    /// An operand's shape does not fit the iteration space.
    #[error("non-broadcastable operand {operand} with shape {found:?} doesn't match the broadcast shape {shape:?}")]
    NonBroadcastable {
        operand: usize,
        found: Vec<usize>,
        shape: Vec<usize>,
    },

    /// A writable operand would be broadcast along an axis that is not a reduction.
    #[error("output operand {operand} requires a reduction along dimension {axis}, but the reduction is not enabled")]
    WriteBroadcast { operand: usize, axis: usize },

    /// The iteration space is empty and the traversal was not told to accept it.
    #[error("iteration of zero-sized operands is not enabled")]
    ZeroSize,

    /// An operand was accessed as the wrong element type.
    #[error("operand {operand} has dtype {found}, not {expected}")]
    DTypeMismatch {
        operand: usize,
        expected: DType,
        found: DType,
    },

    /// An operand index is out of range.
    #[error("operand {operand} out of range for {count} operands")]
    OperandIndex { operand: usize, count: usize },

    /// Write access was requested for a read-only operand.
    #[error("operand {operand} is read-only")]
    ReadOnlyOperand { operand: usize },

    /// The traversal was finished before every element was visited.
    #[error("traversal finished with {remaining} elements left to visit")]
    IncompleteTraversal { remaining: usize },
}

/// Result type for strided array operations.
pub type Result<T> = std::result::Result<T, StridedError>;
