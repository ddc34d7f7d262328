//! Traversal machinery for strided arrays.
//!
//! # Internal iteration
//!
//! [`for_each_inner_block`] orders the dimensions of one or more operands by
//! stride, fuses the ones that are contiguous everywhere and calls a closure
//! once per innermost run. [`copy_into`] and [`fill`] are built on it.
//!
//! # External iteration
//!
//! [`NdIter`] is a resettable cursor over several type-erased operands. It
//! broadcasts their shapes, maps reduction axes to zero strides, stages
//! operands that need a dtype conversion through buffers and hands out one
//! run at a time through [`NdIter::step`].
//!
//! # Memory overlap
//!
//! [`may_share_memory`] reports whether two views can touch the same bytes.

pub mod copy;
pub mod fuse;
pub mod iter;
pub mod kernel;
mod order;
pub mod overlap;

pub use strided_view as view;
pub use strided_view::{Result, StridedArray, StridedError, StridedView, StridedViewMut};

pub use copy::{cast_flags, copy_into, fill};
pub use iter::{Access, AxisMap, IterFlags, IterOperand, NdIter, Step};
pub use kernel::for_each_inner_block;
pub use overlap::may_share_memory;
