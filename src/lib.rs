//! Axis reductions over dynamic-rank strided arrays.
//!
//! A reduction collapses the selected axes of an operand into one value per
//! remaining index. The engine takes care of the parts every reduction
//! shares: axis selection, result allocation or adoption, casting between
//! the array dtypes and the kernel's loop types, buffered traversal,
//! first-slice seeding for reductions without an identity, where masks and
//! floating-point error reporting. The arithmetic lives in an
//! [`Accumulate`] kernel.
//!
//! # Core Types
//!
//! - [`AxisSet`]: which axes to reduce
//! - [`Reducer`]: a kernel plus name, identity and order overrides; runs reductions
//! - [`ReduceOptions`]: keepdims, casting rule, buffer size, floating-point actions
//! - [`Accumulate`], [`InnerLoop`], [`LoopContext`]: the kernel interface
//! - [`ReduceError`]: everything that can go wrong
//!
//! # Kernels
//!
//! [`Sum`], [`Prod`], [`Max`], [`Min`], [`Any`], [`All`] and the closure
//! kernel [`FoldFn`].
//!
//! # Example
//!
//! ```rust
//! use strided_reduce::{AxisSet, Max, ReduceOptions, Reducer, StridedArray, Sum};
//!
//! let a = StridedArray::<f64>::from_fn_row_major(&[2, 3], |idx| (idx[0] * 3 + idx[1]) as f64);
//!
//! // Row sums
//! let rows = Reducer::new(Sum::<f64>::new())
//!     .reduce(&a.view(), &AxisSet::from_flags(&[false, true]), &ReduceOptions::default())
//!     .unwrap();
//! assert_eq!(rows.to_vec_row_major(), vec![3.0, 12.0]);
//!
//! // Column maxima, keeping the reduced axis
//! let cols = Reducer::new(Max::<f64>::new())
//!     .reduce(&a.view(), &AxisSet::from_axes(2, &[0]).unwrap(), &ReduceOptions::new().keepdims(true))
//!     .unwrap();
//! assert_eq!(cols.dims(), &[1, 3]);
//! assert_eq!(cols.to_vec_row_major(), vec![3.0, 4.0, 5.0]);
//! ```
//!
//! # Casting
//!
//! ```rust
//! use strided_reduce::{AxisSet, ReduceOptions, Reducer, StridedArray, Sum};
//! use strided_reduce::traits::Casting;
//!
//! // i32 data summed in f64, written into an f32 result
//! let a = StridedArray::<i32>::from_fn_row_major(&[4], |idx| idx[0] as i32);
//! let out = StridedArray::<f32>::from_elem(&[], 0.0);
//! let total = Reducer::new(Sum::<f64>::new())
//!     .reduce_into(&a.view(), out, &AxisSet::all(1), &ReduceOptions::default())
//!     .unwrap();
//! assert_eq!(total.get(&[]), 6.0);
//!
//! // f64 data cannot feed an integer kernel under the default rule
//! let b = StridedArray::<f64>::from_elem(&[4], 1.5);
//! let err = Reducer::new(Sum::<i64>::new())
//!     .reduce(&b.view(), &AxisSet::all(1), &ReduceOptions::default());
//! assert!(err.is_err());
//! let ok = Reducer::new(Sum::<i64>::new())
//!     .reduce(&b.view(), &AxisSet::all(1), &ReduceOptions::new().casting(Casting::Unsafe))
//!     .unwrap();
//! assert_eq!(ok.get(&[]), 4);
//! ```

pub mod axis;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod kernels;
pub mod options;
pub mod plan;
pub mod seed;

pub use strided_traits as traits;

pub use axis::AxisSet;
pub use driver::Reducer;
pub use error::{BoxError, ReduceError, Result};
pub use kernel::{Accumulate, InnerLoop, Initial, LoopContext};
pub use kernels::{All, Any, Arithmetic, FoldFn, Max, Min, Prod, Sum};
pub use options::{FpAction, FpErrorMask, ReduceOptions, DEFAULT_BUFFER_SIZE};
pub use plan::{axis_map, plan_traversal, TraversalPlan};
pub use seed::seed_initial_values;

pub use strided_kernel::{AxisMap, StridedArray, StridedError, StridedView, StridedViewMut};
pub use strided_traits::{Casting, DType, Element, FpFlags, FpStatus};
