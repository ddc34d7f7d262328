//! Shared vocabulary for the strided-rs reduction stack.
//!
//! This crate holds the definitions every other crate in the workspace agrees
//! on: runtime element types ([`DType`]), the mapping from Rust types to them
//! ([`Element`]), conversions between them ([`Scalar`], [`Casting`],
//! [`can_cast`]) and the explicit floating-point status register
//! ([`FpStatus`]).
//!
//! External crates can depend on `strided-traits` alone to implement
//! accumulation kernels without pulling in the view or kernel crates.

pub mod dtype;
pub mod fpstatus;
pub mod scalar;

pub use dtype::{can_cast, is_safe_cast, Casting, DType, DTypeKind};
pub use fpstatus::{FpFlags, FpStatus};
pub use scalar::{load_scalar, store_scalar, Element, Scalar};
