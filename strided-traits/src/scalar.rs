//! Element types and the dtype-independent scalar used to convert between them.

use crate::dtype::DType;
use num_complex::{Complex, Complex64};
use std::fmt::Debug;

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A single value detached from its storage type.
///
/// Every cast performed by the engine goes through a `Scalar`: the source
/// element is widened into the matching variant and the destination element
/// is produced from it with `as`-style conversion.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(Complex64),
}

impl Scalar {
    #[inline]
    pub fn to_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(v) => v != 0,
            Self::UInt(v) => v != 0,
            Self::Float(v) => v != 0.0,
            Self::Complex(c) => c.re != 0.0 || c.im != 0.0,
        }
    }

    #[inline]
    pub fn to_i64(self) -> i64 {
        match self {
            Self::Bool(b) => b as i64,
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
            Self::Complex(c) => c.re as i64,
        }
    }

    #[inline]
    pub fn to_u64(self) -> u64 {
        match self {
            Self::Bool(b) => b as u64,
            Self::Int(v) => v as u64,
            Self::UInt(v) => v,
            Self::Float(v) if v < 0.0 => (v as i64) as u64,
            Self::Float(v) => v as u64,
            Self::Complex(c) if c.re < 0.0 => (c.re as i64) as u64,
            Self::Complex(c) => c.re as u64,
        }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Bool(b) => b as u8 as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
            Self::Complex(c) => c.re,
        }
    }

    #[inline]
    pub fn to_complex(self) -> Complex64 {
        match self {
            Self::Complex(c) => c,
            other => Complex64::new(other.to_f64(), 0.0),
        }
    }

    /// Whether converting this value to `dtype` has no meaningful result.
    ///
    /// True for NaN, infinite, or out-of-range floating values headed for an
    /// integer dtype.
    pub fn is_invalid_for(self, dtype: DType) -> bool {
        let v = match self {
            Self::Float(v) => v,
            Self::Complex(c) => c.re,
            _ => return false,
        };
        match dtype.int_range() {
            Some((lo, hi)) => {
                if !v.is_finite() {
                    return true;
                }
                let t = v.trunc();
                t < lo || t >= hi
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Rust types that can be stored in strided arrays handled by the engine.
///
/// `Element` ties a static type to its runtime [`DType`] so type-erased
/// operands can be checked and cast.
pub trait Element: Copy + Send + Sync + PartialEq + Debug + 'static {
    const DTYPE: DType;

    fn to_scalar(self) -> Scalar;

    fn from_scalar(value: Scalar) -> Self;

    /// The zero (or `false`) value.
    #[inline]
    fn zeroed() -> Self {
        Self::from_scalar(Scalar::Bool(false))
    }

    /// Convert to another element type with `as`-style semantics.
    #[inline]
    fn cast<U: Element>(self) -> U {
        U::from_scalar(self.to_scalar())
    }
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        value.to_bool()
    }
}

macro_rules! impl_element_signed {
    ($($t:ty => $dt:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$dt;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                value.to_i64() as $t
            }
        })*
    };
}

macro_rules! impl_element_unsigned {
    ($($t:ty => $dt:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$dt;

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::UInt(self as u64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                value.to_u64() as $t
            }
        })*
    };
}

impl_element_signed!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);
impl_element_unsigned!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Float(self as f64)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        value.to_f64() as f32
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Float(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        value.to_f64()
    }
}

impl Element for Complex<f32> {
    const DTYPE: DType = DType::Complex64;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Complex(Complex64::new(self.re as f64, self.im as f64))
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        let c = value.to_complex();
        Complex::new(c.re as f32, c.im as f32)
    }
}

impl Element for Complex<f64> {
    const DTYPE: DType = DType::Complex128;

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Complex(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        value.to_complex()
    }
}

// ---------------------------------------------------------------------------
// Type-erased element access
// ---------------------------------------------------------------------------

macro_rules! dispatch_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::Bool => { type $t = bool; $body }
            DType::I8 => { type $t = i8; $body }
            DType::I16 => { type $t = i16; $body }
            DType::I32 => { type $t = i32; $body }
            DType::I64 => { type $t = i64; $body }
            DType::U8 => { type $t = u8; $body }
            DType::U16 => { type $t = u16; $body }
            DType::U32 => { type $t = u32; $body }
            DType::U64 => { type $t = u64; $body }
            DType::F32 => { type $t = f32; $body }
            DType::F64 => { type $t = f64; $body }
            DType::Complex64 => { type $t = Complex<f32>; $body }
            DType::Complex128 => { type $t = Complex<f64>; $body }
        }
    };
}

/// Read one element of `dtype` stored at `ptr`.
///
/// # Safety
/// `ptr` must point to a valid, aligned element of type `dtype`.
#[inline]
pub unsafe fn load_scalar(ptr: *const u8, dtype: DType) -> Scalar {
    dispatch_dtype!(dtype, E => (*(ptr as *const E)).to_scalar())
}

/// Write `value` as an element of `dtype` at `ptr`.
///
/// # Safety
/// `ptr` must point to writable, aligned storage for one element of `dtype`.
#[inline]
pub unsafe fn store_scalar(ptr: *mut u8, dtype: DType, value: Scalar) {
    dispatch_dtype!(dtype, E => *(ptr as *mut E) = E::from_scalar(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<bool as Element>::DTYPE, DType::Bool);
        assert_eq!(<i16 as Element>::DTYPE, DType::I16);
        assert_eq!(<u64 as Element>::DTYPE, DType::U64);
        assert_eq!(<f32 as Element>::DTYPE, DType::F32);
        assert_eq!(<Complex32 as Element>::DTYPE, DType::Complex64);
        assert_eq!(<Complex64 as Element>::DTYPE, DType::Complex128);
    }

    #[test]
    fn test_cast_between_kinds() {
        assert_eq!(3i32.cast::<f64>(), 3.0);
        assert_eq!(2.75f64.cast::<i32>(), 2);
        assert_eq!((-1i8).cast::<u8>(), 255);
        assert_eq!(300i32.cast::<u8>(), 44);
        assert!(5u8.cast::<bool>());
        assert!(!0.0f32.cast::<bool>());
        assert_eq!(true.cast::<i64>(), 1);
        assert_eq!(1.5f64.cast::<Complex64>(), Complex64::new(1.5, 0.0));
        assert_eq!(Complex64::new(2.0, 7.0).cast::<f32>(), 2.0);
    }

    #[test]
    fn test_invalid_float_to_int() {
        assert!(Scalar::Float(f64::NAN).is_invalid_for(DType::I32));
        assert!(Scalar::Float(f64::INFINITY).is_invalid_for(DType::U8));
        assert!(Scalar::Float(256.0).is_invalid_for(DType::U8));
        assert!(Scalar::Float(-1.0).is_invalid_for(DType::U8));
        assert!(!Scalar::Float(255.9).is_invalid_for(DType::U8));
        assert!(!Scalar::Float(-128.5).is_invalid_for(DType::I8));
        assert!(!Scalar::Float(f64::NAN).is_invalid_for(DType::F32));
        assert!(!Scalar::Int(1 << 40).is_invalid_for(DType::I8));
    }

    #[test]
    fn test_store_then_load_casts_through_bytes() {
        let mut slot = [0i16; 1];
        let ptr = slot.as_mut_ptr() as *mut u8;
        unsafe {
            store_scalar(ptr, DType::I16, Scalar::Float(-12.0));
            assert_eq!(load_scalar(ptr, DType::I16), Scalar::Int(-12));
        }
        assert_eq!(slot[0], -12);
    }
}
