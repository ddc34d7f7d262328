//! Runtime element types and the casting rules between them.
//!
//! A [`DType`] is the runtime tag carried by type-erased operands of the
//! traversal engine. [`Casting`] selects how permissive an implicit
//! conversion between two dtypes may be; [`can_cast`] decides it.

use std::fmt;

// ---------------------------------------------------------------------------
// DType
// ---------------------------------------------------------------------------

/// Element types understood by the strided engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Two `f32` components.
    Complex64,
    /// Two `f64` components.
    Complex128,
}

/// Coarse category of a dtype.
///
/// The derived ordering is the "kind" ordering used by [`Casting::SameKind`]:
/// a value may be converted towards a later kind but never back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DTypeKind {
    Bool,
    Unsigned,
    Signed,
    Float,
    Complex,
}

impl DType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    #[inline]
    pub const fn kind(self) -> DTypeKind {
        match self {
            Self::Bool => DTypeKind::Bool,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => DTypeKind::Unsigned,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => DTypeKind::Signed,
            Self::F32 | Self::F64 => DTypeKind::Float,
            Self::Complex64 | Self::Complex128 => DTypeKind::Complex,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self.kind(), DTypeKind::Unsigned | DTypeKind::Signed)
    }

    #[inline]
    pub const fn is_inexact(self) -> bool {
        matches!(self.kind(), DTypeKind::Float | DTypeKind::Complex)
    }

    /// Precision-relevant width: the component size for complex types.
    #[inline]
    const fn component_size(self) -> usize {
        match self {
            Self::Complex64 => 4,
            Self::Complex128 => 8,
            other => other.size_in_bytes(),
        }
    }

    /// Half-open range `[min, max + 1)` of an integer dtype, as `f64`.
    ///
    /// Used to detect float values that have no integer counterpart.
    pub fn int_range(self) -> Option<(f64, f64)> {
        let range = match self {
            Self::I8 => (i8::MIN as f64, i8::MAX as f64 + 1.0),
            Self::I16 => (i16::MIN as f64, i16::MAX as f64 + 1.0),
            Self::I32 => (i32::MIN as f64, i32::MAX as f64 + 1.0),
            Self::I64 => (i64::MIN as f64, i64::MAX as f64 + 1.0),
            Self::U8 => (0.0, u8::MAX as f64 + 1.0),
            Self::U16 => (0.0, u16::MAX as f64 + 1.0),
            Self::U32 => (0.0, u32::MAX as f64 + 1.0),
            Self::U64 => (0.0, u64::MAX as f64 + 1.0),
            _ => return None,
        };
        Some(range)
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// ---------------------------------------------------------------------------
// Casting
// ---------------------------------------------------------------------------

/// Policy for implicit conversions between operand and loop dtypes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Casting {
    /// Only identical dtypes.
    No,
    /// Identical dtypes (byte order is always native here).
    Equiv,
    /// Only conversions that preserve every value.
    Safe,
    /// Safe conversions, or conversions within a kind or towards a later kind.
    #[default]
    SameKind,
    /// Any conversion.
    Unsafe,
}

impl fmt::Display for Casting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::No => "no",
            Self::Equiv => "equiv",
            Self::Safe => "safe",
            Self::SameKind => "same_kind",
            Self::Unsafe => "unsafe",
        };
        f.write_str(name)
    }
}

/// Whether a value of dtype `from` may be converted to `to` under `casting`.
pub fn can_cast(from: DType, to: DType, casting: Casting) -> bool {
    match casting {
        Casting::No | Casting::Equiv => from == to,
        Casting::Safe => is_safe_cast(from, to),
        Casting::SameKind => is_safe_cast(from, to) || from.kind() <= to.kind(),
        Casting::Unsafe => true,
    }
}

/// Value-preserving conversions.
pub fn is_safe_cast(from: DType, to: DType) -> bool {
    use DTypeKind::*;

    if from == to {
        return true;
    }
    let (fs, ts) = (from.component_size(), to.component_size());
    match (from.kind(), to.kind()) {
        (Bool, _) => true,
        (_, Bool) => false,
        (Unsigned, Unsigned) | (Signed, Signed) | (Float, Float) | (Complex, Complex) => ts >= fs,
        (Unsigned, Signed) => ts > fs,
        (Signed, Unsigned) => false,
        // f64 accepts every integer width, f32 only the 8- and 16-bit ones.
        (Unsigned | Signed, Float | Complex) => fs < ts || ts == 8,
        (Float, Complex) => ts >= fs,
        (Float | Complex, Unsigned | Signed) | (Complex, Float) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::Bool.size_in_bytes(), 1);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::Complex64.size_in_bytes(), 8);
        assert_eq!(DType::Complex128.size_in_bytes(), 16);
    }

    #[test]
    fn test_kind_ordering() {
        assert!(DTypeKind::Bool < DTypeKind::Unsigned);
        assert!(DTypeKind::Unsigned < DTypeKind::Signed);
        assert!(DTypeKind::Signed < DTypeKind::Float);
        assert!(DTypeKind::Float < DTypeKind::Complex);
    }

    #[test]
    fn test_no_and_equiv_require_identity() {
        assert!(can_cast(DType::F64, DType::F64, Casting::No));
        assert!(!can_cast(DType::F32, DType::F64, Casting::No));
        assert!(!can_cast(DType::I8, DType::I16, Casting::Equiv));
    }

    #[test]
    fn test_safe_casts() {
        assert!(can_cast(DType::Bool, DType::I8, Casting::Safe));
        assert!(can_cast(DType::I8, DType::I64, Casting::Safe));
        assert!(can_cast(DType::U8, DType::I16, Casting::Safe));
        assert!(!can_cast(DType::U8, DType::I8, Casting::Safe));
        assert!(!can_cast(DType::I8, DType::U64, Casting::Safe));
        assert!(can_cast(DType::I16, DType::F32, Casting::Safe));
        assert!(!can_cast(DType::I32, DType::F32, Casting::Safe));
        assert!(can_cast(DType::I64, DType::F64, Casting::Safe));
        assert!(can_cast(DType::F32, DType::Complex64, Casting::Safe));
        assert!(!can_cast(DType::F64, DType::Complex64, Casting::Safe));
        assert!(!can_cast(DType::F64, DType::F32, Casting::Safe));
        assert!(!can_cast(DType::Complex128, DType::F64, Casting::Safe));
    }

    #[test]
    fn test_same_kind_casts() {
        assert!(can_cast(DType::F64, DType::F32, Casting::SameKind));
        assert!(can_cast(DType::I64, DType::I8, Casting::SameKind));
        assert!(can_cast(DType::U64, DType::I8, Casting::SameKind));
        assert!(can_cast(DType::I64, DType::F32, Casting::SameKind));
        assert!(!can_cast(DType::I8, DType::U8, Casting::SameKind));
        assert!(!can_cast(DType::F64, DType::I64, Casting::SameKind));
        assert!(!can_cast(DType::Complex64, DType::F64, Casting::SameKind));
        assert!(!can_cast(DType::I32, DType::Bool, Casting::SameKind));
    }

    #[test]
    fn test_unsafe_allows_everything() {
        assert!(can_cast(DType::Complex128, DType::Bool, Casting::Unsafe));
        assert!(can_cast(DType::F64, DType::U8, Casting::Unsafe));
    }

    #[test]
    fn test_int_range() {
        assert_eq!(DType::I8.int_range(), Some((-128.0, 128.0)));
        assert_eq!(DType::U16.int_range(), Some((0.0, 65536.0)));
        assert_eq!(DType::F32.int_range(), None);
    }
}
