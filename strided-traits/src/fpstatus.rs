//! Floating-point exception status as an explicit value.
//!
//! Instead of reading the process-wide FPU status word, kernels and casts
//! record the conditions they hit in an [`FpStatus`] owned by the caller.
//! This keeps reductions reentrant and testable without global fixtures.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Set of IEEE 754 exception conditions.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct FpFlags(u8);

impl FpFlags {
    pub const EMPTY: FpFlags = FpFlags(0);
    pub const DIVIDE_BY_ZERO: FpFlags = FpFlags(1);
    pub const OVERFLOW: FpFlags = FpFlags(1 << 1);
    pub const UNDERFLOW: FpFlags = FpFlags(1 << 2);
    pub const INVALID: FpFlags = FpFlags(1 << 3);
    pub const ALL: FpFlags = FpFlags(0b1111);

    const NAMED: [(FpFlags, &'static str); 4] = [
        (Self::DIVIDE_BY_ZERO, "divide by zero"),
        (Self::OVERFLOW, "overflow"),
        (Self::UNDERFLOW, "underflow"),
        (Self::INVALID, "invalid value"),
    ];

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: FpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(self, other: FpFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// The individual flags set in `self`, in a fixed order.
    pub fn iter(self) -> impl Iterator<Item = FpFlags> {
        Self::NAMED
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |&flag| self.contains(flag))
    }
}

impl BitOr for FpFlags {
    type Output = FpFlags;

    fn bitor(self, rhs: FpFlags) -> FpFlags {
        FpFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FpFlags {
    fn bitor_assign(&mut self, rhs: FpFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FpFlags {
    type Output = FpFlags;

    fn bitand(self, rhs: FpFlags) -> FpFlags {
        FpFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for FpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FpFlags({self})")
    }
}

/// Accumulated floating-point exception status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FpStatus {
    flags: FpFlags,
}

impl FpStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one or more conditions.
    #[inline]
    pub fn raise(&mut self, flags: FpFlags) {
        self.flags |= flags;
    }

    #[inline]
    pub fn clear(&mut self) {
        self.flags = FpFlags::EMPTY;
    }

    #[inline]
    pub fn flags(&self) -> FpFlags {
        self.flags
    }

    /// The recorded conditions that are also in `mask`.
    #[inline]
    pub fn test(&self, mask: FpFlags) -> FpFlags {
        self.flags & mask
    }

    /// Fold another status into this one.
    #[inline]
    pub fn merge(&mut self, other: &FpStatus) {
        self.flags |= other.flags;
    }

    /// Return the recorded conditions and clear them.
    pub fn take(&mut self) -> FpFlags {
        std::mem::take(&mut self.flags)
    }
}
