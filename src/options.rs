//! Per-call configuration.

use strided_traits::{Casting, FpFlags};

/// Buffer length, in elements, used when none is requested.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// What to do when a floating-point condition is raised during a reduction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FpAction {
    #[default]
    Ignore,
    /// Log a warning and carry on.
    Warn,
    /// Fail with [`ReduceError::FloatingPoint`](crate::ReduceError::FloatingPoint).
    Raise,
}

/// One [`FpAction`] per floating-point condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FpErrorMask {
    pub divide_by_zero: FpAction,
    pub overflow: FpAction,
    pub underflow: FpAction,
    pub invalid: FpAction,
}

impl Default for FpErrorMask {
    fn default() -> Self {
        Self {
            divide_by_zero: FpAction::Warn,
            overflow: FpAction::Warn,
            underflow: FpAction::Ignore,
            invalid: FpAction::Warn,
        }
    }
}

impl FpErrorMask {
    fn uniform(action: FpAction) -> Self {
        Self {
            divide_by_zero: action,
            overflow: action,
            underflow: action,
            invalid: action,
        }
    }

    pub fn raise_all() -> Self {
        Self::uniform(FpAction::Raise)
    }

    pub fn ignore_all() -> Self {
        Self::uniform(FpAction::Ignore)
    }

    /// Set `action` for every condition in `flags`.
    pub fn with(mut self, flags: FpFlags, action: FpAction) -> Self {
        if flags.contains(FpFlags::DIVIDE_BY_ZERO) {
            self.divide_by_zero = action;
        }
        if flags.contains(FpFlags::OVERFLOW) {
            self.overflow = action;
        }
        if flags.contains(FpFlags::UNDERFLOW) {
            self.underflow = action;
        }
        if flags.contains(FpFlags::INVALID) {
            self.invalid = action;
        }
        self
    }

    /// The action for a single condition. Combined flags yield the most
    /// severe action among them.
    pub fn action(&self, flags: FpFlags) -> FpAction {
        let pairs = [
            (FpFlags::DIVIDE_BY_ZERO, self.divide_by_zero),
            (FpFlags::OVERFLOW, self.overflow),
            (FpFlags::UNDERFLOW, self.underflow),
            (FpFlags::INVALID, self.invalid),
        ];
        pairs
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .map(|&(_, action)| action)
            .max_by_key(|action| match action {
                FpAction::Ignore => 0,
                FpAction::Warn => 1,
                FpAction::Raise => 2,
            })
            .unwrap_or(FpAction::Ignore)
    }

    /// The subset of `flags` whose action is `action`.
    pub fn select(&self, flags: FpFlags, action: FpAction) -> FpFlags {
        flags
            .iter()
            .filter(|&flag| self.action(flag) == action)
            .fold(FpFlags::EMPTY, |acc, flag| acc | flag)
    }
}

/// Options for a single reduction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Keep reduced axes as extent-1 axes in the result.
    pub keepdims: bool,
    /// Rule for converting operand and result to the kernel's types.
    pub casting: Casting,
    /// Buffer length in elements. `None` or `Some(0)` means
    /// [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: Option<usize>,
    pub fp_errors: FpErrorMask,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            keepdims: false,
            casting: Casting::SameKind,
            buffer_size: None,
            fp_errors: FpErrorMask::default(),
        }
    }
}

impl ReduceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keepdims(mut self, keepdims: bool) -> Self {
        self.keepdims = keepdims;
        self
    }

    pub fn casting(mut self, casting: Casting) -> Self {
        self.casting = casting;
        self
    }

    pub fn buffer_size(mut self, elements: usize) -> Self {
        self.buffer_size = Some(elements);
        self
    }

    pub fn fp_errors(mut self, mask: FpErrorMask) -> Self {
        self.fp_errors = mask;
        self
    }

    /// Buffer length actually used.
    pub fn effective_buffer_size(&self) -> usize {
        match self.buffer_size {
            None | Some(0) => DEFAULT_BUFFER_SIZE,
            Some(n) => n,
        }
    }
}
