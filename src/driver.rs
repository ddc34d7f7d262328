//! The reduction driver.
//!
//! [`Reducer::run`] validates the request, plans the traversal, initialises
//! the result (identity fill or first-slice seeding), drives the kernel over
//! every inner run and checks the error state before handing the result
//! back.

use log::{trace, warn};
use strided_kernel::{fill, StridedArray, StridedView};
use strided_traits::{Element, FpStatus};

use crate::error::BoxError;
use crate::kernel::{Accumulate, InnerLoop, Initial, LoopContext};
use crate::options::{FpAction, ReduceOptions};
use crate::plan::plan_traversal;
use crate::seed::seed_initial_values;
use crate::{AxisSet, ReduceError, Result};

/// A kernel together with overrides of its name, identity and order
/// sensitivity.
pub struct Reducer<K: Accumulate> {
    kernel: K,
    name: Option<String>,
    initial: Option<Initial<K::Acc>>,
    reorderable: Option<bool>,
}

impl<K: Accumulate> Reducer<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            name: None,
            initial: None,
            reorderable: None,
        }
    }

    /// Name used in error messages instead of the kernel's.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Start from `value` instead of the kernel's identity.
    ///
    /// An initial value is accepted wherever an identity is, including
    /// reductions with a where mask.
    pub fn with_initial(mut self, value: K::Acc) -> Self {
        self.initial = Some(Initial::Identity(value));
        self
    }

    /// Seed from the data even if the kernel has an identity.
    pub fn without_identity(mut self) -> Self {
        self.initial = Some(Initial::NoIdentity);
        self
    }

    pub fn reorderable(mut self, reorderable: bool) -> Self {
        self.reorderable = Some(reorderable);
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kernel.name())
    }

    pub fn identity(&self) -> Initial<K::Acc> {
        self.initial.unwrap_or_else(|| self.kernel.identity())
    }

    pub fn is_reorderable(&self) -> bool {
        self.reorderable.unwrap_or_else(|| self.kernel.reorderable())
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn into_kernel(self) -> K {
        self.kernel
    }

    /// Reduce `operand` over `axes`.
    ///
    /// The operand is read as `K::In` and the result accumulated as
    /// `K::Acc`, with conversions checked against `options.casting`. The
    /// result has element type `R`; when `out` is given it is filled and
    /// returned, otherwise a new array is allocated in the operand's memory
    /// order. Elements where `where_mask` is false do not take part.
    ///
    /// `fp` is cleared first and holds the floating-point conditions raised
    /// by the call when it returns. Conditions whose action in
    /// `options.fp_errors` is [`FpAction::Raise`] fail the call.
    pub fn run<T: Element, R: Element>(
        &mut self,
        operand: &StridedView<'_, T>,
        out: Option<StridedArray<R>>,
        where_mask: Option<&StridedView<'_, bool>>,
        axes: &AxisSet,
        options: &ReduceOptions,
        fp: &mut FpStatus,
    ) -> Result<StridedArray<R>> {
        axes.ensure_rank(operand.ndim())?;
        let op = self.name().to_string();
        let naxes = axes.count();
        if !self.is_reorderable() && naxes > 1 {
            return Err(ReduceError::NonReorderableMultiAxis { op, naxes });
        }
        let identity = self.identity();
        if where_mask.is_some() && !identity.is_identity() {
            return Err(ReduceError::WhereWithoutIdentity { op });
        }

        let mut plan = plan_traversal(operand.dims(), operand.strides(), out, axes, options, &op)?;
        let mut iter = plan.open(operand, where_mask, K::Acc::DTYPE, K::In::DTYPE)?;

        fp.clear();
        let skip_first_count = match identity {
            Initial::Identity(value) => {
                fill(&mut iter.operand_view_mut::<R>(0)?, value.cast::<R>())?;
                0
            }
            Initial::NoIdentity => {
                let (mut result, input) = iter.view_pair::<R, T>(0, 1)?;
                seed_initial_values(&mut result, &input, axes, options.keepdims, &op, fp)?
            }
        };

        iter.reset();
        let needs_checks = iter.needs_checks();
        let mut deferred: Option<BoxError> = None;
        let mut to_skip = skip_first_count;
        if iter.iter_size() != 0 {
            while let Some(step) = iter.step() {
                let skip = if to_skip > 0 {
                    iter.first_visit_prefix(0).min(to_skip)
                } else {
                    0
                };
                to_skip -= skip;
                if skip < step.count {
                    let mut inner: InnerLoop<'_, K::Acc, K::In> =
                        unsafe { InnerLoop::from_raw(step.ptrs, step.strides, step.count, skip) };
                    let mut ctx = LoopContext::new(needs_checks, fp, &mut deferred);
                    self.kernel
                        .accumulate(&mut inner, &mut ctx)
                        .map_err(ReduceError::Accumulation)?;
                } else {
                    trace!("{op}: run of {} already seeded", step.count);
                }
                if !iter.advance() {
                    break;
                }
            }
        }

        fp.merge(iter.fp_status());
        if let Some(err) = deferred {
            return Err(ReduceError::Accumulation(err));
        }
        check_fp_errors(fp, options, &op)?;
        iter.finish()
            .map_err(|source| ReduceError::ResourceRelease { op, source })?;
        Ok(plan.into_result())
    }

    /// Reduce into a newly allocated array of the kernel's accumulator type.
    pub fn reduce<T: Element>(
        &mut self,
        operand: &StridedView<'_, T>,
        axes: &AxisSet,
        options: &ReduceOptions,
    ) -> Result<StridedArray<K::Acc>> {
        let mut fp = FpStatus::new();
        self.run(operand, None, None, axes, options, &mut fp)
    }

    /// Like [`reduce`](Self::reduce), counting only elements where `mask`
    /// is true. `mask` broadcasts against the operand.
    pub fn reduce_where<T: Element>(
        &mut self,
        operand: &StridedView<'_, T>,
        mask: &StridedView<'_, bool>,
        axes: &AxisSet,
        options: &ReduceOptions,
    ) -> Result<StridedArray<K::Acc>> {
        let mut fp = FpStatus::new();
        self.run(operand, None, Some(mask), axes, options, &mut fp)
    }

    /// Reduce into `out` and return it.
    pub fn reduce_into<T: Element, R: Element>(
        &mut self,
        operand: &StridedView<'_, T>,
        out: StridedArray<R>,
        axes: &AxisSet,
        options: &ReduceOptions,
    ) -> Result<StridedArray<R>> {
        let mut fp = FpStatus::new();
        self.run(operand, Some(out), None, axes, options, &mut fp)
    }
}

fn check_fp_errors(fp: &FpStatus, options: &ReduceOptions, op: &str) -> Result<()> {
    let flags = fp.flags();
    if flags.is_empty() {
        return Ok(());
    }
    let warned = options.fp_errors.select(flags, FpAction::Warn);
    if !warned.is_empty() {
        warn!("{warned} encountered in {op}");
    }
    let fatal = options.fp_errors.select(flags, FpAction::Raise);
    if !fatal.is_empty() {
        return Err(ReduceError::FloatingPoint {
            op: op.to_string(),
            flags: fatal,
        });
    }
    Ok(())
}
