//! Buffered external-loop traversal over several type-erased operands.
//!
//! [`NdIter`] walks a shared iteration space and hands out one *run* at a
//! time: a pointer, a byte stride and a common element count per operand.
//! Operands whose dtype differs from the requested loop dtype are staged
//! through buffers; writable operands are cast back when the cursor moves on.
//!
//! An operand may carry an explicit axis map ([`AxisMap`]) from iteration
//! axes to its own axes. Axes mapped as reductions are traversed with a zero
//! stride, which is how a reduction result is visited once per input element.

use std::marker::PhantomData;

use log::debug;
use strided_traits::{can_cast, is_safe_cast, Casting, DType, Element, FpStatus};

use crate::copy::{cast_run, copy_raw};
use crate::kernel::build_layout;
use crate::overlap::{byte_extent, extents_overlap};
use crate::view::{row_major_strides, StridedArray, StridedView, StridedViewMut};
use crate::{Result, StridedError};

/// Where an iteration axis lands in an operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AxisMap {
    /// Operand axis `ordinal` runs along this iteration axis.
    Kept(usize),
    /// The operand has no axis here; it is revisited along this axis.
    Reduced,
    /// Operand axis `ordinal` has extent 1 and is revisited along this axis.
    ReducedKeepAt(usize),
}

impl AxisMap {
    /// The operand axis this iteration axis maps to, if any.
    #[inline]
    pub fn ordinal(self) -> Option<usize> {
        match self {
            Self::Kept(o) | Self::ReducedKeepAt(o) => Some(o),
            Self::Reduced => None,
        }
    }

    #[inline]
    pub fn is_reduction(self) -> bool {
        !matches!(self, Self::Kept(_))
    }
}

/// How the traversal may touch an operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Traversal behaviour switches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IterFlags {
    /// Stage operands that need a cast through buffers.
    pub buffered: bool,
    /// Hand out whole runs instead of single elements.
    pub external_loop: bool,
    /// Let runs span a whole inner dimension when nothing is buffered.
    pub grow_inner: bool,
    /// Never reverse axes whose strides are all negative.
    pub dont_negate_strides: bool,
    /// Accept an empty iteration space.
    pub zerosize_ok: bool,
    /// Leave buffers unfilled until the first [`NdIter::reset`].
    pub delay_bufalloc: bool,
    /// Copy read operands that may overlap a writable operand.
    pub copy_if_overlap: bool,
}

/// One operand of an [`NdIter`].
pub struct IterOperand<'a> {
    data: *mut u8,
    len: usize,
    offset: isize,
    dtype: DType,
    dims: Vec<usize>,
    strides: Vec<isize>,
    access: Access,
    no_broadcast: bool,
    loop_dtype: Option<DType>,
    axes: Option<Vec<AxisMap>>,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> IterOperand<'a> {
    /// Read-only operand over a view.
    pub fn readonly<T: Element>(view: &StridedView<'a, T>) -> Self {
        Self {
            data: view.data().as_ptr() as *mut u8,
            len: view.data().len(),
            offset: view.offset(),
            dtype: T::DTYPE,
            dims: view.dims().to_vec(),
            strides: view.strides().to_vec(),
            access: Access::ReadOnly,
            no_broadcast: false,
            loop_dtype: None,
            axes: None,
            _marker: PhantomData,
        }
    }

    /// Read-write operand over an owned array.
    pub fn readwrite<T: Element>(array: &'a mut StridedArray<T>) -> Self {
        let len = array.data().len();
        let offset = array.offset();
        let dims = array.dims().to_vec();
        let strides = array.strides().to_vec();
        Self {
            data: array.data_mut().as_mut_ptr() as *mut u8,
            len,
            offset,
            dtype: T::DTYPE,
            dims,
            strides,
            access: Access::ReadWrite,
            no_broadcast: false,
            loop_dtype: None,
            axes: None,
            _marker: PhantomData,
        }
    }

    /// Operand over raw storage: `len` elements of `dtype` starting at `data`.
    ///
    /// # Safety
    /// The storage must stay valid (and, for `ReadWrite`, writable) for `'a`,
    /// and `dims`/`strides`/`offset` must stay inside it. Storage shared with
    /// another operand of the same traversal is only allowed when at most one
    /// of them is writable and `copy_if_overlap` is set.
    pub unsafe fn from_raw_parts(
        data: *mut u8,
        len: usize,
        dtype: DType,
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        access: Access,
    ) -> Result<Self> {
        crate::view::validate_bounds(len, dims, strides, offset)?;
        Ok(Self {
            data,
            len,
            offset,
            dtype,
            dims: dims.to_vec(),
            strides: strides.to_vec(),
            access,
            no_broadcast: false,
            loop_dtype: None,
            axes: None,
            _marker: PhantomData,
        })
    }

    /// Forbid broadcasting this operand to the iteration shape.
    pub fn no_broadcast(mut self) -> Self {
        self.no_broadcast = true;
        self
    }

    /// Present elements to the loop as `dtype`.
    pub fn with_loop_dtype(mut self, dtype: DType) -> Self {
        self.loop_dtype = Some(dtype);
        self
    }

    /// Map iteration axes to operand axes explicitly.
    pub fn with_axes(mut self, axes: Vec<AxisMap>) -> Self {
        self.axes = Some(axes);
        self
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// `(extent, stride)` of this operand along iteration axis `ax`, or
    /// `None` if the operand has no axis there.
    fn axis(&self, ax: usize, rank: usize) -> Option<(usize, isize)> {
        match &self.axes {
            Some(map) => map[ax].ordinal().map(|o| (self.dims[o], self.strides[o])),
            None => {
                let lead = rank - self.dims.len();
                (ax >= lead).then(|| (self.dims[ax - lead], self.strides[ax - lead]))
            }
        }
    }

    fn is_reduction_axis(&self, ax: usize) -> bool {
        self.axes.as_ref().is_some_and(|map| map[ax].is_reduction())
    }

    fn extent_in_bytes(&self) -> Option<(usize, usize)> {
        let size = self.dtype.size_in_bytes();
        let base = self.data.wrapping_offset(self.offset * size as isize);
        byte_extent(base, size, &self.dims, &self.strides)
    }
}

/// Heap storage aligned for any element type.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Chunk([u8; 16]);

struct AlignedBuf(Vec<Chunk>);

impl AlignedBuf {
    fn zeroed(bytes: usize) -> Self {
        Self(vec![Chunk([0; 16]); bytes.div_ceil(16)])
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr() as *mut u8
    }
}

struct OpState {
    // source storage and layout, for views
    data: *mut u8,
    len: usize,
    offset: isize,
    dims: Vec<usize>,
    strides: Vec<isize>,
    dtype: DType,
    loop_dtype: DType,
    access: Access,
    // address of iteration coordinate zero
    origin: *mut u8,
    // byte strides over the loop dims, innermost first
    byte_strides: Vec<isize>,
    // memory address of the current run
    cur: *mut u8,
    buffer: Option<AlignedBuf>,
    buffer_stride: isize,
}

impl OpState {
    #[inline]
    fn is_buffered(&self) -> bool {
        self.dtype != self.loop_dtype
    }

    /// Elements moved through the buffer for a run of `count`.
    #[inline]
    fn buffered_len(&self, count: usize) -> usize {
        if self.buffer_stride == 0 {
            1
        } else {
            count
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Unready,
    Active,
    Exhausted,
}

/// The current run: one pointer and one byte stride per operand.
#[derive(Debug)]
pub struct Step<'s> {
    pub ptrs: &'s [*mut u8],
    pub strides: &'s [isize],
    pub count: usize,
}

/// Resettable cursor over a shared iteration space.
pub struct NdIter<'a> {
    ops: Vec<OpState>,
    temps: Vec<AlignedBuf>,
    shape: Vec<usize>,
    dims: Vec<usize>,
    coords: Vec<usize>,
    size: usize,
    visited: usize,
    run_cap: usize,
    count: usize,
    phase: Phase,
    ptrs: Vec<*mut u8>,
    step_strides: Vec<isize>,
    needs_checks: bool,
    fp: FpStatus,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> NdIter<'a> {
    /// Build a cursor over `operands`.
    ///
    /// Validates broadcasting, write access along non-reduction axes, the
    /// casting rule and buffering requirements before anything is touched.
    pub fn new(
        operands: Vec<IterOperand<'a>>,
        flags: IterFlags,
        casting: Casting,
        buffer_size: usize,
    ) -> Result<Self> {
        let nop = operands.len();
        let rank = operands
            .iter()
            .map(|op| op.axes.as_ref().map_or(op.dims.len(), |m| m.len()))
            .max()
            .unwrap_or(0);

        for op in &operands {
            if let Some(map) = &op.axes {
                if map.len() != rank {
                    return Err(StridedError::RankMismatch(map.len(), rank));
                }
                let ndim = op.dims.len();
                let mut seen = vec![false; ndim];
                for o in map.iter().filter_map(|m| m.ordinal()) {
                    if o >= ndim || seen[o] {
                        return Err(StridedError::InvalidAxis { axis: o, rank: ndim });
                    }
                    seen[o] = true;
                }
                if seen.iter().any(|&s| !s) {
                    let mapped = seen.iter().filter(|&&s| s).count();
                    return Err(StridedError::RankMismatch(ndim, mapped));
                }
            }
        }

        let shape = broadcast_shape(&operands, rank)?;
        validate_operands(&operands, &shape)?;

        let size: usize = shape.iter().product();
        if size == 0 && !flags.zerosize_ok {
            return Err(StridedError::ZeroSize);
        }

        let mut needs_checks = false;
        for (i, op) in operands.iter().enumerate() {
            let Some(loop_dtype) = op.loop_dtype.filter(|&d| d != op.dtype) else {
                continue;
            };
            if !can_cast(op.dtype, loop_dtype, casting) {
                return Err(StridedError::Casting {
                    operand: i,
                    from: op.dtype,
                    to: loop_dtype,
                    casting,
                });
            }
            if op.is_writable() && !can_cast(loop_dtype, op.dtype, casting) {
                return Err(StridedError::Casting {
                    operand: i,
                    from: loop_dtype,
                    to: op.dtype,
                    casting,
                });
            }
            if !flags.buffered {
                return Err(StridedError::BufferingRequired { operand: i });
            }
            needs_checks |= !is_safe_cast(op.dtype, loop_dtype)
                || (op.is_writable() && !is_safe_cast(loop_dtype, op.dtype));
        }

        let mut operands = operands;
        let mut temps = Vec::new();
        if flags.copy_if_overlap {
            copy_overlapping_inputs(&mut operands, &mut temps)?;
        }

        // element strides and origin offsets over the iteration shape
        let mut strides: Vec<Vec<isize>> = operands
            .iter()
            .map(|op| {
                (0..rank)
                    .map(|ax| match op.axis(ax, rank) {
                        Some((e, s)) if e == shape[ax] => s,
                        _ => 0,
                    })
                    .collect()
            })
            .collect();
        let mut origins: Vec<isize> = operands.iter().map(|op| op.offset).collect();
        if !flags.dont_negate_strides {
            for ax in 0..rank {
                let all_nonpos = strides.iter().all(|s| s[ax] <= 0);
                let any_neg = strides.iter().any(|s| s[ax] < 0);
                if shape[ax] > 1 && all_nonpos && any_neg {
                    for (s, origin) in strides.iter_mut().zip(origins.iter_mut()) {
                        *origin += (shape[ax] as isize - 1) * s[ax];
                        s[ax] = -s[ax];
                    }
                }
            }
        }

        // Axes where the writable operands are revisited must not fuse with
        // axes where they are not.
        let classes: Vec<u8> = (0..rank)
            .map(|ax| {
                operands
                    .iter()
                    .zip(&strides)
                    .enumerate()
                    .filter(|(_, (op, _))| op.is_writable())
                    .fold(0u8, |c, (k, (_, s))| c | (((s[ax] == 0) as u8) << (k % 8)))
            })
            .collect();
        let dest_index = operands.iter().position(|op| op.is_writable());
        let refs: Vec<&[isize]> = strides.iter().map(|s| s.as_slice()).collect();
        let layout = build_layout(&shape, &refs, dest_index, &classes);

        let ops: Vec<OpState> = operands
            .into_iter()
            .zip(layout.strides)
            .zip(origins)
            .map(|((op, elem_strides), origin)| {
                let elem = op.dtype.size_in_bytes() as isize;
                let loop_dtype = op.loop_dtype.unwrap_or(op.dtype);
                let byte_strides: Vec<isize> = elem_strides.iter().map(|&s| s * elem).collect();
                let buffer_stride = if byte_strides[0] == 0 {
                    0
                } else {
                    loop_dtype.size_in_bytes() as isize
                };
                let origin = op.data.wrapping_offset(origin * elem);
                OpState {
                    data: op.data,
                    len: op.len,
                    offset: op.offset,
                    dims: op.dims,
                    strides: op.strides,
                    dtype: op.dtype,
                    loop_dtype,
                    access: op.access,
                    origin,
                    byte_strides,
                    cur: origin,
                    buffer: None,
                    buffer_stride,
                }
            })
            .collect();

        let inner = layout.dims[0];
        let any_buffered = ops.iter().any(|op| op.is_buffered());
        let run_cap = if !flags.external_loop {
            1
        } else if flags.buffered && (any_buffered || !flags.grow_inner) {
            buffer_size.max(1).min(inner)
        } else {
            inner
        }
        .max(1);

        debug!(
            "NdIter: shape={:?} loop dims={:?} run={} buffered={:?} overlap copies={}",
            shape,
            layout.dims,
            run_cap,
            ops.iter().map(|op| op.is_buffered()).collect::<Vec<_>>(),
            temps.len()
        );

        let mut iter = Self {
            ptrs: vec![std::ptr::null_mut(); nop],
            step_strides: vec![0; nop],
            coords: vec![0; layout.dims.len()],
            dims: layout.dims,
            ops,
            temps,
            shape,
            size,
            visited: 0,
            run_cap,
            count: 0,
            phase: Phase::Unready,
            needs_checks,
            fp: FpStatus::new(),
            _marker: PhantomData,
        };
        if !flags.delay_bufalloc {
            iter.reset();
        }
        Ok(iter)
    }

    /// Number of elements in the iteration space.
    #[inline]
    pub fn iter_size(&self) -> usize {
        self.size
    }

    /// Broadcast iteration shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn nop(&self) -> usize {
        self.ops.len()
    }

    /// Whether some buffered conversion can lose information.
    #[inline]
    pub fn needs_checks(&self) -> bool {
        self.needs_checks
    }

    /// Conditions recorded while casting into or out of buffers.
    #[inline]
    pub fn fp_status(&self) -> &FpStatus {
        &self.fp
    }

    /// Move to the first run, allocating buffers on first use.
    ///
    /// Buffered operands are loaded from memory, so writes made through
    /// [`operand_view_mut`](Self::operand_view_mut) before a reset are seen
    /// by the loop.
    pub fn reset(&mut self) {
        let cap = self.run_cap;
        for op in self.ops.iter_mut().filter(|op| op.is_buffered()) {
            if op.buffer.is_none() {
                let elems = op.buffered_len(cap);
                op.buffer = Some(AlignedBuf::zeroed(elems * op.loop_dtype.size_in_bytes()));
            }
        }
        self.coords.fill(0);
        self.visited = 0;
        if self.size == 0 {
            self.count = 0;
            self.phase = Phase::Exhausted;
            return;
        }
        self.phase = Phase::Active;
        self.load_run();
    }

    /// The current run, or `None` before [`reset`](Self::reset) and after the end.
    pub fn step(&self) -> Option<Step<'_>> {
        (self.phase == Phase::Active).then(|| Step {
            ptrs: &self.ptrs,
            strides: &self.step_strides,
            count: self.count,
        })
    }

    /// Write back the current run and move to the next one.
    ///
    /// Returns `false` once the iteration space is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        self.write_back();
        self.visited += self.count;
        self.coords[0] += self.count;
        if self.coords[0] >= self.dims[0] {
            self.coords[0] = 0;
            let mut level = 1usize;
            loop {
                if level == self.dims.len() {
                    self.count = 0;
                    self.phase = Phase::Exhausted;
                    return false;
                }
                self.coords[level] += 1;
                if self.coords[level] < self.dims[level] {
                    break;
                }
                self.coords[level] = 0;
                level += 1;
            }
        }
        self.load_run();
        true
    }

    /// Leading elements of the current run that reach an element of operand
    /// `op` for the first time.
    ///
    /// An element is visited for the first time when every axis along which
    /// `op` is revisited (zero stride) is at coordinate 0.
    pub fn first_visit_prefix(&self, op: usize) -> usize {
        if self.phase != Phase::Active {
            return 0;
        }
        let s = &self.ops[op].byte_strides;
        let revisited_outer = (1..self.dims.len())
            .any(|k| s[k] == 0 && self.dims[k] > 1 && self.coords[k] != 0);
        if revisited_outer {
            return 0;
        }
        if s[0] == 0 && self.dims[0] > 1 {
            usize::from(self.coords[0] == 0)
        } else {
            self.count
        }
    }

    /// Flush pending write-back and release the cursor.
    ///
    /// Fails if the iteration space was not fully visited.
    pub fn finish(mut self) -> Result<()> {
        match self.phase {
            Phase::Exhausted => Ok(()),
            Phase::Unready if self.size == 0 => Ok(()),
            Phase::Unready => Err(StridedError::IncompleteTraversal {
                remaining: self.size,
            }),
            Phase::Active => {
                self.write_back();
                Err(StridedError::IncompleteTraversal {
                    remaining: self.size - self.visited,
                })
            }
        }
    }

    /// View of operand `op` in its own layout.
    pub fn operand_view<T: Element>(&self, op: usize) -> Result<StridedView<'_, T>> {
        let state = self.op_checked::<T>(op)?;
        let data = unsafe { std::slice::from_raw_parts(state.data as *const T, state.len) };
        StridedView::new(data, &state.dims, &state.strides, state.offset)
    }

    /// Mutable view of writable operand `op` in its own layout.
    pub fn operand_view_mut<T: Element>(&mut self, op: usize) -> Result<StridedViewMut<'_, T>> {
        let state = self.op_checked::<T>(op)?;
        if state.access != Access::ReadWrite {
            return Err(StridedError::ReadOnlyOperand { operand: op });
        }
        let data = unsafe { std::slice::from_raw_parts_mut(state.data as *mut T, state.len) };
        StridedViewMut::new(data, &state.dims, &state.strides, state.offset)
    }

    /// Mutable view of writable operand `write` together with a view of
    /// operand `read`.
    pub fn view_pair<R: Element, T: Element>(
        &mut self,
        write: usize,
        read: usize,
    ) -> Result<(StridedViewMut<'_, R>, StridedView<'_, T>)> {
        if write == read {
            return Err(StridedError::OperandIndex {
                operand: read,
                count: self.ops.len(),
            });
        }
        let r = self.op_checked::<T>(read)?;
        let src = unsafe { std::slice::from_raw_parts(r.data as *const T, r.len) };
        let src = StridedView::new(src, &r.dims, &r.strides, r.offset)?;

        let w = self.op_checked::<R>(write)?;
        if w.access != Access::ReadWrite {
            return Err(StridedError::ReadOnlyOperand { operand: write });
        }
        let dst = unsafe { std::slice::from_raw_parts_mut(w.data as *mut R, w.len) };
        let dst = StridedViewMut::new(dst, &w.dims, &w.strides, w.offset)?;
        Ok((dst, src))
    }

    fn op_checked<T: Element>(&self, op: usize) -> Result<&OpState> {
        let state = self.ops.get(op).ok_or(StridedError::OperandIndex {
            operand: op,
            count: self.ops.len(),
        })?;
        if state.dtype != T::DTYPE {
            return Err(StridedError::DTypeMismatch {
                operand: op,
                expected: T::DTYPE,
                found: state.dtype,
            });
        }
        Ok(state)
    }

    fn load_run(&mut self) {
        self.count = self.run_cap.min(self.dims[0] - self.coords[0]);
        let count = self.count;
        for (k, op) in self.ops.iter_mut().enumerate() {
            let delta: isize = self
                .coords
                .iter()
                .zip(&op.byte_strides)
                .map(|(&c, &s)| c as isize * s)
                .sum();
            op.cur = op.origin.wrapping_offset(delta);
            let n = op.buffered_len(count);
            match op.buffer.as_mut() {
                Some(buf) if op.dtype != op.loop_dtype => {
                    let dst = buf.as_mut_ptr();
                    unsafe {
                        cast_run(
                            op.cur,
                            op.dtype,
                            op.byte_strides[0],
                            dst,
                            op.loop_dtype,
                            op.buffer_stride,
                            n,
                            &mut self.fp,
                        );
                    }
                    self.ptrs[k] = dst;
                    self.step_strides[k] = op.buffer_stride;
                }
                _ => {
                    self.ptrs[k] = op.cur;
                    self.step_strides[k] = op.byte_strides[0];
                }
            }
        }
    }

    fn write_back(&mut self) {
        let count = self.count;
        for op in self.ops.iter_mut() {
            if op.access != Access::ReadWrite || !op.is_buffered() {
                continue;
            }
            let n = op.buffered_len(count);
            if let Some(buf) = op.buffer.as_mut() {
                unsafe {
                    cast_run(
                        buf.as_mut_ptr(),
                        op.loop_dtype,
                        op.buffer_stride,
                        op.cur,
                        op.dtype,
                        op.byte_strides[0],
                        n,
                        &mut self.fp,
                    );
                }
            }
        }
    }
}

/// Broadcast all operand shapes together.
///
/// Operands that must not broadcast are visited first so they define the
/// shape and errors blame the operand that disagrees with them.
fn broadcast_shape(operands: &[IterOperand<'_>], rank: usize) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..operands.len()).collect();
    order.sort_by_key(|&i| !operands[i].no_broadcast);

    let mut shape = vec![1usize; rank];
    for &i in &order {
        let op = &operands[i];
        for ax in 0..rank {
            if op.axes.as_ref().is_some_and(|m| matches!(m[ax], AxisMap::ReducedKeepAt(_))) {
                continue;
            }
            let Some((extent, _)) = op.axis(ax, rank) else {
                continue;
            };
            if extent == 1 || extent == shape[ax] {
                continue;
            }
            if shape[ax] == 1 {
                shape[ax] = extent;
            } else {
                return Err(StridedError::NonBroadcastable {
                    operand: i,
                    found: op.dims.clone(),
                    shape: shape.clone(),
                });
            }
        }
    }
    Ok(shape)
}

fn validate_operands(operands: &[IterOperand<'_>], shape: &[usize]) -> Result<()> {
    let rank = shape.len();
    for (i, op) in operands.iter().enumerate() {
        let non_broadcastable = || StridedError::NonBroadcastable {
            operand: i,
            found: op.dims.clone(),
            shape: shape.to_vec(),
        };
        if op.no_broadcast && op.axes.is_none() && op.dims.len() != rank {
            return Err(non_broadcastable());
        }
        for (ax, &extent) in shape.iter().enumerate() {
            let own = op.axis(ax, rank).map_or(1, |(e, _)| e);
            if op.axes.as_ref().is_some_and(|m| matches!(m[ax], AxisMap::ReducedKeepAt(_)))
                && own != 1
            {
                return Err(non_broadcastable());
            }
            if own == extent {
                continue;
            }
            if op.no_broadcast {
                return Err(non_broadcastable());
            }
            if op.is_writable() && !op.is_reduction_axis(ax) {
                return Err(StridedError::WriteBroadcast {
                    operand: i,
                    axis: ax,
                });
            }
        }
    }
    Ok(())
}

/// Replace read operands that may overlap a writable operand by copies.
fn copy_overlapping_inputs(
    operands: &mut [IterOperand<'_>],
    temps: &mut Vec<AlignedBuf>,
) -> Result<()> {
    let written: Vec<(usize, Option<(usize, usize)>)> = operands
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_writable())
        .map(|(j, op)| (j, op.extent_in_bytes()))
        .collect();

    for (i, op) in operands.iter_mut().enumerate() {
        if op.is_writable() {
            continue;
        }
        let extent = op.extent_in_bytes();
        let Some(&(j, _)) = written.iter().find(|(_, w)| extents_overlap(extent, *w)) else {
            continue;
        };
        debug!("NdIter: operand {i} may overlap operand {j}, iterating over a copy");

        let size = op.dtype.size_in_bytes();
        let n: usize = op.dims.iter().product();
        let mut buf = AlignedBuf::zeroed(n * size);
        let dst = buf.as_mut_ptr();
        let dst_strides = row_major_strides(&op.dims);
        let src = op.data.wrapping_offset(op.offset * size as isize);
        unsafe {
            copy_raw(dst, &dst_strides, src, &op.strides, &op.dims, op.dtype)?;
        }
        op.data = dst;
        op.len = n;
        op.offset = 0;
        op.strides = dst_strides;
        temps.push(buf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strided_traits::FpFlags;

    fn buffered() -> IterFlags {
        IterFlags {
            buffered: true,
            external_loop: true,
            grow_inner: true,
            dont_negate_strides: true,
            zerosize_ok: true,
            delay_bufalloc: true,
            copy_if_overlap: true,
        }
    }

    /// Drive a sum of operand 1 into operand 0, both presented as f64.
    fn sum_loop(iter: &mut NdIter<'_>) {
        iter.reset();
        while let Some(step) = iter.step() {
            let (acc, x) = (step.ptrs[0], step.ptrs[1] as *const u8);
            for k in 0..step.count as isize {
                unsafe {
                    let a = acc.offset(k * step.strides[0]) as *mut f64;
                    let v = x.offset(k * step.strides[1]) as *const f64;
                    *a += *v;
                }
            }
            if !iter.advance() {
                break;
            }
        }
    }

    #[test]
    fn test_row_sums_through_axis_map() {
        let src = StridedArray::<f64>::from_fn_row_major(&[2, 3], |i| (i[0] * 3 + i[1]) as f64);
        let mut out = StridedArray::<f64>::row_major(&[2]);
        {
            let ops = vec![
                IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Kept(0), AxisMap::Reduced]),
                IterOperand::readonly(&src.view()).no_broadcast(),
            ];
            let mut iter = NdIter::new(ops, buffered(), Casting::SameKind, 8192).unwrap();
            assert_eq!(iter.iter_size(), 6);
            assert_eq!(iter.shape(), &[2, 3]);
            assert!(!iter.needs_checks());
            sum_loop(&mut iter);
            iter.finish().unwrap();
        }
        assert_eq!(out.to_vec_row_major(), vec![3.0, 12.0]);
    }

    #[test]
    fn test_first_visits_cover_each_output_once() {
        let src = StridedArray::<f64>::from_fn_col_major(&[3, 4, 5], |_| 1.0);
        let mut out = StridedArray::<f64>::row_major(&[3, 1, 5]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![
                AxisMap::Kept(0),
                AxisMap::ReducedKeepAt(1),
                AxisMap::Kept(2),
            ]),
            IterOperand::readonly(&src.view()).no_broadcast(),
        ];
        let flags = IterFlags {
            buffered: false,
            ..buffered()
        };
        let mut iter = NdIter::new(ops, flags, Casting::SameKind, 8192).unwrap();
        iter.reset();
        let mut first = 0;
        let mut total = 0;
        while let Some(step) = iter.step() {
            let p = iter.first_visit_prefix(0);
            assert!(p <= step.count);
            first += p;
            total += step.count;
            if !iter.advance() {
                break;
            }
        }
        assert_eq!(first, 15);
        assert_eq!(total, 60);
        iter.finish().unwrap();
    }

    #[test]
    fn test_buffered_casts_in_and_back() {
        // i32 input and f32 output, both presented to the loop as f64.
        let src = StridedArray::<i32>::from_fn_row_major(&[4, 3], |i| (i[0] * 3 + i[1]) as i32);
        let mut out = StridedArray::<f32>::row_major(&[3]);
        {
            let ops = vec![
                IterOperand::readwrite(&mut out)
                    .with_axes(vec![AxisMap::Reduced, AxisMap::Kept(0)])
                    .with_loop_dtype(DType::F64),
                IterOperand::readonly(&src.view())
                    .no_broadcast()
                    .with_loop_dtype(DType::F64),
            ];
            let mut iter = NdIter::new(ops, buffered(), Casting::SameKind, 2).unwrap();
            // f64 -> f32 write-back is lossy
            assert!(iter.needs_checks());
            sum_loop(&mut iter);
            iter.finish().unwrap();
        }
        assert_eq!(out.to_vec_row_major(), vec![18.0, 22.0, 26.0]);
    }

    #[test]
    fn test_runs_respect_buffer_size() {
        let src = StridedArray::<i64>::from_elem(&[10], 1);
        let mut out = StridedArray::<f64>::row_major(&[]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Reduced]),
            IterOperand::readonly(&src.view()).with_loop_dtype(DType::F64),
        ];
        let mut iter = NdIter::new(ops, buffered(), Casting::SameKind, 4).unwrap();
        iter.reset();
        let mut counts = Vec::new();
        while let Some(step) = iter.step() {
            counts.push(step.count);
            if !iter.advance() {
                break;
            }
        }
        assert_eq!(counts, vec![4, 4, 2]);
        iter.finish().unwrap();
    }

    #[test]
    fn test_invalid_cast_recorded() {
        let src = StridedArray::<f64>::from_fn_row_major(&[3], |i| [1.0, f64::NAN, 2.0][i[0]]);
        let mut out = StridedArray::<i64>::row_major(&[3]);
        let ops = vec![
            IterOperand::readwrite(&mut out),
            IterOperand::readonly(&src.view()).with_loop_dtype(DType::I64),
        ];
        let mut iter = NdIter::new(ops, buffered(), Casting::Unsafe, 8192).unwrap();
        iter.reset();
        assert!(iter.needs_checks());
        assert_eq!(iter.fp_status().flags(), FpFlags::INVALID);
    }

    #[test]
    fn test_casting_rule_enforced() {
        let src = StridedArray::<f64>::row_major(&[3]);
        let mut out = StridedArray::<f64>::row_major(&[3]);
        let ops = vec![
            IterOperand::readwrite(&mut out),
            IterOperand::readonly(&src.view()).with_loop_dtype(DType::I32),
        ];
        let err = NdIter::new(ops, buffered(), Casting::SameKind, 8192).err();
        assert!(matches!(
            err,
            Some(StridedError::Casting {
                operand: 1,
                from: DType::F64,
                to: DType::I32,
                casting: Casting::SameKind
            })
        ));
    }

    #[test]
    fn test_cast_without_buffering_rejected() {
        let src = StridedArray::<f32>::row_major(&[3]);
        let mut out = StridedArray::<f64>::row_major(&[3]);
        let ops = vec![
            IterOperand::readwrite(&mut out),
            IterOperand::readonly(&src.view()).with_loop_dtype(DType::F64),
        ];
        let flags = IterFlags {
            buffered: false,
            ..buffered()
        };
        let err = NdIter::new(ops, flags, Casting::Safe, 8192).err();
        assert!(matches!(err, Some(StridedError::BufferingRequired { operand: 1 })));
    }

    #[test]
    fn test_output_shape_errors() {
        let src = StridedArray::<f64>::row_major(&[2, 3]);

        // kept axis with the wrong extent
        let mut out = StridedArray::<f64>::row_major(&[4]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Kept(0), AxisMap::Reduced]),
            IterOperand::readonly(&src.view()).no_broadcast(),
        ];
        let err = NdIter::new(ops, buffered(), Casting::SameKind, 8192).err();
        assert!(matches!(err, Some(StridedError::NonBroadcastable { operand: 0, .. })));

        // kept axis of extent 1 would be written repeatedly
        let mut out = StridedArray::<f64>::row_major(&[1]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Kept(0), AxisMap::Reduced]),
            IterOperand::readonly(&src.view()).no_broadcast(),
        ];
        let err = NdIter::new(ops, buffered(), Casting::SameKind, 8192).err();
        assert!(matches!(
            err,
            Some(StridedError::WriteBroadcast { operand: 0, axis: 0 })
        ));

        // keepdims axis must have extent 1
        let mut out = StridedArray::<f64>::row_major(&[2, 3]);
        let ops = vec![
            IterOperand::readwrite(&mut out)
                .with_axes(vec![AxisMap::Kept(0), AxisMap::ReducedKeepAt(1)]),
            IterOperand::readonly(&src.view()).no_broadcast(),
        ];
        let err = NdIter::new(ops, buffered(), Casting::SameKind, 8192).err();
        assert!(matches!(err, Some(StridedError::NonBroadcastable { operand: 0, .. })));
    }

    #[test]
    fn test_no_broadcast_operand() {
        // The mask may not stretch the operand it is paired with.
        let src = StridedArray::<f64>::row_major(&[1, 3]);
        let mask = StridedArray::<bool>::row_major(&[2, 3]);
        let mut out = StridedArray::<f64>::row_major(&[]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Reduced, AxisMap::Reduced]),
            IterOperand::readonly(&src.view()).no_broadcast(),
            IterOperand::readonly(&mask.view()),
        ];
        let err = NdIter::new(ops, buffered(), Casting::SameKind, 8192).err();
        assert!(matches!(err, Some(StridedError::NonBroadcastable { operand: 1, .. })));
    }

    #[test]
    fn test_zero_size() {
        let src = StridedArray::<f64>::row_major(&[0, 3]);
        let mut out = StridedArray::<f64>::row_major(&[3]);
        let ops = || vec![IterOperand::readonly(&src.view()).no_broadcast()];
        let strict = IterFlags {
            zerosize_ok: false,
            ..buffered()
        };
        assert!(matches!(
            NdIter::new(ops(), strict, Casting::SameKind, 8192).err(),
            Some(StridedError::ZeroSize)
        ));

        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Reduced, AxisMap::Kept(0)]),
            IterOperand::readonly(&src.view()).no_broadcast(),
        ];
        let mut iter = NdIter::new(ops, buffered(), Casting::SameKind, 8192).unwrap();
        iter.reset();
        assert_eq!(iter.iter_size(), 0);
        assert!(iter.step().is_none());
        assert!(!iter.advance());
        iter.finish().unwrap();
    }

    #[test]
    fn test_negative_strides_flipped_unless_forbidden() {
        let data: Vec<f64> = (0..4).map(|x| x as f64).collect();
        let rev = StridedView::new(&data, &[4], &[-1], 3).unwrap();
        for dont_negate in [false, true] {
            let mut out = StridedArray::<f64>::row_major(&[]);
            let flags = IterFlags {
                dont_negate_strides: dont_negate,
                ..buffered()
            };
            let ops = vec![
                IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Reduced]),
                IterOperand::readonly(&rev),
            ];
            let mut iter = NdIter::new(ops, flags, Casting::SameKind, 8192).unwrap();
            iter.reset();
            let step = iter.step().unwrap();
            let expected = if dont_negate { -8 } else { 8 };
            assert_eq!(step.strides[1], expected);
            sum_loop(&mut iter);
            iter.finish().unwrap();
            assert_eq!(out.get(&[]), 6.0);
        }
    }

    #[test]
    fn test_overlapping_input_is_copied() {
        // out[i + 1] += in[i] where in aliases out. Without a copy the
        // running sums would leak into later reads.
        let mut data = vec![1.0f64, 2.0, 3.0, 4.0];
        let base = data.as_mut_ptr() as *mut u8;
        let ops = unsafe {
            vec![
                IterOperand::from_raw_parts(base, 4, DType::F64, &[3], &[1], 1, Access::ReadWrite)
                    .unwrap(),
                IterOperand::from_raw_parts(base, 4, DType::F64, &[3], &[1], 0, Access::ReadOnly)
                    .unwrap(),
            ]
        };
        let flags = IterFlags {
            external_loop: false,
            ..buffered()
        };
        let mut iter = NdIter::new(ops, flags, Casting::SameKind, 8192).unwrap();
        sum_loop(&mut iter);
        iter.finish().unwrap();
        assert_eq!(data, vec![1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_finish_reports_incomplete_traversal() {
        let src = StridedArray::<f64>::from_elem(&[5], 1.0);
        let mut out = StridedArray::<f64>::row_major(&[]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Reduced]),
            IterOperand::readonly(&src.view()),
        ];
        let flags = IterFlags {
            external_loop: false,
            ..buffered()
        };
        let mut iter = NdIter::new(ops, flags, Casting::SameKind, 8192).unwrap();
        iter.reset();
        assert!(iter.advance());
        assert!(matches!(
            iter.finish(),
            Err(StridedError::IncompleteTraversal { remaining: 4 })
        ));
    }

    #[test]
    fn test_operand_views() {
        let src = StridedArray::<i16>::from_fn_row_major(&[2, 2], |i| (i[0] * 2 + i[1]) as i16);
        let mut out = StridedArray::<i64>::row_major(&[2]);
        let ops = vec![
            IterOperand::readwrite(&mut out).with_axes(vec![AxisMap::Kept(0), AxisMap::Reduced]),
            IterOperand::readonly(&src.view()),
        ];
        let mut iter = NdIter::new(ops, buffered(), Casting::SameKind, 8192).unwrap();
        {
            let (mut dst, input) = iter.view_pair::<i64, i16>(0, 1).unwrap();
            dst.set(&[1], input.get(&[1, 1]) as i64);
        }
        assert_eq!(iter.operand_view::<i64>(0).unwrap().get(&[1]), 3);
        assert!(matches!(
            iter.operand_view::<f64>(0),
            Err(StridedError::DTypeMismatch { operand: 0, .. })
        ));
        assert!(matches!(
            iter.operand_view_mut::<i16>(1),
            Err(StridedError::ReadOnlyOperand { operand: 1 })
        ));
        assert!(matches!(
            iter.operand_view::<i16>(5),
            Err(StridedError::OperandIndex { operand: 5, count: 2 })
        ));
    }
}
