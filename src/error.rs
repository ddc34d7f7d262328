use strided_kernel::StridedError;
use strided_traits::FpFlags;

/// Boxed error raised by an accumulation kernel.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during a reduction.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    #[error("zero-size array to reduction operation {op} which has no identity")]
    EmptyReduction { op: String },

    #[error(
        "reduction operation '{op}' is not reorderable, so at most one axis may be specified \
         (got {naxes})"
    )]
    NonReorderableMultiAxis { op: String, naxes: usize },

    #[error(
        "reduction operation '{op}' does not have an identity, so to use a where mask one has \
         to specify 'initial'"
    )]
    WhereWithoutIdentity { op: String },

    #[error(
        "output parameter for reduction operation {op} has the wrong number of dimensions: \
         Found {found} but expected {expected}{}",
        if *keepdims { " (must match the operand's when keepdims=True)" } else { "" }
    )]
    OutputShapeMismatch {
        op: String,
        found: usize,
        expected: usize,
        keepdims: bool,
    },

    /// Layout, broadcasting and casting errors from the traversal.
    #[error(transparent)]
    Strided(#[from] StridedError),

    /// An error returned or deferred by the accumulation kernel.
    #[error(transparent)]
    Accumulation(BoxError),

    #[error("floating point {flags} encountered in {op}")]
    FloatingPoint { op: String, flags: FpFlags },

    #[error("failed to release the traversal of {op}")]
    ResourceRelease {
        op: String,
        #[source]
        source: StridedError,
    },

    #[error("axis {axis} is out of bounds for array of dimension {rank}")]
    AxisOutOfRange { axis: isize, rank: usize },

    #[error("duplicate value in 'axis': {axis}")]
    DuplicateAxis { axis: usize },

    #[error("axis flags have length {found} but the operand has rank {expected}")]
    AxisFlagsLength { expected: usize, found: usize },
}

/// Convenience alias for `Result<T, ReduceError>`.
pub type Result<T> = std::result::Result<T, ReduceError>;
