use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;

use num_traits::Zero;
use rand::Rng;

use crate::CommMatrix;

mod external;
mod greedy;

pub use external::BackendError;
pub use external::External;
pub use external::FixedVertexBackend;
pub use external::StrategyHint;
pub use greedy::Greedy;
pub use greedy::MAX_TRIALS;

/// Sentinel part id of a slot that has not been assigned yet.
///
/// Partition arrays handed to a [`FixedVertexBackend`] use this value to mark
/// the slots the backend is free to place; every other entry is a hard
/// constraint the backend must keep.
pub const UNASSIGNED: usize = usize::MAX;

/// Common errors thrown by algorithms.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The problem size is not a multiple of the number of parts; partitioning
    /// into non-equal parts is unsupported.
    UnevenPartition { size: usize, part_count: usize },

    /// More constrained slots than the problem (or the topology) can hold.
    TooManyConstraints { count: usize, limit: usize },

    /// The topology has fewer leaves than there are entities to place.
    NotEnoughCapacity { entities: usize, capacity: usize },

    /// Constraint values are not strictly increasing or out of range.
    MalformedConstraints,

    /// Input sets don't have matching lengths.
    InputLenMismatch { expected: usize, actual: usize },

    /// Input contains negative values and such values are not supported.
    NegativeValues,

    /// A communication matrix is not symmetric.
    Asymmetric { row: usize, col: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnevenPartition { size, part_count } => {
                write!(f, "cannot partition {size} elements in {part_count} parts")
            }
            Error::TooManyConstraints { count, limit } => {
                write!(f, "more constraints ({count}) than the problem size ({limit})")
            }
            Error::NotEnoughCapacity { entities, capacity } => {
                write!(f, "not enough leaves ({capacity}) for {entities} entities")
            }
            Error::MalformedConstraints => {
                write!(f, "constraints must be strictly increasing and in range")
            }
            Error::InputLenMismatch { expected, actual } => write!(
                f,
                "input sets don't have the same length (expected {expected} items, got {actual})",
            ),
            Error::NegativeValues => write!(f, "input contains negative values"),
            Error::Asymmetric { row, col } => {
                write!(f, "communication matrix is not symmetric at ({row}, {col})")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Compute a balanced k-way partition of a (possibly padded) communication
/// problem, dispatching to the available backend.
///
/// `part_ids.len()` is the true problem size and may exceed `matrix.order()`
/// when filler slots pad the problem; `constraints` is the ascending list of
/// slots already bound to specific leaves.
///
/// The external `backend` is used when one is given and `force_greedy` is
/// unset; every other case runs the greedy partitioner with `trials`
/// attempts.
///
/// # Errors
///
/// - [`Error::UnevenPartition`] if the problem size is not a multiple of
///   `part_count`,
/// - [`Error::TooManyConstraints`] if `constraints` is longer than the
///   problem,
/// - [`Error::InputLenMismatch`] if the matrix order exceeds the problem
///   size.
pub fn k_way_partition<W, R>(
    part_ids: &mut [usize],
    matrix: &CommMatrix<W>,
    constraints: &[usize],
    part_count: usize,
    backend: Option<&mut dyn FixedVertexBackend<W>>,
    force_greedy: bool,
    trials: usize,
    rng: &mut R,
) -> Result<(), Error>
where
    W: Copy + PartialOrd + AddAssign + Add<Output = W> + Zero + Sum + Send + Sync,
    R: Rng + ?Sized,
{
    let size = part_ids.len();
    if part_count == 0 || size % part_count != 0 {
        tracing::error!(size, part_count, "cannot split into equal parts");
        return Err(Error::UnevenPartition { size, part_count });
    }
    if matrix.order() > size {
        return Err(Error::InputLenMismatch {
            expected: size,
            actual: matrix.order(),
        });
    }
    match backend {
        Some(backend) if !force_greedy => {
            tracing::debug!("using the external partitioner");
            external::kpartition_backend(part_ids, matrix, constraints, part_count, backend, trials, rng)
        }
        _ => {
            tracing::debug!("using greedy partitioning");
            greedy::kpartition_greedy(part_ids, matrix, constraints, part_count, trials, rng)
                .map(|_cost| ())
        }
    }
}
