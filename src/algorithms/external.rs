use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;

use num_traits::Zero;
use rand::Rng;
use sprs::CsMatView;

use super::greedy::kpartition_greedy;
use super::Error;
use super::UNASSIGNED;
use crate::imbalance::is_exactly_balanced;
use crate::CommMatrix;

/// Error reported by a [`FixedVertexBackend`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Tuning hint handed to the backend, trading partition quality against
/// runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyHint {
    /// Favor exact balance; requested for small part counts.
    Balance,
    /// Favor speed; requested when the part count exceeds four.
    Speed,
}

/// A balanced graph partitioner with fixed-vertex support.
///
/// `part_ids` holds one entry per graph vertex: entries equal to
/// [`UNASSIGNED`] are free and must be filled by the backend, every other
/// entry is a hard constraint to keep as-is.  `adjacency` is the symmetric
/// weighted adjacency of the same vertices.
pub trait FixedVertexBackend<W> {
    fn partition_fixed(
        &mut self,
        adjacency: CsMatView<'_, W>,
        part_count: usize,
        hint: StrategyHint,
        part_ids: &mut [usize],
    ) -> Result<(), BackendError>;
}

impl<W, B> FixedVertexBackend<W> for &mut B
where
    B: FixedVertexBackend<W> + ?Sized,
{
    fn partition_fixed(
        &mut self,
        adjacency: CsMatView<'_, W>,
        part_count: usize,
        hint: StrategyHint,
        part_ids: &mut [usize],
    ) -> Result<(), BackendError> {
        (**self).partition_fixed(adjacency, part_count, hint, part_ids)
    }
}

/// The adjacency of the first `vertex_count` slots; only slots below the
/// matrix order carry edges, the rest are filler.
fn backend_graph<W>(matrix: &CommMatrix<W>, vertex_count: usize) -> sprs::CsMat<W>
where
    W: Copy + PartialEq + Zero + Add<Output = W>,
{
    let real = vertex_count.min(matrix.order());
    let mut graph = sprs::TriMat::new((vertex_count, vertex_count));
    for i in 0..real {
        for j in 0..real {
            if i == j {
                continue;
            }
            let w = matrix.get(i, j);
            if w != W::zero() {
                graph.add_triplet(i, j, w);
            }
        }
    }
    graph.to_csr()
}

/// Run the external backend on the constrained problem, with exact-balance
/// verification and greedy fallback.
///
/// The constraint list is encoded as fixed vertices: each part owes as many
/// dummy slots as its subtree range has unconstrained leaves.  Only the
/// excess of each part's dummy count over the global minimum is materialized
/// as fixed slots in a prefix of the problem; the per-part minimum quota is
/// appended past the reduced problem size `p`, so the backend balances the
/// truly flexible slots over a `p`-vertex graph instead of the full problem.
///
/// # Panics
///
/// Panics if the backend itself fails; there is no recovery path for a
/// backend-level crash.  A backend that merely returns an unbalanced
/// partition is recovered from by re-running the greedy partitioner.
pub(crate) fn kpartition_backend<W, B, R>(
    part_ids: &mut [usize],
    matrix: &CommMatrix<W>,
    constraints: &[usize],
    part_count: usize,
    backend: &mut B,
    trials: usize,
    rng: &mut R,
) -> Result<(), Error>
where
    W: Copy + PartialOrd + AddAssign + Add<Output = W> + Zero + Sum + Send + Sync,
    B: FixedVertexBackend<W> + ?Sized,
    R: Rng + ?Sized,
{
    let size = part_ids.len();
    if constraints.len() > size {
        tracing::error!(
            count = constraints.len(),
            size,
            "more constraints than the problem size"
        );
        return Err(Error::TooManyConstraints {
            count: constraints.len(),
            limit: size,
        });
    }

    let width = size / part_count;
    let mut fixed = vec![UNASSIGNED; size];
    let reduced_size;
    if constraints.is_empty() {
        reduced_size = size;
    } else {
        let mut dummies = vec![0; part_count];
        let mut dummy_sum = 0;
        let mut dummy_min = size;
        let mut start = 0;
        for part in 0..part_count {
            let range_end = (part + 1) * width;
            let mut end = start;
            while end < constraints.len() && constraints[end] < range_end {
                end += 1;
            }
            dummies[part] = width - (end - start);
            dummy_sum += dummies[part];
            dummy_min = dummy_min.min(dummies[part]);
            start = end;
        }

        // Fix only the excess-over-minimum dummies, compacted right after the
        // free slots; the per-part minimum quota goes past the reduced
        // problem and is never seen by the backend.
        let mut next = size - dummy_sum;
        for part in 0..part_count {
            for _ in 0..dummies[part] - dummy_min {
                fixed[next] = part;
                next += 1;
            }
        }
        reduced_size = next;
        for part in 0..part_count {
            for _ in 0..dummy_min {
                fixed[next] = part;
                next += 1;
            }
        }
    }

    let hint = if part_count <= 4 {
        StrategyHint::Balance
    } else {
        StrategyHint::Speed
    };

    let graph = backend_graph(matrix, reduced_size);
    tracing::debug!(reduced_size, size, ?hint, "invoking the external partitioner");
    if let Err(err) = backend.partition_fixed(
        graph.view(),
        part_count,
        hint,
        &mut fixed[..reduced_size],
    ) {
        tracing::error!(error = %err, "external partitioner failed");
        panic!("external partitioner failed: {err}");
    }

    if !is_exactly_balanced(&fixed, part_count) {
        tracing::info!("unbalanced external partition, falling back to greedy partitioning");
        return kpartition_greedy(part_ids, matrix, constraints, part_count, trials, rng)
            .map(|_cost| ());
    }

    part_ids.copy_from_slice(&fixed);
    tracing::debug!("external partitioning done");
    Ok(())
}

/// Adapter around an external balanced graph partitioner.
///
/// Pre-fixed constraint slots are encoded as fixed vertices before invoking
/// the backend; the result is verified to be exactly balanced and the
/// [`Greedy`] partitioner is used as a fallback when it is not.
///
/// [`Greedy`]: crate::Greedy
#[derive(Debug)]
pub struct External<B, R> {
    pub part_count: usize,
    pub backend: B,
    /// Trial count of the greedy fallback.
    pub trials: usize,
    pub rng: R,
}

impl<'a, W, B, R> crate::Partition<(&'a CommMatrix<W>, &'a [usize])> for External<B, R>
where
    W: Copy + PartialOrd + AddAssign + Add<Output = W> + Zero + Sum + Send + Sync,
    B: FixedVertexBackend<W>,
    R: Rng,
{
    type Metadata = ();
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        (matrix, constraints): (&'a CommMatrix<W>, &'a [usize]),
    ) -> Result<Self::Metadata, Self::Error> {
        if self.part_count == 0 || part_ids.len() % self.part_count != 0 {
            return Err(Error::UnevenPartition {
                size: part_ids.len(),
                part_count: self.part_count,
            });
        }
        if matrix.order() > part_ids.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: matrix.order(),
            });
        }
        kpartition_backend(
            part_ids,
            matrix,
            constraints,
            self.part_count,
            &mut self.backend,
            self.trials,
            &mut self.rng,
        )
    }
}
