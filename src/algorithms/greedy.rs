use std::iter::Sum;
use std::ops::AddAssign;

use num_traits::Zero;
use rand::Rng;
use rayon::iter::IntoParallelIterator as _;
use rayon::iter::ParallelIterator as _;

use super::Error;
use super::UNASSIGNED;
use crate::CommMatrix;

/// Default number of randomized attempts per call.
pub const MAX_TRIALS: usize = 10;

/// Pre-assign the filler ("dummy") slots implied by the constraint list.
///
/// Each part `i` stands for the topology subtree owning the slot range
/// `[i * width, (i + 1) * width)`; the part owes as many dummy slots as its
/// range has unconstrained leaves.  Dummy slots are taken from the trailing
/// indices of the local slot space, which never hold real entities.
fn place_dummies(
    assignment: &mut [usize],
    sizes: &mut [usize],
    constraints: &[usize],
    part_count: usize,
) {
    if constraints.is_empty() {
        return;
    }
    let width = assignment.len() / part_count;
    let mut start = 0;
    let mut dummy_slot = assignment.len() - 1;
    for part in 0..part_count {
        let range_end = (part + 1) * width;
        let mut end = start;
        while end < constraints.len() && constraints[end] < range_end {
            end += 1;
        }
        let dummies = width - (end - start);
        for _ in 0..dummies {
            assignment[dummy_slot] = part;
            dummy_slot = dummy_slot.wrapping_sub(1);
        }
        sizes[part] += dummies;
        start = end;
    }
}

/// Assign `slot` to the part with the highest total affinity among the parts
/// that still have room.  Ties keep the lowest part id; filler slots (beyond
/// the matrix order) ignore affinity and join the first part encountered in
/// slot-scan order that has room.
fn allocate_vertex<W>(
    slot: usize,
    assignment: &mut [usize],
    matrix: &CommMatrix<W>,
    sizes: &mut [usize],
    max_size: usize,
) where
    W: Copy + PartialOrd + AddAssign + Zero,
{
    let part_count = sizes.len();
    let mut best_part = 0;
    if slot >= matrix.order() {
        for &part in assignment.iter() {
            if part != UNASSIGNED && sizes[part] < max_size {
                best_part = part;
                break;
            }
        }
    } else {
        let mut affinity = vec![W::zero(); part_count];
        let mut populated = vec![false; part_count];
        for (other, &part) in assignment.iter().enumerate() {
            if part == UNASSIGNED {
                continue;
            }
            populated[part] = true;
            if other < matrix.order() {
                affinity[part] += matrix.get(slot, other);
            }
        }
        let mut best: Option<W> = None;
        for part in 0..part_count {
            if !populated[part] || sizes[part] >= max_size {
                continue;
            }
            if best.map_or(true, |best| best < affinity[part]) {
                best = Some(affinity[part]);
                best_part = part;
            }
        }
    }
    assignment[slot] = best_part;
    sizes[best_part] += 1;
}

/// Total weight of the real-entity pairs split across different parts.
pub(crate) fn eval_cost<W>(assignment: &[usize], matrix: &CommMatrix<W>) -> W
where
    W: Copy + AddAssign + Zero + Sum + Send + Sync,
{
    (0..matrix.order())
        .into_par_iter()
        .map(|i| {
            let mut cut = W::zero();
            for j in (i + 1)..matrix.order() {
                if assignment[i] != assignment[j] {
                    cut += matrix.get(i, j);
                }
            }
            cut
        })
        .sum()
}

/// Randomized greedy k-way partitioning, keeping the lowest-cost result over
/// `trials` independent attempts.
pub(crate) fn kpartition_greedy<W, R>(
    part_ids: &mut [usize],
    matrix: &CommMatrix<W>,
    constraints: &[usize],
    part_count: usize,
    trials: usize,
    rng: &mut R,
) -> Result<W, Error>
where
    W: Copy + PartialOrd + AddAssign + Zero + Sum + Send + Sync,
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
    let max_size = size / part_count;
    tracing::debug!(max_size, size, part_count, order = matrix.order(), "greedy partitioning");

    let mut best: Option<(W, Vec<usize>)> = None;
    for _ in 0..trials.max(1) {
        let mut assignment = vec![UNASSIGNED; size];
        let mut sizes = vec![0; part_count];

        place_dummies(&mut assignment, &mut sizes, constraints, part_count);

        // Seed each part that dummies did not fill with a random free slot.
        for part in 0..part_count {
            if sizes[part] >= max_size {
                continue;
            }
            let seed = loop {
                let candidate = rng.gen_range(0..size);
                if assignment[candidate] == UNASSIGNED {
                    break candidate;
                }
            };
            assignment[seed] = part;
            sizes[part] += 1;
        }

        // Grow each part by affinity, in slot-scan order.
        for slot in 0..size {
            if assignment[slot] == UNASSIGNED {
                allocate_vertex(slot, &mut assignment, matrix, &mut sizes, max_size);
            }
        }

        let cost = eval_cost(&assignment, matrix);
        match &best {
            Some((best_cost, _)) if !(cost < *best_cost) => {}
            _ => best = Some((cost, assignment)),
        }
    }

    // Will not panic: the loop above runs at least once.
    let (cost, assignment) = best.unwrap();
    part_ids.copy_from_slice(&assignment);
    Ok(cost)
}

/// Greedy randomized k-way partitioning of a communication matrix.
///
/// Runs [`trials`] independent attempts, each seeding every part with a
/// random slot and then growing parts greedily by communication affinity, and
/// keeps the attempt with the lowest cross-part communication volume.  The
/// winning cost is returned as the run metadata.
///
/// # Example
///
/// ```rust
/// use affinitree::Partition as _;
///
/// let matrix = affinitree::CommMatrix::from_rows(vec![
///     vec![0.0, 9.0, 0.0, 0.0],
///     vec![9.0, 0.0, 0.0, 0.0],
///     vec![0.0, 0.0, 0.0, 9.0],
///     vec![0.0, 0.0, 9.0, 0.0],
/// ]).unwrap();
/// let mut partition = [0; 4];
///
/// let cost = affinitree::Greedy { part_count: 2, trials: 10, rng: rand::thread_rng() }
///     .partition(&mut partition, (&matrix, [].as_slice()))
///     .unwrap();
/// assert_eq!(cost, 0.0);
/// ```
///
/// [`trials`]: Greedy::trials
#[derive(Debug)]
pub struct Greedy<R> {
    pub part_count: usize,
    pub trials: usize,
    pub rng: R,
}

impl<'a, W, R> crate::Partition<(&'a CommMatrix<W>, &'a [usize])> for Greedy<R>
where
    W: Copy + PartialOrd + AddAssign + Zero + Sum + Send + Sync,
    R: Rng,
{
    type Metadata = W;
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
        kpartition_greedy(
            part_ids,
            matrix,
            constraints,
            self.part_count,
            self.trials,
            &mut self.rng,
        )
    }
}
