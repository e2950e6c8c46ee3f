//! Derivation of independent sub-problems from a partition assignment.

use crate::CommMatrix;

/// One recursion child: the sub-matrix of its real entities, its slice of the
/// local vertex map and its re-based constraint list.
#[derive(Clone, Debug)]
pub(crate) struct SubProblem<W> {
    pub matrix: CommMatrix<W>,
    pub vertices: Vec<Option<usize>>,
    pub constraints: Vec<usize>,
}

/// For each part, the ascending list of real-entity indices assigned to it.
///
/// # Panics
///
/// Panics if a part collects more than `partition.len() / part_count` real
/// entities; this is a data-consistency bug upstream, not a runtime
/// condition.
fn permutations(partition: &[usize], order: usize, part_count: usize) -> Vec<Vec<usize>> {
    let target = partition.len() / part_count;
    (0..part_count)
        .map(|part| {
            let perm: Vec<usize> = (0..order).filter(|&j| partition[j] == part).collect();
            if perm.len() > target {
                tracing::error!(
                    part,
                    len = perm.len(),
                    target,
                    "too many elements of the partition for the permutation"
                );
                panic!(
                    "part {part} holds {} real entities, expected at most {target}",
                    perm.len()
                );
            }
            perm
        })
        .collect()
}

/// Split the communication matrix along the partition: sub-matrix `i` is
/// indexed by the ascending real-entity indices of part `i`.
pub(crate) fn split_matrix<W>(
    matrix: &CommMatrix<W>,
    partition: &[usize],
    part_count: usize,
) -> Vec<CommMatrix<W>>
where
    W: Copy,
{
    permutations(partition, matrix.order(), part_count)
        .iter()
        .map(|perm| matrix.extract(perm))
        .collect()
}

/// Split the local vertex map along the partition, preserving slot order and
/// filler sentinels.
pub(crate) fn split_vertices(
    vertices: &[Option<usize>],
    partition: &[usize],
    part_count: usize,
) -> Vec<Vec<Option<usize>>> {
    (0..part_count)
        .map(|part| {
            (0..vertices.len())
                .filter(|&j| partition[j] == part)
                .map(|j| vertices[j])
                .collect()
        })
        .collect()
}

/// Split the constraint list by value range: subtree `i` owns the values in
/// `[i * leaf_width, (i + 1) * leaf_width)`, re-based to its own coordinates.
///
/// # Panics
///
/// Panics if a subtree receives more constraints than its capacity `target`;
/// this is a data-consistency bug upstream.
pub(crate) fn split_constraints(
    constraints: &[usize],
    part_count: usize,
    leaf_width: usize,
    target: usize,
) -> Vec<Vec<usize>> {
    let mut start = 0;
    (0..part_count)
        .map(|part| {
            let range_end = (part + 1) * leaf_width;
            let mut end = start;
            while end < constraints.len() && constraints[end] < range_end {
                end += 1;
            }
            if end - start > target {
                tracing::error!(
                    part,
                    len = end - start,
                    target,
                    "constraint subtree overflows its capacity"
                );
                panic!(
                    "subtree {part} received {} constraints, expected at most {target}",
                    end - start
                );
            }
            let base = part * leaf_width;
            let sub = constraints[start..end].iter().map(|c| c - base).collect();
            start = end;
            sub
        })
        .collect()
}

/// Materialize the k sub-problems of one recursion fan-out.
pub(crate) fn split_problem<W>(
    matrix: &CommMatrix<W>,
    partition: &[usize],
    vertices: &[Option<usize>],
    constraints: &[usize],
    part_count: usize,
    leaf_width: usize,
) -> Vec<SubProblem<W>>
where
    W: Copy,
{
    let target = partition.len() / part_count;
    let matrices = split_matrix(matrix, partition, part_count);
    let vertex_maps = split_vertices(vertices, partition, part_count);
    let constraint_lists = split_constraints(constraints, part_count, leaf_width, target);
    matrices
        .into_iter()
        .zip(vertex_maps)
        .zip(constraint_lists)
        .map(|((matrix, vertices), constraints)| SubProblem {
            matrix,
            vertices,
            constraints,
        })
        .collect()
}
