//! Helpers to inspect how part ids are spread over a partition.

use itertools::Itertools as _;

/// Number of elements assigned to each part.
///
/// Part ids outside of `0..part_count` (e.g. [`UNASSIGNED`] slots during
/// construction) are not counted.
///
/// [`UNASSIGNED`]: crate::UNASSIGNED
pub fn part_sizes(partition: &[usize], part_count: usize) -> Vec<usize> {
    let counts = partition.iter().copied().counts();
    (0..part_count)
        .map(|part| counts.get(&part).copied().unwrap_or(0))
        .collect()
}

/// Whether every part id in `0..part_count` occurs exactly
/// `partition.len() / part_count` times.
pub fn is_exactly_balanced(partition: &[usize], part_count: usize) -> bool {
    if part_count == 0 || partition.len() % part_count != 0 {
        return false;
    }
    let target = partition.len() / part_count;
    partition.iter().all(|&part| part < part_count)
        && part_sizes(partition, part_count)
            .iter()
            .all(|&size| size == target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(part_sizes(&[0, 1, 1, 2, 1], 3), vec![1, 3, 1]);
        assert_eq!(part_sizes(&[], 2), vec![0, 0]);
        assert_eq!(part_sizes(&[usize::MAX, 0], 2), vec![1, 0]);
    }

    #[test]
    fn exact_balance() {
        assert!(is_exactly_balanced(&[0, 1, 1, 0], 2));
        assert!(!is_exactly_balanced(&[0, 0, 1, 0], 2));
        assert!(!is_exactly_balanced(&[0, 1, 2, 0], 2));
        assert!(!is_exactly_balanced(&[0, 1, 0], 2));
        assert!(!is_exactly_balanced(&[0, 1], 0));
    }
}
