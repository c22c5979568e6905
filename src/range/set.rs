// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Operations over range sets.
//!
//! A range set is a slice of [`IndexRange`] that is **normalized**: sorted by
//! first index, pairwise disjoint, and with no two touching ranges left
//! unmerged. [`normalize`] establishes this; every other function here
//! expects and preserves it.
//!
//! # Examples
//!
//! ```rust
//! use virtualizing_cache::range::set::{merge, normalize, subtract};
//! use virtualizing_cache::IndexRange;
//!
//! let r = |a, b| IndexRange::new(a, b).unwrap();
//!
//! let visible = normalize([r(9, 10), r(0, 4)]);
//! assert_eq!(merge(&visible, r(7, 13)), vec![r(0, 4), r(7, 13)]);
//! assert_eq!(subtract(&[r(0, 6), r(8, 10)], r(4, 9)), vec![r(0, 3), r(10, 10)]);
//! ```

use super::IndexRange;

/// What [`search`] reports when no range contains the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Approximation {
    /// Report no position.
    Exact,
    /// Report the nearest range ending before the index.
    NearestLeft,
    /// Report the nearest range starting after the index.
    NearestRight,
}

/// Result of a [`search`] over a range set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSearch {
    /// Whether some range contains the index.
    pub found: bool,
    /// Position in the slice of the containing range, or of the neighbor
    /// selected by the [`Approximation`] when not found.
    pub position: Option<usize>,
}

/// Sorts ranges and merges overlapping or adjacent ones into a minimal cover.
pub fn normalize(ranges: impl IntoIterator<Item = IndexRange>) -> Vec<IndexRange> {
    let mut sorted: Vec<IndexRange> = ranges.into_iter().collect();
    sorted.sort_unstable();

    let mut normalized: Vec<IndexRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match normalized.last_mut() {
            Some(last) => match last.try_union(&range) {
                Some(union) => *last = union,
                None => normalized.push(range),
            },
            None => normalized.push(range),
        }
    }
    normalized
}

/// Whether a slice already satisfies the normalized invariant.
pub fn is_normalized(ranges: &[IndexRange]) -> bool {
    ranges
        .windows(2)
        .all(|pair| pair[0].last().saturating_add(1) < pair[1].first())
}

/// Binary search for the range containing `index`.
pub fn search(ranges: &[IndexRange], index: usize, approximation: Approximation) -> RangeSearch {
    // First range that does not end before the index
    let insertion = ranges.partition_point(|range| range.last() < index);

    if ranges
        .get(insertion)
        .is_some_and(|range| range.first() <= index)
    {
        return RangeSearch {
            found: true,
            position: Some(insertion),
        };
    }

    let position = match approximation {
        Approximation::Exact => None,
        Approximation::NearestLeft => insertion.checked_sub(1),
        Approximation::NearestRight => (insertion < ranges.len()).then_some(insertion),
    };

    RangeSearch {
        found: false,
        position,
    }
}

/// Whether any range in the set contains `index`.
pub fn contains(ranges: &[IndexRange], index: usize) -> bool {
    search(ranges, index, Approximation::Exact).found
}

/// Adds `other` to the set.
pub fn merge(ranges: &[IndexRange], other: IndexRange) -> Vec<IndexRange> {
    normalize(ranges.iter().copied().chain(std::iter::once(other)))
}

/// Removes `other`'s extent from the set, splitting ranges as needed.
pub fn subtract(ranges: &[IndexRange], other: IndexRange) -> Vec<IndexRange> {
    let mut remaining = Vec::with_capacity(ranges.len() + 1);
    for range in ranges {
        if range.is_disjoint(&other) {
            remaining.push(*range);
            continue;
        }
        let (left, right) = other.difference(range);
        remaining.extend(left);
        remaining.extend(right);
    }
    remaining
}

/// Removes every range of `others` from the set.
pub fn subtract_all(ranges: &[IndexRange], others: &[IndexRange]) -> Vec<IndexRange> {
    others
        .iter()
        .fold(ranges.to_vec(), |acc, other| subtract(&acc, *other))
}

/// Whether two normalized sets cover different indices.
pub fn differs(current: &[IndexRange], requested: &[IndexRange]) -> bool {
    current != requested
}

/// Total number of indices covered by the set.
pub fn covered_len(ranges: &[IndexRange]) -> usize {
    ranges.iter().map(IndexRange::len).sum()
}

/// Iterator over every covered index, in ascending order.
pub fn indices(ranges: &[IndexRange]) -> impl Iterator<Item = usize> + '_ {
    ranges.iter().flat_map(IndexRange::indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    #[test]
    fn test_normalize_sorts_and_merges() {
        let normalized = normalize([r(9, 10), r(0, 2), r(3, 4), r(10, 12), r(20, 20)]);
        assert_eq!(normalized, vec![r(0, 4), r(9, 12), r(20, 20)]);
        assert!(is_normalized(&normalized));
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(Vec::new()).is_empty());
    }

    #[test]
    fn test_is_normalized_rejects_touching() {
        assert!(!is_normalized(&[r(0, 2), r(3, 4)]));
        assert!(!is_normalized(&[r(3, 4), r(0, 1)]));
        assert!(is_normalized(&[r(0, 2), r(4, 4)]));
    }

    #[test]
    fn test_merge_absorbs_overlap() {
        assert_eq!(merge(&[r(0, 6)], r(4, 7)), vec![r(0, 7)]);
        assert_eq!(merge(&[r(0, 4), r(9, 10)], r(7, 13)), vec![r(0, 4), r(7, 13)]);
    }

    #[test]
    fn test_subtract_splits() {
        assert_eq!(subtract(&[r(0, 6), r(8, 10)], r(4, 9)), vec![r(0, 3), r(10, 10)]);
        assert_eq!(
            subtract(&[r(1, 3), r(5, 10)], r(6, 7)),
            vec![r(1, 3), r(5, 5), r(8, 10)]
        );
        assert!(subtract(&[r(2, 3)], r(0, 9)).is_empty());
    }

    #[test]
    fn test_contains_on_set() {
        assert!(!contains(&[r(0, 1)], 2));
        assert!(contains(&[r(0, 1), r(3, 5)], 4));
        assert!(!contains(&[], 0));
    }

    #[test]
    fn test_search_approximations() {
        let set = [r(0, 1), r(5, 6), r(10, 12)];

        assert_eq!(
            search(&set, 6, Approximation::Exact),
            RangeSearch { found: true, position: Some(1) }
        );
        assert_eq!(
            search(&set, 3, Approximation::Exact),
            RangeSearch { found: false, position: None }
        );
        assert_eq!(search(&set, 3, Approximation::NearestLeft).position, Some(0));
        assert_eq!(search(&set, 3, Approximation::NearestRight).position, Some(1));
        assert_eq!(search(&set, 13, Approximation::NearestRight).position, None);
        assert_eq!(search(&set, 13, Approximation::NearestLeft).position, Some(2));
    }

    #[test]
    fn test_differs() {
        assert!(!differs(&[r(0, 9)], &[r(0, 9)]));
        assert!(differs(&[r(0, 9)], &[r(5, 14)]));
        assert!(differs(&[], &[r(0, 0)]));
    }

    #[test]
    fn test_subtract_all_and_covered_len() {
        let removed = subtract_all(&[r(0, 9)], &[r(5, 14)]);
        assert_eq!(removed, vec![r(0, 4)]);
        assert_eq!(covered_len(&[r(0, 4), r(10, 10)]), 6);
        assert_eq!(indices(&[r(0, 1), r(4, 4)]).collect::<Vec<_>>(), vec![0, 1, 4]);
    }
}
