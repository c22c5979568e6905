// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Selection range tracking.
//!
//! A UI selection over a virtualized list is persisted as a normalized range
//! set. When the underlying list is spliced, every selected range at or after
//! the mutation point has to move with its items. [`apply_to_selection`]
//! recomputes the set for one list notification with the usual splice
//! semantics:
//!
//! - inserting inside a selected range splits it around the new, unselected item
//! - removing an element shifts later ranges down and re-merges ranges that
//!   become contiguous
//! - a move is a remove followed by an insert that carries the item's
//!   selected state to its destination
//!
//! [`SelectedRanges`] wraps the same logic in an owned, serializable set.

use serde::{Deserialize, Serialize};

use super::{set, IndexRange};

/// A single mutation notification on an index-addressed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListMutation {
    /// One item inserted at `index`.
    Add {
        /// Position of the new item
        index: usize,
    },
    /// The item at `index` removed.
    Remove {
        /// Position the item occupied
        index: usize,
    },
    /// An item moved; `old_index` is its position before removal and
    /// `new_index` its position after re-insertion.
    Move {
        /// Position after the move
        new_index: usize,
        /// Position before the move
        old_index: usize,
    },
    /// The item at `index` replaced in place.
    Replace {
        /// Position of the replaced item
        index: usize,
    },
    /// The list changed wholesale.
    Reset,
}

/// Recomputes a normalized selection after one list mutation.
pub fn apply_to_selection(mutation: ListMutation, old: &[IndexRange]) -> Vec<IndexRange> {
    match mutation {
        ListMutation::Add { index } => insert_at(old, index),
        ListMutation::Remove { index } => remove_at(old, index),
        ListMutation::Move {
            new_index,
            old_index,
        } => {
            let previously_selected = set::contains(old, old_index);
            let shifted = insert_at(&remove_at(old, old_index), new_index);
            if previously_selected {
                set::merge(&shifted, IndexRange::single(new_index))
            } else {
                shifted
            }
        }
        ListMutation::Replace { .. } => old.to_vec(),
        ListMutation::Reset => Vec::new(),
    }
}

/// Opens an unselected slot at `index`.
fn insert_at(ranges: &[IndexRange], index: usize) -> Vec<IndexRange> {
    let mut shifted = Vec::with_capacity(ranges.len() + 1);
    for range in ranges {
        if range.last < index {
            shifted.push(*range);
        } else if range.first >= index {
            shifted.push(IndexRange {
                first: range.first + 1,
                last: range.last + 1,
            });
        } else {
            shifted.push(IndexRange {
                first: range.first,
                last: index - 1,
            });
            shifted.push(IndexRange {
                first: index + 1,
                last: range.last + 1,
            });
        }
    }
    shifted
}

/// Closes the slot at `index`, merging neighbors that become contiguous.
fn remove_at(ranges: &[IndexRange], index: usize) -> Vec<IndexRange> {
    let mut shifted = Vec::with_capacity(ranges.len());
    for range in ranges {
        if range.last < index {
            shifted.push(*range);
        } else if range.first > index {
            shifted.push(IndexRange {
                first: range.first - 1,
                last: range.last - 1,
            });
        } else if let Some(shrunk) = range.shrink_last(1) {
            shifted.push(shrunk);
        }
    }
    set::normalize(shifted)
}

/// An owned selection that is always normalized.
///
/// # Examples
///
/// ```rust
/// use virtualizing_cache::{IndexRange, ListMutation, SelectedRanges};
///
/// let mut selection = SelectedRanges::new();
/// selection.select(IndexRange::new(0, 2)?);
///
/// // An insertion inside the selection splits it
/// selection.apply(ListMutation::Add { index: 1 });
/// assert_eq!(
///     selection.ranges(),
///     &[IndexRange::new(0, 0)?, IndexRange::new(2, 3)?]
/// );
/// # Ok::<(), virtualizing_cache::RangeError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IndexRange>", into = "Vec<IndexRange>")]
pub struct SelectedRanges {
    ranges: Vec<IndexRange>,
}

impl SelectedRanges {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected ranges, normalized.
    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    /// Adds a range to the selection.
    pub fn select(&mut self, range: IndexRange) {
        self.ranges = set::merge(&self.ranges, range);
    }

    /// Removes a range from the selection.
    pub fn deselect(&mut self, range: IndexRange) {
        self.ranges = set::subtract(&self.ranges, range);
    }

    /// Whether `index` is selected.
    pub fn contains(&self, index: usize) -> bool {
        set::contains(&self.ranges, index)
    }

    /// Number of selected indices.
    pub fn len(&self) -> usize {
        set::covered_len(&self.ranges)
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Keeps the selection aligned with a list mutation.
    pub fn apply(&mut self, mutation: ListMutation) {
        self.ranges = apply_to_selection(mutation, &self.ranges);
    }

    /// Deselects everything.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Iterator over selected indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        set::indices(&self.ranges)
    }
}

impl From<Vec<IndexRange>> for SelectedRanges {
    fn from(ranges: Vec<IndexRange>) -> Self {
        Self {
            ranges: set::normalize(ranges),
        }
    }
}

impl From<SelectedRanges> for Vec<IndexRange> {
    fn from(selection: SelectedRanges) -> Self {
        selection.ranges
    }
}

impl FromIterator<IndexRange> for SelectedRanges {
    fn from_iter<I: IntoIterator<Item = IndexRange>>(iter: I) -> Self {
        Self {
            ranges: set::normalize(iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    #[test]
    fn test_add_inside_splits() {
        let result = apply_to_selection(ListMutation::Add { index: 1 }, &[r(0, 2)]);
        assert_eq!(result, vec![r(0, 0), r(2, 3)]);
    }

    #[test]
    fn test_add_before_shifts() {
        let result = apply_to_selection(ListMutation::Add { index: 0 }, &[r(0, 2)]);
        assert_eq!(result, vec![r(1, 3)]);
    }

    #[test]
    fn test_add_after_leaves_range() {
        let result = apply_to_selection(ListMutation::Add { index: 3 }, &[r(0, 2), r(5, 6)]);
        assert_eq!(result, vec![r(0, 2), r(6, 7)]);
    }

    #[test]
    fn test_remove_first_selected_shrinks() {
        let result = apply_to_selection(ListMutation::Remove { index: 2 }, &[r(2, 4)]);
        assert_eq!(result, vec![r(2, 3)]);
    }

    #[test]
    fn test_remove_single_selected_drops_range() {
        let result = apply_to_selection(ListMutation::Remove { index: 3 }, &[r(0, 1), r(3, 3), r(6, 7)]);
        assert_eq!(result, vec![r(0, 1), r(5, 6)]);
    }

    #[test]
    fn test_remove_gap_merges_neighbors() {
        let result = apply_to_selection(ListMutation::Remove { index: 2 }, &[r(0, 1), r(3, 4)]);
        assert_eq!(result, vec![r(0, 3)]);
    }

    #[test]
    fn test_move_carries_selection_forward() {
        // The selected item at 2 moves to 6 and joins the trailing range
        let result = apply_to_selection(
            ListMutation::Move {
                new_index: 6,
                old_index: 2,
            },
            &[r(2, 4), r(6, 8)],
        );
        assert_eq!(result, vec![r(2, 3), r(5, 8)]);
    }

    #[test]
    fn test_move_carries_selection_backward() {
        let result = apply_to_selection(
            ListMutation::Move {
                new_index: 0,
                old_index: 7,
            },
            &[r(2, 4), r(6, 8)],
        );
        // 7 leaves 6..=8 (now 6..=7), everything from 0 shifts up, 0 is selected
        assert_eq!(result, vec![r(0, 0), r(3, 5), r(7, 8)]);
    }

    #[test]
    fn test_move_unselected_item() {
        let result = apply_to_selection(
            ListMutation::Move {
                new_index: 3,
                old_index: 0,
            },
            &[r(1, 2)],
        );
        assert_eq!(result, vec![r(0, 1)]);
    }

    #[test]
    fn test_replace_and_reset() {
        let old = [r(1, 2)];
        assert_eq!(apply_to_selection(ListMutation::Replace { index: 1 }, &old), old.to_vec());
        assert!(apply_to_selection(ListMutation::Reset, &old).is_empty());
    }

    #[test]
    fn test_selected_ranges_container() {
        let mut selection: SelectedRanges = vec![r(5, 6), r(0, 1), r(2, 2)].into();
        assert_eq!(selection.ranges(), &[r(0, 2), r(5, 6)]);
        assert_eq!(selection.len(), 5);

        selection.deselect(r(1, 5));
        assert_eq!(selection.ranges(), &[r(0, 0), r(6, 6)]);
        assert!(selection.contains(6));
        assert!(!selection.contains(3));

        selection.apply(ListMutation::Remove { index: 0 });
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![5]);

        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_selected_ranges_persist_normalized() {
        let restored: SelectedRanges =
            serde_json::from_str(r#"[{"first":4,"last":5},{"first":0,"last":3}]"#).unwrap();
        assert_eq!(restored.ranges(), &[r(0, 5)]);
    }
}
