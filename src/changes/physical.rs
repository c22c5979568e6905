// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Position-consistent add/remove operations derived from logical changes.

use super::LogicalChange;
use crate::errors::CacheError;

/// An item paired with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedItem<T> {
    /// Position of the item
    pub index: usize,
    /// The item
    pub item: T,
}

/// One operation on an index-addressed list.
///
/// Indices are valid at the moment the operation is applied, after every
/// operation emitted before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalChange<T> {
    /// Insert `item` at `index`.
    Add {
        /// Insertion position
        index: usize,
        /// The inserted item
        item: T,
    },
    /// Remove the item at `index`.
    Remove {
        /// Removal position
        index: usize,
        /// The removed item
        item: T,
    },
}

impl<T> PhysicalChange<T> {
    /// Position the operation applies to.
    pub fn index(&self) -> usize {
        match self {
            PhysicalChange::Add { index, .. } | PhysicalChange::Remove { index, .. } => *index,
        }
    }

    /// The item inserted or removed.
    pub fn item(&self) -> &T {
        match self {
            PhysicalChange::Add { item, .. } | PhysicalChange::Remove { item, .. } => item,
        }
    }
}

/// A batch of logical changes split into additions and removals.
///
/// An update contributes one removal (the old value at its old index) and one
/// addition (the new value at its new index), which lets an item move.
///
/// # Examples
///
/// ```rust
/// use virtualizing_cache::{LogicalChange, PhysicalChangeSet};
///
/// let mut list = vec!["a", "b", "c", "d"];
///
/// // "d" is updated and sorts to the front; "b" is removed
/// let set = PhysicalChangeSet::new(vec![
///     LogicalChange::updated(3, "d", 0, "D"),
///     LogicalChange::removed(1, "b"),
/// ]);
/// set.apply_to(&mut list).unwrap();
///
/// assert_eq!(list, vec!["D", "a", "c"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalChangeSet<T> {
    additions: Vec<IndexedItem<T>>,
    removals: Vec<IndexedItem<T>>,
}

impl<T> PhysicalChangeSet<T> {
    /// Splits a batch of logical changes.
    pub fn new(changes: impl IntoIterator<Item = LogicalChange<T>>) -> Self {
        let mut additions = Vec::new();
        let mut removals = Vec::new();

        for change in changes {
            match change {
                LogicalChange::Add {
                    current_index,
                    current,
                } => additions.push(IndexedItem {
                    index: current_index,
                    item: current,
                }),
                LogicalChange::Update {
                    previous_index,
                    previous,
                    current_index,
                    current,
                } => {
                    removals.push(IndexedItem {
                        index: previous_index,
                        item: previous,
                    });
                    additions.push(IndexedItem {
                        index: current_index,
                        item: current,
                    });
                }
                LogicalChange::Remove {
                    previous_index,
                    previous,
                } => removals.push(IndexedItem {
                    index: previous_index,
                    item: previous,
                }),
            }
        }

        additions.sort_by_key(|addition| addition.index);
        removals.sort_by_key(|removal| removal.index);

        Self {
            additions,
            removals,
        }
    }

    /// Additions, ascending by position after the batch.
    pub fn additions(&self) -> &[IndexedItem<T>] {
        &self.additions
    }

    /// Removals, ascending by position before the batch.
    pub fn removals(&self) -> &[IndexedItem<T>] {
        &self.removals
    }

    /// Whether the set changes nothing.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Net change in list length.
    pub fn count_delta(&self) -> isize {
        self.additions.len() as isize - self.removals.len() as isize
    }

    /// Serializes the set into one ordered operation list.
    ///
    /// The two sorted lists are merged while tracking how far earlier
    /// operations have shifted the original positions: a removal at previous
    /// index `p` currently sits at `p + shift`. At each step the operation
    /// with the smaller live position goes first; on a tie the removal does.
    pub fn into_operations(self) -> Vec<PhysicalChange<T>> {
        let mut operations = Vec::with_capacity(self.additions.len() + self.removals.len());
        let mut additions = self.additions.into_iter().peekable();
        let mut removals = self.removals.into_iter().peekable();
        let mut shift: isize = 0;

        loop {
            let take_addition = match (additions.peek(), removals.peek()) {
                (Some(addition), Some(removal)) => {
                    (addition.index as isize) < removal.index as isize + shift
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            if take_addition {
                if let Some(IndexedItem { index, item }) = additions.next() {
                    operations.push(PhysicalChange::Add { index, item });
                    shift += 1;
                }
            } else if let Some(IndexedItem { index, item }) = removals.next() {
                let live = (index as isize + shift).max(0) as usize;
                operations.push(PhysicalChange::Remove { index: live, item });
                shift -= 1;
            }
        }

        operations
    }

    /// Applies the operations in order to a dense list.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::IndexOutOfBounds`] if an operation does not fit
    /// the list, which means the batch did not describe this list. Operations
    /// before the failing one have already been applied.
    pub fn apply_to(self, list: &mut Vec<T>) -> Result<(), CacheError> {
        for operation in self.into_operations() {
            match operation {
                PhysicalChange::Add { index, item } => {
                    if index > list.len() {
                        return Err(CacheError::index_out_of_bounds(index, list.len()));
                    }
                    list.insert(index, item);
                }
                PhysicalChange::Remove { index, .. } => {
                    if index >= list.len() {
                        return Err(CacheError::index_out_of_bounds(index, list.len()));
                    }
                    list.remove(index);
                }
            }
        }
        Ok(())
    }
}
