// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for logical to physical change conversion
//!
//! A random batch of removals, insertions and moves is applied to a list in
//! one step to get the expected result, then described as logical changes.
//! Replaying the physical operations must reproduce the same list.

use proptest::prelude::*;
use virtualizing_cache::{LogicalChange, PhysicalChange, PhysicalChangeSet};

#[derive(Debug, Clone)]
struct Batch {
    before: Vec<u32>,
    after: Vec<u32>,
    changes: Vec<LogicalChange<u32>>,
}

// Items are 0..len; inserted items start at 1000 so they never collide
fn arb_batch() -> impl Strategy<Value = Batch> {
    (0usize..30).prop_flat_map(|len| {
        (
            prop::collection::vec(any::<bool>(), len),
            prop::collection::vec(any::<prop::sample::Index>(), 0..6),
            any::<bool>(),
        )
            .prop_map(move |(keep, inserts, pair_update)| build_batch(len, &keep, &inserts, pair_update))
    })
}

fn build_batch(
    len: usize,
    keep: &[bool],
    inserts: &[prop::sample::Index],
    pair_update: bool,
) -> Batch {
    let before: Vec<u32> = (0..len as u32).collect();
    let mut after: Vec<u32> = before
        .iter()
        .zip(keep)
        .filter(|(_, keep)| **keep)
        .map(|(item, _)| *item)
        .collect();

    let inserted: Vec<u32> = (0..inserts.len() as u32).map(|k| 1000 + k).collect();
    for (item, position) in inserted.iter().zip(inserts) {
        let index = position.index(after.len() + 1);
        after.insert(index, *item);
    }

    let mut removals: Vec<(usize, u32)> = keep
        .iter()
        .enumerate()
        .filter(|(_, keep)| !**keep)
        .map(|(index, _)| (index, before[index]))
        .collect();
    let mut additions: Vec<(usize, u32)> = inserted
        .iter()
        .map(|item| (after.iter().position(|x| x == item).unwrap(), *item))
        .collect();

    let mut changes = Vec::new();
    // An update is a removal and an addition of the same logical record
    if pair_update && !removals.is_empty() && !additions.is_empty() {
        let (previous_index, previous) = removals.remove(0);
        let (current_index, current) = additions.remove(0);
        changes.push(LogicalChange::updated(previous_index, previous, current_index, current));
    }
    changes.extend(removals.into_iter().map(|(index, item)| LogicalChange::removed(index, item)));
    changes.extend(additions.into_iter().map(|(index, item)| LogicalChange::added(index, item)));

    Batch {
        before,
        after,
        changes,
    }
}

proptest! {
    /// Property: Replaying the operations in order reproduces the batch
    #[test]
    fn prop_operations_reproduce_batch(batch in arb_batch()) {
        let mut list = batch.before.clone();
        PhysicalChangeSet::new(batch.changes.clone()).apply_to(&mut list).unwrap();
        prop_assert_eq!(list, batch.after);
    }

    /// Property: The net length change is additions minus removals
    #[test]
    fn prop_count_delta_matches_lengths(batch in arb_batch()) {
        let set = PhysicalChangeSet::new(batch.changes.clone());
        prop_assert_eq!(
            set.count_delta(),
            batch.after.len() as isize - batch.before.len() as isize
        );
    }

    /// Property: Every removal names the item sitting at its live index
    #[test]
    fn prop_removals_target_their_item(batch in arb_batch()) {
        let mut list = batch.before.clone();
        for operation in PhysicalChangeSet::new(batch.changes.clone()).into_operations() {
            match operation {
                PhysicalChange::Add { index, item } => list.insert(index, item),
                PhysicalChange::Remove { index, item } => {
                    prop_assert_eq!(list[index], item);
                    list.remove(index);
                }
            }
        }
    }
}
