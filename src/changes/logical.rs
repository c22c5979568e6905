// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Entity-level changes annotated with positions.

use crate::source::DeltaState;

/// An entity-level change with its position before and/or after the change.
///
/// Previous indices refer to the list before the batch was applied, current
/// indices to the list after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalChange<T> {
    /// A new entity now at `current_index`.
    Add {
        /// Position after the batch
        current_index: usize,
        /// The new entity
        current: T,
    },
    /// An entity that changed and may have moved.
    Update {
        /// Position before the batch
        previous_index: usize,
        /// The entity as the cache held it
        previous: T,
        /// Position after the batch
        current_index: usize,
        /// The entity as the source holds it now
        current: T,
    },
    /// An entity that was at `previous_index` and is gone.
    Remove {
        /// Position before the batch
        previous_index: usize,
        /// The removed entity
        previous: T,
    },
}

impl<T> LogicalChange<T> {
    /// An added entity.
    pub fn added(current_index: usize, current: T) -> Self {
        LogicalChange::Add {
            current_index,
            current,
        }
    }

    /// An updated entity.
    pub fn updated(previous_index: usize, previous: T, current_index: usize, current: T) -> Self {
        LogicalChange::Update {
            previous_index,
            previous,
            current_index,
            current,
        }
    }

    /// A removed entity.
    pub fn removed(previous_index: usize, previous: T) -> Self {
        LogicalChange::Remove {
            previous_index,
            previous,
        }
    }

    /// The kind of change.
    pub fn state(&self) -> DeltaState {
        match self {
            LogicalChange::Add { .. } => DeltaState::Add,
            LogicalChange::Update { .. } => DeltaState::Update,
            LogicalChange::Remove { .. } => DeltaState::Remove,
        }
    }

    /// Position after the batch, for additions and updates.
    pub fn current_index(&self) -> Option<usize> {
        match self {
            LogicalChange::Add { current_index, .. }
            | LogicalChange::Update { current_index, .. } => Some(*current_index),
            LogicalChange::Remove { .. } => None,
        }
    }

    /// Position before the batch, for updates and removals.
    pub fn previous_index(&self) -> Option<usize> {
        match self {
            LogicalChange::Update { previous_index, .. }
            | LogicalChange::Remove { previous_index, .. } => Some(*previous_index),
            LogicalChange::Add { .. } => None,
        }
    }

    /// The entity after the batch.
    pub fn current_entity(&self) -> Option<&T> {
        match self {
            LogicalChange::Add { current, .. } | LogicalChange::Update { current, .. } => {
                Some(current)
            }
            LogicalChange::Remove { .. } => None,
        }
    }

    /// The entity before the batch.
    pub fn previous_entity(&self) -> Option<&T> {
        match self {
            LogicalChange::Update { previous, .. } | LogicalChange::Remove { previous, .. } => {
                Some(previous)
            }
            LogicalChange::Add { .. } => None,
        }
    }
}
