// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Logical to physical change transformation.
//!
//! The source reports mutations per entity: something was added, updated or
//! removed. A list bound to the cache needs the same information as a
//! sequence of index operations it can apply one at a time without earlier
//! operations invalidating later indices.
//!
//! - [`LogicalChange`]: one entity's change with its before/after positions
//! - [`PhysicalChangeSet`]: a batch split into sorted additions and removals,
//!   serialized by [`PhysicalChangeSet::into_operations`]
//! - [`PhysicalChange`]: one add/remove at a live index

mod logical;
mod physical;

pub use logical::LogicalChange;
pub use physical::{IndexedItem, PhysicalChange, PhysicalChangeSet};
