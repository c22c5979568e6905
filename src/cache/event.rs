// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use super::block::CacheBlock;
use crate::changes::PhysicalChange;
use crate::errors::SourceError;
use crate::IndexRange;

/// Notification published on the cache's change stream.
#[derive(Debug, Clone)]
pub enum CacheEvent<T> {
    /// The worker started and queried the source's count. Sent once, first.
    Initialized {
        /// Count reported by the source, or 0 if the query failed
        total_count: usize,
    },

    /// A request delivered `range` into `block`.
    ItemsLoaded {
        /// Slots that were filled
        range: IndexRange,
        /// The block now holding them
        block: Arc<CacheBlock<T>>,
    },

    /// A request for `range` failed; its slots stay empty.
    LoadFailed {
        /// Slots the request was filling
        range: IndexRange,
        /// Why the source query failed
        error: SourceError,
    },

    /// The block set was rebuilt.
    RangesUpdated {
        /// Ranges that were cached before and are not anymore
        removed_ranges: Vec<IndexRange>,
    },

    /// A batch of source deltas was reconciled.
    SourceUpdated {
        /// Cached items dropped by the batch
        discarded_items: Vec<T>,
        /// Operations to replay on a list mirroring the source, in order.
        /// Empty when the cache had to reload instead of patching.
        changes: Vec<PhysicalChange<T>>,
        /// Count after the batch
        total_count: usize,
    },
}

impl<T> CacheEvent<T> {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheEvent::Initialized { .. } => "initialized",
            CacheEvent::ItemsLoaded { .. } => "items_loaded",
            CacheEvent::LoadFailed { .. } => "load_failed",
            CacheEvent::RangesUpdated { .. } => "ranges_updated",
            CacheEvent::SourceUpdated { .. } => "source_updated",
        }
    }
}
