// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use parking_lot::RwLock;

use super::block::CacheBlock;
use crate::IndexRange;

pub(crate) type Blocks<T> = Arc<[Arc<CacheBlock<T>>]>;

/// The current blocks, sorted and disjoint, replaced as a whole.
///
/// Readers clone the `Arc` and keep a consistent set for as long as they
/// hold it; a swap never exposes a mix of old and new blocks.
pub(crate) struct BlockSet<T> {
    blocks: RwLock<Blocks<T>>,
}

impl<T> BlockSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            blocks: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub(crate) fn current(&self) -> Blocks<T> {
        Arc::clone(&self.blocks.read())
    }

    /// Installs `blocks` and returns the set they replace.
    pub(crate) fn swap(&self, blocks: Vec<Arc<CacheBlock<T>>>) -> Blocks<T> {
        std::mem::replace(&mut *self.blocks.write(), Arc::from(blocks))
    }

    pub(crate) fn ranges(&self) -> Vec<IndexRange> {
        self.current().iter().map(|block| block.range()).collect()
    }
}

/// Binary search for the block covering `index`.
pub(crate) fn find_block<T>(blocks: &[Arc<CacheBlock<T>>], index: usize) -> Option<&Arc<CacheBlock<T>>> {
    let position = blocks.partition_point(|block| block.range().last() < index);
    blocks
        .get(position)
        .filter(|block| block.range().contains(index))
}
