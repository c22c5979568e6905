// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The backing source consumed by the cache.
//!
//! The cache never owns the data. It asks a [`VirtualizingSource`] for the
//! total count, for slices of items in canonical order, and for the current
//! position of an entity. Mutations made through the source come back to the
//! cache as batches of [`DeltaEntity`].
//!
//! - [`MemorySource`]: a source over an in-memory `Vec`, mostly for tests and
//!   demos
//!
//! # Examples
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use virtualizing_cache::{SourceError, VirtualizingSource};
//!
//! struct MessageTable { pool: DbPool }
//!
//! #[async_trait]
//! impl VirtualizingSource<Message> for MessageTable {
//!     async fn total_count(&self) -> Result<usize, SourceError> {
//!         self.pool.count_messages().await.map_err(|e| SourceError::query(e.to_string()))
//!     }
//!
//!     async fn get_items(&self, start: usize, count: usize) -> Result<Vec<Message>, SourceError> {
//!         self.pool.page(start, count).await.map_err(|e| SourceError::query(e.to_string()))
//!     }
//!
//!     async fn index_of(&self, entity: &Message) -> Result<Option<usize>, SourceError> {
//!         self.pool.rank_of(entity.id).await.map_err(|e| SourceError::query(e.to_string()))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::errors::SourceError;

mod memory;

pub use memory::MemorySource;

/// An ordered, index-addressable collection the cache virtualizes.
///
/// The source does not have to be transactionally consistent between calls;
/// the cache re-derives the total count after each mutation batch.
///
/// # Thread Safety
///
/// Implementations are shared between the cache worker and its fetch tasks
/// and must be `Send + Sync`.
#[async_trait]
pub trait VirtualizingSource<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Number of items in the collection.
    async fn total_count(&self) -> Result<usize, SourceError>;

    /// Up to `count` items starting at `start`, in canonical order.
    ///
    /// May return fewer items at the tail of the collection.
    async fn get_items(&self, start: usize, count: usize) -> Result<Vec<T>, SourceError>;

    /// Current 0-based position of `entity`, or `None` if the source does not
    /// hold it.
    async fn index_of(&self, entity: &T) -> Result<Option<usize>, SourceError>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Kind of change an entity went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaState {
    /// The entity is new.
    Add,
    /// The entity changed and may have moved.
    Update,
    /// The entity is gone.
    Remove,
}

/// One entity-level change produced by the source.
///
/// For `Update` and `Remove` the entity must compare equal (`PartialEq`) to the
/// version the cache holds; equality identifies the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEntity<T> {
    /// What happened to the entity
    pub state: DeltaState,
    /// The entity after the change (or as it was, for removals)
    pub entity: T,
}

impl<T> DeltaEntity<T> {
    /// An added entity.
    pub fn added(entity: T) -> Self {
        Self {
            state: DeltaState::Add,
            entity,
        }
    }

    /// An updated entity.
    pub fn updated(entity: T) -> Self {
        Self {
            state: DeltaState::Update,
            entity,
        }
    }

    /// A removed entity.
    pub fn removed(entity: T) -> Self {
        Self {
            state: DeltaState::Remove,
            entity,
        }
    }
}
