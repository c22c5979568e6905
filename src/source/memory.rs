// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory source over a `Vec`

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DeltaEntity, VirtualizingSource};
use crate::errors::SourceError;

/// A [`VirtualizingSource`] whose canonical order is a `Vec`.
///
/// Mutations return the [`DeltaEntity`] describing them so callers can forward
/// the batch to the cache.
///
/// # Examples
///
/// ```rust
/// use virtualizing_cache::{DeltaState, MemorySource, VirtualizingSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = MemorySource::new((0..10).collect::<Vec<u32>>());
///
/// let delta = source.insert(3, 100).await.unwrap();
/// assert_eq!(delta.state, DeltaState::Add);
/// assert_eq!(source.index_of(&100).await.unwrap(), Some(3));
/// assert_eq!(source.total_count().await.unwrap(), 11);
/// # }
/// ```
///
/// # Performance
///
/// - `get_items`: O(count)
/// - `index_of`: O(n) linear scan
/// - `insert` / `remove`: O(n)
#[derive(Debug, Default)]
pub struct MemorySource<T> {
    items: RwLock<Vec<T>>,
}

impl<T> MemorySource<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    /// Creates a source holding `items` in order.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Number of items held.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the source is empty.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Snapshot of every item, in order.
    pub async fn snapshot(&self) -> Vec<T> {
        self.items.read().await.clone()
    }

    /// Appends an item.
    pub async fn push(&self, item: T) -> DeltaEntity<T> {
        self.items.write().await.push(item.clone());
        DeltaEntity::added(item)
    }

    /// Inserts an item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] when `index` is past the end.
    pub async fn insert(&self, index: usize, item: T) -> Result<DeltaEntity<T>, SourceError> {
        let mut items = self.items.write().await;
        if index > items.len() {
            return Err(SourceError::query(format!(
                "insert at {index} past end of {} items",
                items.len()
            )));
        }
        items.insert(index, item.clone());
        debug!(index, len = items.len(), "Inserted item into memory source");
        Ok(DeltaEntity::added(item))
    }

    /// Replaces the item at `index` in place.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] when `index` is out of bounds.
    pub async fn update(&self, index: usize, item: T) -> Result<DeltaEntity<T>, SourceError> {
        self.move_item(index, index, item).await
    }

    /// Replaces the item at `from` and repositions it at `to`.
    ///
    /// `to` is the item's position after the move, as an ordered source would
    /// report it when an update changes the sort key.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] when either index is out of bounds.
    pub async fn move_item(
        &self,
        from: usize,
        to: usize,
        item: T,
    ) -> Result<DeltaEntity<T>, SourceError> {
        let mut items = self.items.write().await;
        if from >= items.len() || to >= items.len() {
            return Err(SourceError::query(format!(
                "move {from} -> {to} out of bounds for {} items",
                items.len()
            )));
        }
        items.remove(from);
        items.insert(to, item.clone());
        debug!(from, to, "Updated item in memory source");
        Ok(DeltaEntity::updated(item))
    }

    /// Removes the item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] when `index` is out of bounds.
    pub async fn remove(&self, index: usize) -> Result<DeltaEntity<T>, SourceError> {
        let mut items = self.items.write().await;
        if index >= items.len() {
            return Err(SourceError::query(format!(
                "remove at {index} out of bounds for {} items",
                items.len()
            )));
        }
        let removed = items.remove(index);
        debug!(index, len = items.len(), "Removed item from memory source");
        Ok(DeltaEntity::removed(removed))
    }
}

#[async_trait]
impl<T> VirtualizingSource<T> for MemorySource<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    async fn total_count(&self) -> Result<usize, SourceError> {
        Ok(self.items.read().await.len())
    }

    async fn get_items(&self, start: usize, count: usize) -> Result<Vec<T>, SourceError> {
        let items = self.items.read().await;
        let start = start.min(items.len());
        let end = start.saturating_add(count).min(items.len());
        Ok(items[start..end].to_vec())
    }

    async fn index_of(&self, entity: &T) -> Result<Option<usize>, SourceError> {
        Ok(self.items.read().await.iter().position(|item| item == entity))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
