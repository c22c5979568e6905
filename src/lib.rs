//! Block-based virtualizing cache for large, index-addressed collections.
//!
//! A list view over millions of rows only ever shows a few dozen of them.
//! [`VirtualizingCache`] keeps just the ranges the view asks for, fetches
//! them from a [`VirtualizingSource`] in the background and keeps the
//! loaded items consistent when the source changes.
//!
//! - [`range`]: the [`IndexRange`] algebra, normalized range sets and
//!   selection maintenance under list mutations
//! - [`cache`]: blocks, requests and the cache handle
//! - [`changes`]: entity deltas to position-consistent list operations
//! - [`source`]: the source contract and an in-memory source
//! - [`config`]: debounce, request size and event buffering
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use virtualizing_cache::{CacheConfig, CacheEvent, IndexRange, MemorySource, VirtualizingCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rows: Vec<String> = (0..10_000).map(|i| format!("row {i}")).collect();
//! let source = Arc::new(MemorySource::new(rows));
//! let (cache, mut events) = VirtualizingCache::new(source, CacheConfig::minimal());
//!
//! // The viewport shows rows 100..=139
//! cache.update_ranges([IndexRange::new(100, 139)?])?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let CacheEvent::ItemsLoaded { .. } = event {
//!         break;
//!     }
//! }
//! assert_eq!(cache.get(120)?.as_deref(), Some("row 120"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod changes;
pub mod config;
pub mod errors;
pub mod range;
pub mod source;
mod spans;
pub mod types;

pub use cache::{
    BlockId, CacheBlock, CacheBlockRequest, CacheEvent, CacheItem, FetchOutcome, RequestId,
    VirtualizingCache,
};
pub use changes::{IndexedItem, LogicalChange, PhysicalChange, PhysicalChangeSet};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use errors::{CacheError, RangeError, SourceError};
pub use range::selection::{apply_to_selection, ListMutation, SelectedRanges};
pub use range::set::{Approximation, RangeSearch};
pub use range::IndexRange;
pub use source::{DeltaEntity, DeltaState, MemorySource, VirtualizingSource};
pub use types::config::MaxRequestLen;
