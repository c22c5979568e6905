//! Tracing span helpers for cache operations.
//!
//! Telemetry is kept out of the cache algorithms: each instrumented operation
//! has a span constructor here, and the operation either enters it or
//! attaches it to its future with `tracing::Instrument`.
//!
//! Usage pattern:
//! ```rust,ignore
//! fn rebuild(&self, requested: Vec<IndexRange>) {
//!     let span = spans::update_blocks(requested.len(), current.len());
//!     let _guard = span.enter();
//!     // Business logic here
//! }
//! ```

use tracing::{Level, Span};

use crate::IndexRange;

/// Create span for the cache worker's lifetime.
///
/// Parent: None (root span for the worker task)
/// Children: every span below
#[inline]
pub(crate) fn cache_worker(source: &'static str) -> Span {
    tracing::span!(Level::INFO, "virtualizing_cache.worker", source = source,)
}

/// Create span for rebuilding the block set after a range update.
///
/// Parent: cache_worker span
/// Children: None (fetches run in their own tasks)
#[inline]
pub(crate) fn update_blocks(requested_ranges: usize, current_blocks: usize) -> Span {
    tracing::debug_span!(
        "virtualizing_cache.update_blocks",
        requested_ranges = requested_ranges,
        current_blocks = current_blocks,
    )
}

/// Create span for fetching one request's items from the source.
///
/// Parent: None (fetches outlive the rebuild that issued them)
#[inline]
pub(crate) fn fetch_items(range: IndexRange) -> Span {
    tracing::debug_span!(
        "virtualizing_cache.fetch_items",
        first = range.first(),
        last = range.last(),
        count = range.len(),
    )
}

/// Create span for reconciling a batch of source deltas.
///
/// Parent: cache_worker span
/// Children: refresh_count span
#[inline]
pub(crate) fn source_changed(delta_count: usize) -> Span {
    tracing::info_span!(
        "virtualizing_cache.source_changed",
        delta_count = delta_count,
    )
}

/// Create span for re-querying the source's total count.
///
/// Parent: cache_worker or source_changed span
#[inline]
pub(crate) fn refresh_count() -> Span {
    tracing::debug_span!("virtualizing_cache.refresh_count")
}
