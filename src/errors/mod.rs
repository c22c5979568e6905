// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the virtualizing cache.
//!
//! This module follows a hybrid approach:
//!
//! - **Concern-specific errors** for fine-grained handling ([`RangeError`],
//!   [`SourceError`])
//! - **Unified error type** ([`CacheError`]) returned by the cache handle, with
//!   `From` conversions so `?` propagates naturally
//!
//! # Examples
//!
//! ```rust,ignore
//! use virtualizing_cache::{CacheError, IndexRange, VirtualizingCache};
//!
//! fn request_window(cache: &VirtualizingCache<Row>) -> Result<(), CacheError> {
//!     // RangeError converts into CacheError
//!     let window = IndexRange::new(100, 149)?;
//!     cache.update_ranges(vec![window])?;
//!     Ok(())
//! }
//! ```

mod range;
mod source;

pub use range::RangeError;
pub use source::SourceError;

/// Unified error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The index is at or past the source's total count.
    #[error("Index {index} is out of bounds for a collection of {count} items")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Total count known to the cache
        count: usize,
    },

    /// The cache has been disposed and no longer accepts commands.
    #[error("Cache has been disposed")]
    Disposed,

    /// Error from the backing source.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Error from index range construction.
    #[error("Range error: {0}")]
    Range(#[from] RangeError),
}

impl CacheError {
    /// Create an `IndexOutOfBounds` error.
    pub fn index_out_of_bounds(index: usize, count: usize) -> Self {
        CacheError::IndexOutOfBounds { index, count }
    }
}
