// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strongly-typed configuration values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::IndexRange;

/// Maximum number of items fetched by a single source query.
///
/// Uncovered spans longer than this are split into consecutive requests so
/// that one slow query never holds back a whole viewport.
///
/// # Examples
///
/// ```rust
/// use virtualizing_cache::{IndexRange, MaxRequestLen};
///
/// let max = MaxRequestLen::new(30);
/// let chunks: Vec<_> = max.chunk_range(IndexRange::new(0, 99)?).collect();
///
/// assert_eq!(chunks.len(), 4);
/// assert_eq!(chunks[3], IndexRange::new(90, 99)?);
/// # Ok::<(), virtualizing_cache::RangeError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaxRequestLen(usize);

impl MaxRequestLen {
    /// Creates a new limit. A limit of zero is raised to one.
    pub const fn new(len: usize) -> Self {
        if len == 0 {
            Self(1)
        } else {
            Self(len)
        }
    }

    /// The limit as a plain count.
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    /// Number of requests needed to cover `range`.
    pub fn chunks_needed(&self, range: IndexRange) -> usize {
        range.len().div_ceil(self.0)
    }

    /// Splits `range` into consecutive chunks of at most this length.
    pub fn chunk_range(&self, range: IndexRange) -> impl Iterator<Item = IndexRange> {
        let step = self.0;
        let last = range.last();
        let mut next = Some(range.first());

        std::iter::from_fn(move || {
            let first = next?;
            let chunk_last = first.saturating_add(step - 1).min(last);
            next = (chunk_last < last).then(|| chunk_last + 1);
            IndexRange::new(first, chunk_last).ok()
        })
    }
}

impl Default for MaxRequestLen {
    fn default() -> Self {
        Self::new(crate::config::constants::DEFAULT_MAX_REQUEST_LEN)
    }
}

impl fmt::Display for MaxRequestLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
