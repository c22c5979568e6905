// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Index range algebra.
//!
//! This module provides the value types the cache reasons in:
//!
//! - [`IndexRange`]: a closed, never-empty interval of 0-based positions
//! - [`set`]: operations over sorted, disjoint arrays of ranges (normalize,
//!   merge, subtract, search)
//! - [`selection`]: keeping a selected range set consistent with list
//!   add/remove/move notifications
//!
//! Operations that would produce an empty range return `None` rather than a
//! degenerate value, so every `IndexRange` in circulation satisfies
//! `first <= last`.
//!
//! # Examples
//!
//! ```rust
//! use virtualizing_cache::IndexRange;
//!
//! let a = IndexRange::new(0, 6)?;
//! let b = IndexRange::new(4, 7)?;
//!
//! assert_eq!(a.try_union(&b), Some(IndexRange::new(0, 7)?));
//! assert_eq!(a.intersect(&b), Some(IndexRange::new(4, 6)?));
//! assert_eq!(a.len(), 7);
//! # Ok::<(), virtualizing_cache::RangeError>(())
//! ```

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::errors::RangeError;

pub mod selection;
pub mod set;

/// A closed interval `[first, last]` of 0-based indices.
///
/// Bounds are validated at construction; `first <= last` always holds.
/// Ranges order by `first`, then by `last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawIndexRange", into = "RawIndexRange")]
pub struct IndexRange {
    first: usize,
    last: usize,
}

/// Unvalidated wire form, checked on deserialization.
#[derive(Serialize, Deserialize)]
struct RawIndexRange {
    first: usize,
    last: usize,
}

impl TryFrom<RawIndexRange> for IndexRange {
    type Error = RangeError;

    fn try_from(raw: RawIndexRange) -> Result<Self, Self::Error> {
        IndexRange::new(raw.first, raw.last)
    }
}

impl From<IndexRange> for RawIndexRange {
    fn from(range: IndexRange) -> Self {
        RawIndexRange {
            first: range.first,
            last: range.last,
        }
    }
}

#[allow(clippy::len_without_is_empty)]
impl IndexRange {
    /// Creates a range covering `first..=last`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidBounds`] when `first > last`.
    pub fn new(first: usize, last: usize) -> Result<Self, RangeError> {
        if first > last {
            return Err(RangeError::invalid_bounds(first, last));
        }
        Ok(Self { first, last })
    }

    /// Creates a range covering exactly one index.
    pub fn single(index: usize) -> Self {
        Self {
            first: index,
            last: index,
        }
    }

    /// Creates a range of `len` indices starting at `first`.
    ///
    /// Returns `None` when `len` is zero or the range would run past `usize::MAX`.
    pub fn with_len(first: usize, len: usize) -> Option<Self> {
        let last = first.checked_add(len.checked_sub(1)?)?;
        Some(Self { first, last })
    }

    /// First index (inclusive).
    pub fn first(&self) -> usize {
        self.first
    }

    /// Last index (inclusive).
    pub fn last(&self) -> usize {
        self.last
    }

    /// Number of indices covered. Never zero.
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Whether `index` lies within the range.
    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }

    /// Whether `other` lies entirely within this range.
    pub fn covers(&self, other: &IndexRange) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    /// Whether the two ranges share no index.
    pub fn is_disjoint(&self, other: &IndexRange) -> bool {
        self.last < other.first || other.last < self.first
    }

    /// Enclosing range of two ranges that overlap or touch.
    ///
    /// Returns `None` when a gap of at least one index separates them.
    pub fn try_union(&self, other: &IndexRange) -> Option<IndexRange> {
        let touches = other.first <= self.last.saturating_add(1)
            && self.first <= other.last.saturating_add(1);
        touches.then(|| IndexRange {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        })
    }

    /// Portions of `other` not covered by this range.
    ///
    /// The left part lies before `self.first`, the right part after `self.last`.
    pub fn difference(&self, other: &IndexRange) -> (Option<IndexRange>, Option<IndexRange>) {
        let left = (other.first < self.first).then(|| IndexRange {
            first: other.first,
            last: other.last.min(self.first - 1),
        });
        let right = (other.last > self.last).then(|| IndexRange {
            first: other.first.max(self.last + 1),
            last: other.last,
        });
        (left, right)
    }

    /// Indices covered by both ranges.
    pub fn intersect(&self, other: &IndexRange) -> Option<IndexRange> {
        let first = self.first.max(other.first);
        let last = self.last.min(other.last);
        (first <= last).then_some(IndexRange { first, last })
    }

    /// Translates both bounds by `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Overflow`] if a bound would leave `0..=usize::MAX`.
    pub fn shift(&self, offset: isize) -> Result<IndexRange, RangeError> {
        let first = self.first.checked_add_signed(offset);
        let last = self.last.checked_add_signed(offset);
        match (first, last) {
            (Some(first), Some(last)) => Ok(IndexRange { first, last }),
            _ => Err(RangeError::overflow(format!("shift {self} by {offset}"))),
        }
    }

    /// Drops `count` indices from the front. `None` if nothing remains.
    pub fn shrink_first(&self, count: usize) -> Option<IndexRange> {
        let first = self.first.checked_add(count)?;
        (first <= self.last).then_some(IndexRange {
            first,
            last: self.last,
        })
    }

    /// Drops `count` indices from the back. `None` if nothing remains.
    pub fn shrink_last(&self, count: usize) -> Option<IndexRange> {
        let last = self.last.checked_sub(count)?;
        (self.first <= last).then_some(IndexRange {
            first: self.first,
            last,
        })
    }

    /// Grows the range by `count` indices at the front.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Overflow`] if the first index would go below zero.
    pub fn expand_first(&self, count: usize) -> Result<IndexRange, RangeError> {
        let first = self
            .first
            .checked_sub(count)
            .ok_or_else(|| RangeError::overflow(format!("expand {self} by {count} at front")))?;
        Ok(IndexRange {
            first,
            last: self.last,
        })
    }

    /// Grows the range by `count` indices at the back.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Overflow`] if the last index would pass `usize::MAX`.
    pub fn expand_last(&self, count: usize) -> Result<IndexRange, RangeError> {
        let last = self
            .last
            .checked_add(count)
            .ok_or_else(|| RangeError::overflow(format!("expand {self} by {count} at back")))?;
        Ok(IndexRange {
            first: self.first,
            last,
        })
    }

    /// Iterator over every index in the range.
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

impl From<IndexRange> for RangeInclusive<usize> {
    fn from(range: IndexRange) -> Self {
        range.indices()
    }
}

impl TryFrom<RangeInclusive<usize>> for IndexRange {
    type Error = RangeError;

    fn try_from(range: RangeInclusive<usize>) -> Result<Self, Self::Error> {
        IndexRange::new(*range.start(), *range.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert_eq!(
            IndexRange::new(5, 4),
            Err(RangeError::InvalidBounds { first: 5, last: 4 })
        );
        assert!(IndexRange::new(4, 4).is_ok());
    }

    #[test]
    fn test_with_len() {
        assert_eq!(IndexRange::with_len(3, 4), Some(r(3, 6)));
        assert_eq!(IndexRange::with_len(3, 0), None);
        assert_eq!(IndexRange::with_len(usize::MAX, 2), None);
    }

    #[test]
    fn test_try_union_adjacent_and_gap() {
        assert_eq!(r(0, 3).try_union(&r(4, 6)), Some(r(0, 6)));
        assert_eq!(r(4, 6).try_union(&r(0, 3)), Some(r(0, 6)));
        assert_eq!(r(0, 3).try_union(&r(5, 6)), None);
        assert_eq!(r(2, 9).try_union(&r(4, 5)), Some(r(2, 9)));
    }

    #[test]
    fn test_difference_splits_other() {
        // Portions of 0..=10 outside 4..=6
        assert_eq!(r(4, 6).difference(&r(0, 10)), (Some(r(0, 3)), Some(r(7, 10))));
        // Other fully covered
        assert_eq!(r(0, 10).difference(&r(2, 3)), (None, None));
        // Other entirely left of self
        assert_eq!(r(5, 8).difference(&r(0, 2)), (Some(r(0, 2)), None));
        // Other entirely right of self
        assert_eq!(r(5, 8).difference(&r(10, 12)), (None, Some(r(10, 12))));
    }

    #[test]
    fn test_intersect() {
        assert_eq!(r(0, 6).intersect(&r(4, 9)), Some(r(4, 6)));
        assert_eq!(r(0, 3).intersect(&r(4, 9)), None);
    }

    #[test]
    fn test_covers_and_disjoint() {
        assert!(r(0, 9).covers(&r(3, 4)));
        assert!(!r(3, 4).covers(&r(0, 9)));
        assert!(r(0, 3).is_disjoint(&r(4, 5)));
        assert!(!r(0, 4).is_disjoint(&r(4, 5)));
    }

    #[test]
    fn test_contains_bounds() {
        let range = r(2, 4);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_shift_shrink_expand() {
        assert_eq!(r(2, 4).shift(3).unwrap(), r(5, 7));
        assert_eq!(r(2, 4).shift(-2).unwrap(), r(0, 2));
        assert!(r(2, 4).shift(-3).is_err());

        assert_eq!(r(2, 4).shrink_first(2), Some(r(4, 4)));
        assert_eq!(r(2, 4).shrink_first(3), None);
        assert_eq!(r(2, 4).shrink_last(1), Some(r(2, 3)));
        assert_eq!(r(0, 0).shrink_last(1), None);

        assert_eq!(r(2, 4).expand_first(2).unwrap(), r(0, 4));
        assert!(r(2, 4).expand_first(3).is_err());
        assert_eq!(r(2, 4).expand_last(5).unwrap(), r(2, 9));
    }

    #[test]
    fn test_serde_validates_bounds() {
        let json = serde_json::to_string(&r(3, 8)).unwrap();
        assert_eq!(json, r#"{"first":3,"last":8}"#);
        assert_eq!(serde_json::from_str::<IndexRange>(&json).unwrap(), r(3, 8));

        let inverted = serde_json::from_str::<IndexRange>(r#"{"first":8,"last":3}"#);
        assert!(inverted.is_err(), "Inverted bounds must not deserialize");
    }
}
