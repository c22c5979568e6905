// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for index range construction and arithmetic.

/// Errors raised when building or translating an [`IndexRange`](crate::IndexRange).
///
/// Every other range operation is total: anything that would produce an
/// empty range returns `None` instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The bounds are inverted (`first > last`).
    #[error("Invalid index range: first index {first} is after last index {last}")]
    InvalidBounds {
        /// Requested first index
        first: usize,
        /// Requested last index
        last: usize,
    },

    /// A translation moved a bound below zero or past `usize::MAX`.
    #[error("Index range arithmetic overflowed: {details}")]
    Overflow {
        /// Which operation overflowed
        details: String,
    },
}

impl RangeError {
    /// Create an `InvalidBounds` error.
    pub fn invalid_bounds(first: usize, last: usize) -> Self {
        RangeError::InvalidBounds { first, last }
    }

    /// Create an `Overflow` error with details.
    pub fn overflow(details: impl Into<String>) -> Self {
        RangeError::Overflow {
            details: details.into(),
        }
    }
}
