// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types reported by a [`VirtualizingSource`](crate::VirtualizingSource).

/// Errors that can occur while querying the backing source.
///
/// A failed query only affects the request (or count refresh) that issued it.
/// The type is `Clone` because one fetch result is observed by every block
/// that carries the request.
///
/// # Examples
///
/// ```rust
/// use virtualizing_cache::SourceError;
///
/// let err = SourceError::query("connection reset");
/// assert_eq!(err.to_string(), "Source query failed: connection reset");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source cannot serve queries right now.
    #[error("Source unavailable: {reason}")]
    Unavailable {
        /// Why the source is unavailable
        reason: String,
    },

    /// A query was executed and failed.
    #[error("Source query failed: {details}")]
    Query {
        /// Details about the failure
        details: String,
    },

    /// The background fetch was cancelled or panicked before delivering.
    #[error("Source fetch cancelled: {details}")]
    Cancelled {
        /// Details about the cancellation
        details: String,
    },
}

impl SourceError {
    /// Create an `Unavailable` error with a reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a `Query` error with details.
    pub fn query(details: impl Into<String>) -> Self {
        SourceError::Query {
            details: details.into(),
        }
    }

    /// Create a `Cancelled` error with details.
    pub fn cancelled(details: impl Into<String>) -> Self {
        SourceError::Cancelled {
            details: details.into(),
        }
    }
}
