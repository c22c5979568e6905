// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Block-based virtualizing cache.
//!
//! The cache keeps only the parts of a large collection the host currently
//! needs, as a sorted set of disjoint [`CacheBlock`]s. Each block is filled
//! by one or more [`CacheBlockRequest`]s against the
//! [`VirtualizingSource`](crate::VirtualizingSource).
//!
//! When the requested ranges change, the block set is rebuilt: items already
//! loaded are copied into the new blocks, requests still in flight are kept
//! with a narrowed range, and only the remaining gaps are fetched. The old
//! blocks are disposed after the new set is installed.
//!
//! All mutation goes through one worker task; see [`VirtualizingCache`] for
//! the handle and [`CacheEvent`] for what it publishes.

mod block;
mod block_set;
mod event;
mod request;
mod virtualizing;
mod worker;

pub use block::{BlockId, CacheBlock};
pub use event::CacheEvent;
pub use request::{CacheBlockRequest, FetchOutcome, RequestId};
pub use virtualizing::VirtualizingCache;

/// Bounds on items stored by the cache.
///
/// Equality identifies an entity when source deltas are reconciled.
pub trait CacheItem: Clone + PartialEq + Send + Sync + 'static {}

impl<T> CacheItem for T where T: Clone + PartialEq + Send + Sync + 'static {}
