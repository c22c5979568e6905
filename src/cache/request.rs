// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous loads of one sub-range from the source.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, Instrument};

use crate::errors::SourceError;
use crate::source::VirtualizingSource;
use crate::{spans, IndexRange};

/// Items delivered for a request's full range, or why the fetch failed.
pub type FetchOutcome<T> = Result<Arc<[T]>, SourceError>;

pub(crate) type SharedFetch<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

/// Identifier of one source fetch.
///
/// A request carried over into a rebuilt block keeps the id of the fetch it
/// observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

/// Aborts the background fetch once no request observes it.
struct FetchTask {
    abort: AbortHandle,
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// An in-flight or completed load of one sub-range.
///
/// The fetch always covers `full_range`. A request carried into a rebuilt
/// block may only need part of it; `effective_range` is that part and is what
/// gets written into the block.
///
/// Lifecycle: pending, then either received (data delivered once) or
/// discarded (dropped with its block; any late result is ignored).
pub struct CacheBlockRequest<T> {
    id: RequestId,
    full_range: IndexRange,
    effective_range: IndexRange,
    received: bool,
    result: SharedFetch<T>,
    task: Arc<FetchTask>,
}

impl<T> CacheBlockRequest<T>
where
    T: Send + Sync + 'static,
{
    /// Starts fetching `full_range` from `source` on `handle`.
    ///
    /// The fetch runs in its own task; this returns immediately.
    pub fn fetch(
        full_range: IndexRange,
        source: Arc<dyn VirtualizingSource<T>>,
        handle: &Handle,
    ) -> Self {
        let id = RequestId::next();
        let span = spans::fetch_items(full_range);

        let join = handle.spawn(
            async move {
                let items = source
                    .get_items(full_range.first(), full_range.len())
                    .await?;
                debug!(received = items.len(), "Fetched items from source");
                Ok::<Arc<[T]>, SourceError>(items.into())
            }
            .instrument(span),
        );

        let task = Arc::new(FetchTask {
            abort: join.abort_handle(),
        });

        let result = async move {
            match join.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SourceError::cancelled(e.to_string())),
            }
        }
        .boxed()
        .shared();

        Self {
            id,
            full_range,
            effective_range: full_range,
            received: false,
            result,
            task,
        }
    }

    /// A request observing the same fetch that only needs `effective_range`.
    ///
    /// Returns `None` if this request has already been received or
    /// `effective_range` is not within its current effective range.
    pub fn narrowed(&self, effective_range: IndexRange) -> Option<Self> {
        if self.received || !self.effective_range.covers(&effective_range) {
            return None;
        }
        Some(Self {
            id: self.id,
            full_range: self.full_range,
            effective_range,
            received: false,
            result: self.result.clone(),
            task: Arc::clone(&self.task),
        })
    }
}

impl<T> CacheBlockRequest<T> {
    /// Identifier of the underlying fetch.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Range the fetch covers.
    pub fn full_range(&self) -> IndexRange {
        self.full_range
    }

    /// Range this request still fills.
    pub fn effective_range(&self) -> IndexRange {
        self.effective_range
    }

    /// Whether the data has been delivered.
    pub fn is_received(&self) -> bool {
        self.received
    }

    pub(crate) fn result(&self) -> SharedFetch<T> {
        self.result.clone()
    }

    pub(crate) fn mark_received(&mut self) {
        self.received = true;
    }

    /// The part of a full-range delivery that belongs to the effective range.
    ///
    /// Shorter than `effective_range` when the source returned fewer items
    /// at the tail.
    pub(crate) fn slice<'a>(&self, delivered: &'a [T]) -> &'a [T] {
        let offset = self.effective_range.first() - self.full_range.first();
        if offset >= delivered.len() {
            return &[];
        }
        let end = (offset + self.effective_range.len()).min(delivered.len());
        &delivered[offset..end]
    }
}

impl<T> fmt::Debug for CacheBlockRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBlockRequest")
            .field("id", &self.id)
            .field("full_range", &self.full_range)
            .field("effective_range", &self.effective_range)
            .field("received", &self.received)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySource;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    fn source(len: u32) -> Arc<dyn VirtualizingSource<u32>> {
        Arc::new(MemorySource::new((0..len).collect()))
    }

    #[tokio::test]
    async fn test_fetch_delivers_full_range() {
        let request = CacheBlockRequest::fetch(r(5, 9), source(20), &Handle::current());

        assert_eq!(request.effective_range(), r(5, 9));
        assert!(!request.is_received());

        let delivered = request.result().await.unwrap();
        assert_eq!(&*delivered, &[5, 6, 7, 8, 9]);
        assert_eq!(request.slice(&delivered), &[5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn test_narrowed_shares_fetch() {
        let request = CacheBlockRequest::fetch(r(0, 9), source(20), &Handle::current());
        let narrowed = request.narrowed(r(6, 8)).unwrap();

        assert_eq!(narrowed.id(), request.id());
        assert_eq!(narrowed.full_range(), r(0, 9));

        let delivered = narrowed.result().await.unwrap();
        assert_eq!(narrowed.slice(&delivered), &[6, 7, 8]);

        // Cannot widen past the current effective range
        assert!(narrowed.narrowed(r(5, 8)).is_none());
    }

    #[tokio::test]
    async fn test_received_request_is_not_narrowed() {
        let mut request = CacheBlockRequest::fetch(r(0, 3), source(4), &Handle::current());
        request.mark_received();
        assert!(request.narrowed(r(1, 2)).is_none());
    }

    #[tokio::test]
    async fn test_slice_truncated_at_tail() {
        // Source only has 12 items
        let request = CacheBlockRequest::fetch(r(8, 15), source(12), &Handle::current());
        let narrowed = request.narrowed(r(10, 15)).unwrap();

        let delivered = narrowed.result().await.unwrap();
        assert_eq!(&*delivered, &[8, 9, 10, 11]);
        assert_eq!(narrowed.slice(&delivered), &[10, 11]);

        let past_end = request.narrowed(r(13, 15)).unwrap();
        assert!(past_end.slice(&delivered).is_empty());
    }
}
