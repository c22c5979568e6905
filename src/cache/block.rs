// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Retained storage for one contiguous range of the collection.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use super::request::{CacheBlockRequest, FetchOutcome, RequestId};
use crate::errors::SourceError;
use crate::range::set;
use crate::IndexRange;

/// Identifier of a block, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

/// A request result routed back to the cache worker.
pub(crate) struct Delivery<T> {
    pub block_id: BlockId,
    pub request_id: RequestId,
    pub outcome: FetchOutcome<T>,
}

/// What a delivery did to its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Completion {
    Loaded(IndexRange),
    Failed(IndexRange, SourceError),
}

struct Subscribed<T> {
    request: CacheBlockRequest<T>,
    subscription: AbortHandle,
}

/// Items for one range plus the requests still filling it.
///
/// Slots are `None` until a request delivers them. Only the cache worker
/// writes slots; readers take a shared lock per access, so a read never sees
/// a half-written delivery.
///
/// States: active while requests are pending, fully loaded once every slot
/// is filled, disposed when superseded or cleared. Disposing drops the
/// loaded items, which is where items owning resources release them.
pub struct CacheBlock<T> {
    id: BlockId,
    range: IndexRange,
    items: RwLock<Vec<Option<T>>>,
    pending: Mutex<VecDeque<Subscribed<T>>>,
    deliveries: mpsc::UnboundedSender<Delivery<T>>,
    handle: Handle,
    disposed: AtomicBool,
}

impl<T> CacheBlock<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a block and subscribes to each request.
    ///
    /// `items` must have exactly `range.len()` slots.
    pub(crate) fn new(
        range: IndexRange,
        items: Vec<Option<T>>,
        requests: impl IntoIterator<Item = CacheBlockRequest<T>>,
        deliveries: mpsc::UnboundedSender<Delivery<T>>,
        handle: Handle,
    ) -> Arc<Self> {
        debug_assert_eq!(items.len(), range.len());

        let block = Self {
            id: BlockId::next(),
            range,
            items: RwLock::new(items),
            pending: Mutex::new(VecDeque::new()),
            deliveries,
            handle,
            disposed: AtomicBool::new(false),
        };
        for request in requests {
            block.enqueue(request);
        }
        Arc::new(block)
    }

    /// Adds a request and subscribes to its completion.
    pub(crate) fn enqueue(&self, request: CacheBlockRequest<T>) {
        if self.is_disposed() {
            return;
        }
        let subscription = self.subscribe(&request);
        self.pending.lock().push_back(Subscribed {
            request,
            subscription,
        });
    }

    fn subscribe(&self, request: &CacheBlockRequest<T>) -> AbortHandle {
        let result = request.result();
        let deliveries = self.deliveries.clone();
        let block_id = self.id;
        let request_id = request.id();

        self.handle
            .spawn(async move {
                let outcome = result.await;
                // Closed channel means the worker is gone
                let _ = deliveries.send(Delivery {
                    block_id,
                    request_id,
                    outcome,
                });
            })
            .abort_handle()
    }
}

impl<T> CacheBlock<T> {
    /// Block identifier.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Range the block covers.
    pub fn range(&self) -> IndexRange {
        self.range
    }

    /// Whether the block has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of filled slots.
    pub fn loaded_count(&self) -> usize {
        self.items.read().iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether every slot is filled.
    pub fn is_fully_loaded(&self) -> bool {
        let items = self.items.read();
        !items.is_empty() && items.iter().all(Option::is_some)
    }

    /// Effective ranges of the requests not yet delivered.
    pub fn pending_ranges(&self) -> Vec<IndexRange> {
        self.pending
            .lock()
            .iter()
            .map(|subscribed| subscribed.request.effective_range())
            .collect()
    }

    /// Empty slots that no pending request will fill.
    pub(crate) fn unrequested_ranges(&self) -> Vec<IndexRange> {
        let empty = empty_runs(self.range.first(), &self.items.read());
        set::subtract_all(&empty, &self.pending_ranges())
    }

    /// Cancels every pending request. Late results are ignored.
    pub(crate) fn cancel_requests(&self) {
        let drained: Vec<_> = self.pending.lock().drain(..).collect();
        for subscribed in drained {
            subscribed.subscription.abort();
        }
    }

    /// Unsubscribes from all requests and drops the loaded items.
    ///
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_requests();
        // Swap out under the lock, drop outside it
        let items = std::mem::take(&mut *self.items.write());
        trace!(block = %self.id, range = %self.range, "Disposed block");
        drop(items);
    }
}

impl<T> CacheBlock<T>
where
    T: Clone,
{
    /// The item at global `index`, if the block covers it and it is loaded.
    pub fn get(&self, index: usize) -> Option<T> {
        if !self.range.contains(index) {
            return None;
        }
        self.items
            .read()
            .get(index - self.range.first())
            .cloned()
            .flatten()
    }

    /// Copy of every slot, in order.
    pub fn snapshot(&self) -> Vec<Option<T>> {
        self.items.read().clone()
    }

    /// Loaded items with their global indices.
    pub(crate) fn loaded_entries(&self) -> Vec<(usize, T)> {
        let first = self.range.first();
        self.items
            .read()
            .iter()
            .enumerate()
            .filter_map(|(offset, slot)| slot.clone().map(|item| (first + offset, item)))
            .collect()
    }

    /// Copies the loaded items overlapping `target` into `slots`, which
    /// stand for `target`'s indices.
    pub(crate) fn copy_loaded_into(&self, target: IndexRange, slots: &mut [Option<T>]) {
        let Some(overlap) = self.range.intersect(&target) else {
            return;
        };
        let items = self.items.read();
        for index in overlap.indices() {
            if let Some(item) = items.get(index - self.range.first()).cloned().flatten() {
                if let Some(slot) = slots.get_mut(index - target.first()) {
                    *slot = Some(item);
                }
            }
        }
    }

    /// Replaces every slot; `items` must have `range().len()` entries.
    pub(crate) fn replace_items(&self, items: Vec<Option<T>>) {
        if self.is_disposed() {
            return;
        }
        debug_assert_eq!(items.len(), self.range.len());
        let previous = std::mem::replace(&mut *self.items.write(), items);
        drop(previous);
    }

    /// Applies a delivery for one of this block's requests.
    ///
    /// Returns `None` if the request is unknown here, which happens when it
    /// was cancelled or the block was disposed after the result was sent.
    pub(crate) fn complete(
        &self,
        request_id: RequestId,
        outcome: &FetchOutcome<T>,
    ) -> Option<Completion> {
        if self.is_disposed() {
            return None;
        }

        let mut pending = self.pending.lock();
        let position = pending
            .iter()
            .position(|subscribed| subscribed.request.id() == request_id)?;
        let mut subscribed = pending.remove(position)?;
        let range = subscribed.request.effective_range();

        match outcome {
            Ok(delivered) => {
                let slice = subscribed.request.slice(delivered);
                let offset = range.first() - self.range.first();
                let mut items = self.items.write();
                for (slot, item) in items.iter_mut().skip(offset).zip(slice) {
                    *slot = Some(item.clone());
                }
                subscribed.request.mark_received();
                Some(Completion::Loaded(range))
            }
            Err(error) => Some(Completion::Failed(range, error.clone())),
        }
    }
}

impl<T> CacheBlock<T>
where
    T: Send + Sync + 'static,
{
    /// Requests still pending here, narrowed to their overlap with `target`.
    pub(crate) fn carry_over(&self, target: IndexRange) -> Vec<CacheBlockRequest<T>> {
        self.pending
            .lock()
            .iter()
            .filter_map(|subscribed| {
                let overlap = subscribed.request.effective_range().intersect(&target)?;
                subscribed.request.narrowed(overlap)
            })
            .collect()
    }
}

impl<T> CacheBlock<T>
where
    T: PartialEq,
{
    /// Global index of the first loaded item equal to `item`.
    pub fn position_of(&self, item: &T) -> Option<usize> {
        self.items
            .read()
            .iter()
            .position(|slot| slot.as_ref() == Some(item))
            .map(|offset| self.range.first() + offset)
    }
}

impl<T> Drop for CacheBlock<T> {
    fn drop(&mut self) {
        for subscribed in self.pending.get_mut().drain(..) {
            subscribed.subscription.abort();
        }
    }
}

impl<T> fmt::Debug for CacheBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBlock")
            .field("id", &self.id)
            .field("range", &self.range)
            .field("loaded", &self.loaded_count())
            .field("pending", &self.pending.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Maximal runs of empty slots, as global ranges.
pub(crate) fn empty_runs<T>(first: usize, slots: &[Option<T>]) -> Vec<IndexRange> {
    let mut runs = Vec::new();
    let mut start = None;

    for (offset, slot) in slots.iter().enumerate() {
        match (slot.is_none(), start) {
            (true, None) => start = Some(offset),
            (false, Some(run_start)) => {
                runs.extend(IndexRange::new(first + run_start, first + offset - 1).ok());
                start = None;
            }
            _ => {}
        }
    }
    if let Some(run_start) = start {
        runs.extend(IndexRange::new(first + run_start, first + slots.len() - 1).ok());
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VirtualizingSource;
    use crate::MemorySource;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    fn source(len: u32) -> Arc<dyn VirtualizingSource<u32>> {
        Arc::new(MemorySource::new((0..len).collect()))
    }

    #[test]
    fn test_empty_runs() {
        let slots = vec![None, Some(1), Some(2), None, None, Some(5), None];
        assert_eq!(empty_runs(10, &slots), vec![r(10, 10), r(13, 14), r(16, 16)]);
        assert!(empty_runs::<u32>(0, &[]).is_empty());
        assert_eq!(empty_runs::<u32>(3, &[None, None]), vec![r(3, 4)]);
    }

    #[tokio::test]
    async fn test_delivery_fills_effective_range() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = Handle::current();
        let request = CacheBlockRequest::fetch(r(0, 9), source(20), &handle);
        let narrowed = request.narrowed(r(4, 9)).unwrap();

        let mut items = vec![None; 6];
        items[0] = Some(100);
        let block = CacheBlock::new(r(4, 9), items, vec![narrowed], tx, handle);
        assert_eq!(block.pending_ranges(), vec![r(4, 9)]);
        assert!(block.unrequested_ranges().is_empty());

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.block_id, block.id());

        let completion = block.complete(delivery.request_id, &delivery.outcome);
        assert_eq!(completion, Some(Completion::Loaded(r(4, 9))));
        assert_eq!(block.snapshot(), (4..10).map(Some).collect::<Vec<_>>());
        assert!(block.is_fully_loaded());
        assert_eq!(block.get(7), Some(7));
        assert_eq!(block.get(3), None);
        assert_eq!(block.position_of(&9), Some(9));

        // Second delivery of the same request is ignored
        assert_eq!(block.complete(delivery.request_id, &delivery.outcome), None);
    }

    #[tokio::test]
    async fn test_failed_delivery_leaves_slots_empty() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = Handle::current();
        let request = CacheBlockRequest::fetch(r(0, 2), source(3), &handle);
        let id = request.id();
        let block = CacheBlock::new(r(0, 2), vec![None; 3], vec![request], tx, handle);

        let outcome: FetchOutcome<u32> = Err(SourceError::query("timeout"));
        assert_eq!(
            block.complete(id, &outcome),
            Some(Completion::Failed(r(0, 2), SourceError::query("timeout")))
        );
        assert_eq!(block.loaded_count(), 0);
        assert_eq!(block.unrequested_ranges(), vec![r(0, 2)]);
    }

    #[tokio::test]
    async fn test_carry_over_narrows_pending_requests() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = Handle::current();
        let request = CacheBlockRequest::fetch(r(0, 9), source(20), &handle);
        let id = request.id();
        let block = CacheBlock::new(r(0, 9), vec![None; 10], vec![request], tx, handle);

        let carried = block.carry_over(r(5, 14));
        assert_eq!(carried.len(), 1);
        assert_eq!(carried[0].id(), id);
        assert_eq!(carried[0].effective_range(), r(5, 9));

        assert!(block.carry_over(r(20, 30)).is_empty());
    }

    #[tokio::test]
    async fn test_copy_loaded_into_overlap() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let items = (0..10).map(Some).collect();
        let block = CacheBlock::new(r(0, 9), items, Vec::new(), tx, Handle::current());

        let mut slots = vec![None; 10];
        block.copy_loaded_into(r(5, 14), &mut slots);
        assert_eq!(&slots[..5], &[Some(5), Some(6), Some(7), Some(8), Some(9)]);
        assert!(slots[5..].iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = Handle::current();
        let request = CacheBlockRequest::fetch(r(0, 3), source(4), &handle);
        let id = request.id();
        let items = vec![Some(0), None, None, None];
        let block = CacheBlock::new(r(0, 3), items, vec![request], tx, handle);

        block.dispose();
        block.dispose();

        assert!(block.is_disposed());
        assert!(block.pending_ranges().is_empty());
        assert_eq!(block.get(0), None);
        assert_eq!(block.complete(id, &Ok(Arc::from(vec![0, 1, 2, 3]))), None);
    }
}
