// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::debug;

use super::block::CacheBlock;
use super::block_set::{find_block, BlockSet};
use super::worker::{CacheWorker, Command, Outlets};
use super::{CacheEvent, CacheItem};
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::source::{DeltaEntity, VirtualizingSource};
use crate::IndexRange;

/// Handle to a virtualizing cache.
///
/// Creating the cache spawns its worker, which queries the total count and
/// announces it with [`CacheEvent::Initialized`]. After that the host calls
/// [`update_ranges`](Self::update_ranges) with whatever the viewport needs
/// and reads items with [`get`](Self::get) as [`CacheEvent::ItemsLoaded`]
/// events arrive.
///
/// Reads go straight to the shared block set and never wait on the worker.
/// Commands are queued and processed in order.
///
/// Dropping the handle disposes the cache.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use virtualizing_cache::{CacheConfig, CacheEvent, IndexRange, MemorySource, VirtualizingCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = Arc::new(MemorySource::new((0..1000u32).collect()));
/// let (cache, mut events) = VirtualizingCache::new(source, CacheConfig::minimal());
///
/// cache.update_ranges([IndexRange::new(0, 49)?])?;
///
/// loop {
///     if let CacheEvent::ItemsLoaded { range, .. } = events.recv().await? {
///         assert_eq!(range, IndexRange::new(0, 49)?);
///         break;
///     }
/// }
/// assert_eq!(cache.get(10)?, Some(10));
/// # Ok(())
/// # }
/// ```
pub struct VirtualizingCache<T>
where
    T: CacheItem,
{
    commands: mpsc::UnboundedSender<Command<T>>,
    blocks: Arc<BlockSet<T>>,
    events: broadcast::Sender<CacheEvent<T>>,
    count: watch::Receiver<usize>,
    feeds: Mutex<Vec<AbortHandle>>,
    handle: Handle,
    disposed: AtomicBool,
}

impl<T> VirtualizingCache<T>
where
    T: CacheItem,
{
    /// Creates a cache over `source` on the current tokio runtime.
    ///
    /// Returns the handle and a receiver subscribed before the worker
    /// starts, so it observes [`CacheEvent::Initialized`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime. Use
    /// [`with_handle`](Self::with_handle) to pass one explicitly.
    pub fn new(
        source: Arc<dyn VirtualizingSource<T>>,
        config: CacheConfig,
    ) -> (Self, broadcast::Receiver<CacheEvent<T>>) {
        Self::with_handle(Handle::current(), source, config)
    }

    /// Creates a cache whose worker and fetches run on `handle`.
    pub fn with_handle(
        handle: Handle,
        source: Arc<dyn VirtualizingSource<T>>,
        config: CacheConfig,
    ) -> (Self, broadcast::Receiver<CacheEvent<T>>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events, receiver) = broadcast::channel(config.event_capacity.max(1));
        let (count_tx, count_rx) = watch::channel(0);
        let blocks = Arc::new(BlockSet::new());

        debug!(
            source = source.name(),
            debounce_ms = config.debounce.as_millis() as u64,
            max_request_len = %config.max_request_len,
            "Starting virtualizing cache"
        );

        CacheWorker::spawn(
            source,
            config,
            handle.clone(),
            Arc::clone(&blocks),
            Outlets {
                events: events.clone(),
                count: count_tx,
            },
            commands_rx,
        );

        let cache = Self {
            commands: commands_tx,
            blocks,
            events,
            count: count_rx,
            feeds: Mutex::new(Vec::new()),
            handle,
            disposed: AtomicBool::new(false),
        };
        (cache, receiver)
    }

    /// Declares the ranges the host currently needs.
    ///
    /// Updates are debounced: only the last call in a burst is processed.
    /// Ranges may overlap and come in any order. Ranges past the total
    /// count are cut at the end of the collection.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] after [`dispose`](Self::dispose).
    pub fn update_ranges(
        &self,
        ranges: impl IntoIterator<Item = IndexRange>,
    ) -> Result<(), CacheError> {
        self.send(Command::UpdateRanges(ranges.into_iter().collect()))
    }

    /// Reports one batch of source mutations.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] after [`dispose`](Self::dispose).
    pub fn source_changed(&self, deltas: Vec<DeltaEntity<T>>) -> Result<(), CacheError> {
        if deltas.is_empty() {
            return Ok(());
        }
        self.send(Command::SourceChanged(deltas))
    }

    /// Forwards every batch of `deltas` to the cache until the stream ends
    /// or the cache is disposed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] after [`dispose`](Self::dispose).
    pub fn attach_deltas<S>(&self, deltas: S) -> Result<(), CacheError>
    where
        S: Stream<Item = Vec<DeltaEntity<T>>> + Send + 'static,
    {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }

        let commands = self.commands.clone();
        let feed = self.handle.spawn(async move {
            let mut deltas = std::pin::pin!(deltas);
            while let Some(batch) = deltas.next().await {
                if batch.is_empty() {
                    continue;
                }
                if commands.send(Command::SourceChanged(batch)).is_err() {
                    break;
                }
            }
            debug!("Delta feed ended");
        });

        self.feeds.lock().push(feed.abort_handle());
        Ok(())
    }

    /// The item at `index`, or `None` if it is not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::IndexOutOfBounds`] if `index` is not below the
    /// total count, and [`CacheError::Disposed`] after disposal.
    pub fn get(&self, index: usize) -> Result<Option<T>, CacheError> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }

        let count = self.total_count();
        if index >= count {
            return Err(CacheError::index_out_of_bounds(index, count));
        }

        let blocks = self.blocks.current();
        Ok(find_block(&blocks, index).and_then(|block| block.get(index)))
    }

    /// Global index of a loaded item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.blocks
            .current()
            .iter()
            .find_map(|block| block.position_of(item))
    }

    /// Total count last reported by the source.
    pub fn total_count(&self) -> usize {
        *self.count.borrow()
    }

    /// A new receiver for cache events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent<T>> {
        self.events.subscribe()
    }

    /// A receiver notified whenever the total count changes.
    pub fn count_changes(&self) -> watch::Receiver<usize> {
        self.count.clone()
    }

    /// Ranges of the current blocks.
    pub fn ranges(&self) -> Vec<IndexRange> {
        self.blocks.ranges()
    }

    /// The current blocks, sorted by range.
    pub fn blocks(&self) -> Vec<Arc<CacheBlock<T>>> {
        self.blocks.current().to_vec()
    }

    /// Disposes every block and waits until the worker has done so.
    ///
    /// Pending range updates are dropped. Emits
    /// [`CacheEvent::RangesUpdated`] if any block was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] after [`dispose`](Self::dispose).
    pub async fn clear(&self) -> Result<(), CacheError> {
        let (responder, done) = oneshot::channel();
        self.send(Command::Clear(responder))?;
        done.await.map_err(|_| CacheError::Disposed)
    }

    /// Stops the worker and delta feeds and disposes every block.
    ///
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        for feed in self.feeds.lock().drain(..) {
            feed.abort();
        }
        // Worker may already be gone
        let _ = self.commands.send(Command::Shutdown);
        debug!("Disposed virtualizing cache");
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn send(&self, command: Command<T>) -> Result<(), CacheError> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        self.commands
            .send(command)
            .map_err(|_| CacheError::Disposed)
    }
}

impl<T> Drop for VirtualizingCache<T>
where
    T: CacheItem,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
