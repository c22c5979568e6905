// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The cache's single writer.
//!
//! Range updates, request deliveries and source deltas all reach one task
//! through channels and are handled one at a time, so a rebuild never races
//! a reconciliation over the block set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn, Instrument};

use super::block::{empty_runs, CacheBlock, Completion, Delivery};
use super::block_set::{BlockSet, Blocks};
use super::request::CacheBlockRequest;
use super::{CacheEvent, CacheItem};
use crate::changes::{LogicalChange, PhysicalChange, PhysicalChangeSet};
use crate::config::CacheConfig;
use crate::errors::SourceError;
use crate::range::set;
use crate::source::{DeltaEntity, DeltaState, VirtualizingSource};
use crate::{spans, IndexRange};

type Responder = oneshot::Sender<()>;

pub(crate) enum Command<T> {
    UpdateRanges(Vec<IndexRange>),
    SourceChanged(Vec<DeltaEntity<T>>),
    Clear(Responder),
    Shutdown,
}

/// Channels the worker publishes on.
pub(crate) struct Outlets<T> {
    pub events: broadcast::Sender<CacheEvent<T>>,
    pub count: watch::Sender<usize>,
}

pub(crate) struct CacheWorker<T> {
    source: Arc<dyn VirtualizingSource<T>>,
    config: CacheConfig,
    handle: Handle,
    blocks: Arc<BlockSet<T>>,
    outlets: Outlets<T>,
    deliveries: mpsc::UnboundedSender<Delivery<T>>,
    // Set once any count query has succeeded
    count_known: AtomicBool,
}

/// One loaded or inserted item while deltas are replayed.
struct Slot<T> {
    item: T,
    // Loaded from the source, as opposed to taken from a delta
    resident: bool,
}

impl<T> CacheWorker<T>
where
    T: CacheItem,
{
    /// Spawns the worker on `handle`.
    pub(crate) fn spawn(
        source: Arc<dyn VirtualizingSource<T>>,
        config: CacheConfig,
        handle: Handle,
        blocks: Arc<BlockSet<T>>,
        outlets: Outlets<T>,
        commands: mpsc::UnboundedReceiver<Command<T>>,
    ) {
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let span = spans::cache_worker(source.name());

        let worker = Self {
            source,
            config,
            handle: handle.clone(),
            blocks,
            outlets,
            deliveries: deliveries_tx,
            count_known: AtomicBool::new(false),
        };
        handle.spawn(worker.run(commands, deliveries_rx).instrument(span));
    }

    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<Command<T>>,
        mut deliveries: mpsc::UnboundedReceiver<Delivery<T>>,
    ) {
        self.initialize().await;

        let mut requested: Option<Vec<IndexRange>> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::UpdateRanges(ranges)) => {
                        // Each update restarts the quiet window
                        requested = Some(ranges);
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Some(Command::SourceChanged(deltas)) => self.reconcile(deltas).await,
                    Some(Command::Clear(responder)) => {
                        requested = None;
                        deadline = None;
                        self.clear(true);
                        let _ = responder.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(delivery) = deliveries.recv() => self.deliver(delivery),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if let Some(ranges) = requested.take() {
                        self.update_blocks(ranges).await;
                    }
                }
            }
        }

        self.clear(false);
        debug!("Cache worker stopped");
    }

    async fn initialize(&self) {
        let total_count = match self.refresh_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Initial count query failed, retrying on the next range update");
                0
            }
        };
        info!(total_count, "Cache initialized");
        let _ = self
            .outlets
            .events
            .send(CacheEvent::Initialized { total_count });
    }

    async fn refresh_count(&self) -> Result<usize, SourceError> {
        let count = self
            .source
            .total_count()
            .instrument(spans::refresh_count())
            .await?;

        self.outlets.count.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
        self.count_known.store(true, Ordering::Release);
        Ok(count)
    }

    /// The total count, queried again while no query has succeeded yet.
    async fn known_count(&self) -> Option<usize> {
        if self.count_known.load(Ordering::Acquire) {
            return Some(*self.outlets.count.borrow());
        }
        match self.refresh_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Total count still unknown, ranges are not clamped");
                None
            }
        }
    }

    async fn update_blocks(&self, ranges: Vec<IndexRange>) {
        let requested = match self.known_count().await {
            Some(total_count) => clamp(set::normalize(ranges), total_count),
            None => set::normalize(ranges),
        };
        self.rebuild(requested);
    }

    /// Rebuilds the block set for `requested`, reusing loaded items and
    /// in-flight requests of the current blocks.
    fn rebuild(&self, requested: Vec<IndexRange>) {
        let current = self.blocks.current();
        let current_ranges: Vec<IndexRange> = current.iter().map(|block| block.range()).collect();

        if !set::differs(&current_ranges, &requested)
            && current
                .iter()
                .all(|block| block.unrequested_ranges().is_empty())
        {
            trace!("Requested ranges already cached");
            return;
        }

        let span = spans::update_blocks(requested.len(), current.len());
        let _guard = span.enter();

        let mut blocks = Vec::with_capacity(requested.len());
        let mut first_overlap = 0;

        for range in &requested {
            while current
                .get(first_overlap)
                .is_some_and(|block| block.range().last() < range.first())
            {
                first_overlap += 1;
            }

            let mut slots = vec![None; range.len()];
            let mut requests = Vec::new();
            // The last overlapping block may also overlap the next range, so
            // `first_overlap` is not advanced past it here
            for block in current[first_overlap..]
                .iter()
                .take_while(|block| block.range().first() <= range.last())
            {
                block.copy_loaded_into(*range, &mut slots);
                requests.extend(block.carry_over(*range));
            }

            let carried: Vec<IndexRange> = requests
                .iter()
                .map(CacheBlockRequest::effective_range)
                .collect();
            let missing = set::subtract_all(&empty_runs(range.first(), &slots), &carried);

            let before = requests.len();
            for gap in missing {
                requests.extend(self.fetch(gap));
            }
            debug!(
                range = %range,
                carried = carried.len(),
                issued = requests.len() - before,
                "Built block"
            );

            blocks.push(CacheBlock::new(
                *range,
                slots,
                requests,
                self.deliveries.clone(),
                self.handle.clone(),
            ));
        }

        let previous = self.blocks.swap(blocks);
        for block in previous.iter() {
            block.dispose();
        }

        let removed_ranges = set::subtract_all(&current_ranges, &requested);
        debug!(
            blocks = requested.len(),
            removed = removed_ranges.len(),
            "Swapped block set"
        );
        let _ = self
            .outlets
            .events
            .send(CacheEvent::RangesUpdated { removed_ranges });
    }

    /// Requests for `range`, split by the configured maximum length.
    fn fetch(&self, range: IndexRange) -> Vec<CacheBlockRequest<T>> {
        let max = self.config.max_request_len;
        let mut requests = Vec::with_capacity(max.chunks_needed(range));
        requests.extend(
            max.chunk_range(range)
                .map(|chunk| CacheBlockRequest::fetch(chunk, Arc::clone(&self.source), &self.handle)),
        );
        requests
    }

    fn request_missing(&self, block: &CacheBlock<T>) {
        for gap in block.unrequested_ranges() {
            for request in self.fetch(gap) {
                block.enqueue(request);
            }
        }
    }

    fn deliver(&self, delivery: Delivery<T>) {
        let blocks = self.blocks.current();
        let Some(block) = blocks.iter().find(|block| block.id() == delivery.block_id) else {
            trace!(block = %delivery.block_id, "Dropped delivery for a replaced block");
            return;
        };

        match block.complete(delivery.request_id, &delivery.outcome) {
            Some(Completion::Loaded(range)) => {
                trace!(range = %range, "Items loaded");
                let _ = self.outlets.events.send(CacheEvent::ItemsLoaded {
                    range,
                    block: Arc::clone(block),
                });
            }
            Some(Completion::Failed(range, error)) => {
                warn!(range = %range, error = %error, "Failed to load items");
                let _ = self
                    .outlets
                    .events
                    .send(CacheEvent::LoadFailed { range, error });
            }
            None => {
                trace!(request = %delivery.request_id, "Dropped delivery for a cancelled request");
            }
        }
    }

    /// Applies a batch of source deltas to the loaded blocks.
    async fn reconcile(&self, deltas: Vec<DeltaEntity<T>>) {
        let span = spans::source_changed(deltas.len());

        async {
            let blocks = self.blocks.current();
            let deltas = dedupe(deltas);

            let (discarded_items, changes) = match self.resolve(&blocks, deltas).await {
                Ok(Some(logical)) if logical.is_empty() => (Vec::new(), Vec::new()),
                Ok(Some(logical)) => self.patch(&blocks, logical),
                Ok(None) => {
                    debug!("Delta targets an unloaded item, reloading");
                    self.reload(&blocks)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to position deltas, reloading");
                    self.reload(&blocks)
                }
            };

            let total_count = match self.refresh_count().await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "Count refresh failed, keeping previous count");
                    *self.outlets.count.borrow()
                }
            };

            debug!(
                discarded = discarded_items.len(),
                changes = changes.len(),
                total_count,
                "Source changes applied"
            );
            let _ = self.outlets.events.send(CacheEvent::SourceUpdated {
                discarded_items,
                changes,
                total_count,
            });
        }
        .instrument(span)
        .await
    }

    /// Positions every delta. `Ok(None)` means some removal or update
    /// targets an item that is not loaded.
    async fn resolve(
        &self,
        blocks: &Blocks<T>,
        deltas: Vec<DeltaEntity<T>>,
    ) -> Result<Option<Vec<LogicalChange<T>>>, SourceError> {
        let mut changes = Vec::with_capacity(deltas.len());

        for DeltaEntity { state, entity } in deltas {
            match state {
                DeltaState::Add => match self.source.index_of(&entity).await? {
                    Some(current_index) => changes.push(LogicalChange::added(current_index, entity)),
                    None => trace!("Added entity is no longer in the source"),
                },
                DeltaState::Remove => {
                    let Some((previous_index, previous)) = find_loaded(blocks, &entity) else {
                        return Ok(None);
                    };
                    changes.push(LogicalChange::removed(previous_index, previous));
                }
                DeltaState::Update => {
                    let Some((previous_index, previous)) = find_loaded(blocks, &entity) else {
                        return Ok(None);
                    };
                    match self.source.index_of(&entity).await? {
                        Some(current_index) => changes.push(LogicalChange::updated(
                            previous_index,
                            previous,
                            current_index,
                            entity,
                        )),
                        None => changes.push(LogicalChange::removed(previous_index, previous)),
                    }
                }
            }
        }

        Ok(Some(changes))
    }

    /// Replays the changes over the loaded items and refills each block
    /// from the result.
    fn patch(
        &self,
        blocks: &Blocks<T>,
        changes: Vec<LogicalChange<T>>,
    ) -> (Vec<T>, Vec<PhysicalChange<T>>) {
        let operations = PhysicalChangeSet::new(changes).into_operations();

        for block in blocks.iter() {
            block.cancel_requests();
        }

        let mut slots: BTreeMap<usize, Slot<T>> = blocks
            .iter()
            .flat_map(|block| block.loaded_entries())
            .map(|(index, item)| {
                (
                    index,
                    Slot {
                        item,
                        resident: true,
                    },
                )
            })
            .collect();
        let mut discarded = Vec::new();

        for operation in &operations {
            match operation {
                PhysicalChange::Add { index, item } => {
                    let tail = slots.split_off(index);
                    slots.extend(tail.into_iter().map(|(key, slot)| (key + 1, slot)));
                    slots.insert(
                        *index,
                        Slot {
                            item: item.clone(),
                            resident: false,
                        },
                    );
                }
                PhysicalChange::Remove { index, item } => {
                    let mut tail = slots.split_off(index);
                    tail.remove(index);
                    slots.extend(tail.into_iter().map(|(key, slot)| (key - 1, slot)));
                    discarded.push(item.clone());
                }
            }
        }

        for block in blocks.iter() {
            let range = block.range();
            let items = range
                .indices()
                .map(|index| slots.remove(&index).map(|slot| slot.item))
                .collect();
            block.replace_items(items);
            self.request_missing(block);
        }

        // Shifted out of every block
        discarded.extend(
            slots
                .into_values()
                .filter(|slot| slot.resident)
                .map(|slot| slot.item),
        );

        (discarded, operations)
    }

    /// Drops every loaded item and requests all blocks again.
    fn reload(&self, blocks: &Blocks<T>) -> (Vec<T>, Vec<PhysicalChange<T>>) {
        let mut discarded = Vec::new();

        for block in blocks.iter() {
            block.cancel_requests();
            discarded.extend(block.loaded_entries().into_iter().map(|(_, item)| item));
            block.replace_items(vec![None; block.range().len()]);
            self.request_missing(block);
        }

        (discarded, Vec::new())
    }

    fn clear(&self, notify: bool) {
        let previous = self.blocks.swap(Vec::new());
        for block in previous.iter() {
            block.dispose();
        }

        let removed_ranges: Vec<IndexRange> = previous.iter().map(|block| block.range()).collect();
        if notify && !removed_ranges.is_empty() {
            debug!(blocks = removed_ranges.len(), "Cleared cache");
            let _ = self
                .outlets
                .events
                .send(CacheEvent::RangesUpdated { removed_ranges });
        }
    }
}

/// Cuts ranges at the end of the collection.
fn clamp(ranges: Vec<IndexRange>, total_count: usize) -> Vec<IndexRange> {
    let Some(last) = total_count.checked_sub(1) else {
        return Vec::new();
    };
    ranges
        .into_iter()
        .filter(|range| range.first() <= last)
        .filter_map(|range| IndexRange::new(range.first(), range.last().min(last)).ok())
        .collect()
}

/// Folds the deltas of each entity into one, in first-seen order.
///
/// A removal followed by an addition becomes an update, and an addition
/// followed by a removal cancels out. Otherwise the later delta wins.
fn dedupe<T: PartialEq>(deltas: Vec<DeltaEntity<T>>) -> Vec<DeltaEntity<T>> {
    let mut unique: Vec<DeltaEntity<T>> = Vec::with_capacity(deltas.len());
    for delta in deltas {
        let Some(position) = unique.iter().position(|seen| seen.entity == delta.entity) else {
            unique.push(delta);
            continue;
        };
        let state = match (unique[position].state, delta.state) {
            (DeltaState::Add, DeltaState::Remove) => {
                unique.remove(position);
                continue;
            }
            // Never loaded, so still positioned by the source alone
            (DeltaState::Add, _) => DeltaState::Add,
            (_, DeltaState::Add) => DeltaState::Update,
            (_, state) => state,
        };
        unique[position] = DeltaEntity {
            state,
            entity: delta.entity,
        };
    }
    unique
}

fn find_loaded<T: CacheItem>(blocks: &Blocks<T>, entity: &T) -> Option<(usize, T)> {
    blocks.iter().find_map(|block| {
        let index = block.position_of(entity)?;
        Some((index, block.get(index)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: usize, last: usize) -> IndexRange {
        IndexRange::new(first, last).unwrap()
    }

    #[test]
    fn test_clamp_to_total_count() {
        assert_eq!(clamp(vec![r(0, 9), r(15, 30)], 20), vec![r(0, 9), r(15, 19)]);
        assert_eq!(clamp(vec![r(20, 30)], 20), Vec::new());
        assert!(clamp(vec![r(0, 5)], 0).is_empty());
    }

    #[test]
    fn test_dedupe_later_delta_wins() {
        let deltas = vec![
            DeltaEntity::updated(1),
            DeltaEntity::added(2),
            DeltaEntity::removed(1),
        ];
        assert_eq!(
            dedupe(deltas),
            vec![DeltaEntity::removed(1), DeltaEntity::added(2)]
        );
    }

    #[test]
    fn test_dedupe_remove_then_add_is_update() {
        let deltas = vec![DeltaEntity::removed(7), DeltaEntity::added(7)];
        assert_eq!(dedupe(deltas), vec![DeltaEntity::updated(7)]);
    }

    #[test]
    fn test_dedupe_add_then_remove_cancels() {
        let deltas = vec![
            DeltaEntity::added(7),
            DeltaEntity::removed(3),
            DeltaEntity::removed(7),
        ];
        assert_eq!(dedupe(deltas), vec![DeltaEntity::removed(3)]);
    }

    #[test]
    fn test_dedupe_add_then_update_stays_add() {
        let deltas = vec![DeltaEntity::added(7), DeltaEntity::updated(7)];
        assert_eq!(dedupe(deltas), vec![DeltaEntity::added(7)]);
    }
}
