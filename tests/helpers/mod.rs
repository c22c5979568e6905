// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for virtualizing-cache integration tests
//!
//! Provides a source that records every query and can hold or fail them,
//! plus small event-stream utilities.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Semaphore};
use virtualizing_cache::{CacheEvent, IndexRange, MemorySource, SourceError, VirtualizingSource};

/// How long a test waits for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a test waits to be confident an event is not coming.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Source over a `MemorySource` that records `get_items` calls
///
/// # Example
///
/// ```rust,ignore
/// let source = Arc::new(RecordingSource::new((0..20).collect()).gated());
/// let (cache, events) = VirtualizingCache::new(source.clone(), CacheConfig::minimal());
///
/// cache.update_ranges([range(0, 9)])?;
/// source.release(1);
/// assert_eq!(source.calls(), vec![(0, 10)]);
/// ```
pub struct RecordingSource<T> {
    inner: MemorySource<T>,
    calls: Mutex<Vec<(usize, usize)>>,
    gate: Option<Semaphore>,
    failures: AtomicUsize,
    count_failures: AtomicUsize,
}

impl<T> RecordingSource<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: MemorySource::new(items),
            calls: Mutex::new(Vec::new()),
            gate: None,
            failures: AtomicUsize::new(0),
            count_failures: AtomicUsize::new(0),
        }
    }

    /// Holds every `get_items` call until [`release`](Self::release) lets
    /// it through
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Lets `count` held queries complete
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Makes the next `count` queries fail
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` total count queries fail
    pub fn fail_count_next(&self, count: usize) {
        self.count_failures.store(count, Ordering::SeqCst);
    }

    /// `(start, count)` of every query so far, in call order
    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }

    /// The wrapped source, for mutations
    pub fn memory(&self) -> &MemorySource<T> {
        &self.inner
    }
}

#[async_trait]
impl<T> VirtualizingSource<T> for RecordingSource<T>
where
    T: Clone + PartialEq + Send + Sync,
{
    async fn total_count(&self) -> Result<usize, SourceError> {
        if take_failure(&self.count_failures) {
            return Err(SourceError::unavailable("injected count failure"));
        }
        self.inner.total_count().await
    }

    async fn get_items(&self, start: usize, count: usize) -> Result<Vec<T>, SourceError> {
        self.calls.lock().unwrap().push((start, count));

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| SourceError::unavailable(e.to_string()))?
                .forget();
        }

        if take_failure(&self.failures) {
            return Err(SourceError::query("injected failure"));
        }

        self.inner.get_items(start, count).await
    }

    async fn index_of(&self, entity: &T) -> Result<Option<usize>, SourceError> {
        self.inner.index_of(entity).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Shorthand for a valid range
pub fn range(first: usize, last: usize) -> IndexRange {
    IndexRange::new(first, last).expect("valid test range")
}

/// Next event matching `pick`, skipping the others
///
/// Panics if none arrives within [`EVENT_TIMEOUT`].
pub async fn next_event<T, R>(
    events: &mut broadcast::Receiver<CacheEvent<T>>,
    mut pick: impl FnMut(CacheEvent<T>) -> Option<R>,
) -> R
where
    T: Clone,
{
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for cache event")
            .expect("event stream closed");
        if let Some(picked) = pick(event) {
            return picked;
        }
    }
}

/// Range of the next `ItemsLoaded` event
pub async fn next_loaded<T: Clone>(events: &mut broadcast::Receiver<CacheEvent<T>>) -> IndexRange {
    next_event(events, |event| match event {
        CacheEvent::ItemsLoaded { range, .. } => Some(range),
        _ => None,
    })
    .await
}

/// Every event received within [`QUIET_PERIOD`]
pub async fn drain<T: Clone>(events: &mut broadcast::Receiver<CacheEvent<T>>) -> Vec<CacheEvent<T>> {
    let mut drained = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(QUIET_PERIOD, events.recv()).await {
        drained.push(event);
    }
    drained
}

/// Installs a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
