/// Example scrolling a viewport across a large in-memory collection
///
/// This example shows how to:
/// 1. Create a VirtualizingCache over a MemorySource
/// 2. Move a viewport and watch blocks being rebuilt and filled
/// 3. Mutate the source and forward the deltas to the cache
///
/// Run with:
/// ```bash
/// RUST_LOG=virtualizing_cache=debug cargo run --example scroll
/// ```
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use virtualizing_cache::{
    CacheConfigBuilder, CacheEvent, IndexRange, MemorySource, VirtualizingCache,
};

const ROWS: usize = 100_000;
const VIEWPORT: usize = 40;
const OVERSCAN: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let rows: Vec<String> = (0..ROWS).map(|i| format!("row {i:06}")).collect();
    let source = Arc::new(MemorySource::new(rows));

    let config = CacheConfigBuilder::new()
        .debounce(Duration::from_millis(20))
        .max_request_len(50)
        .build();
    let (cache, mut events) = VirtualizingCache::new(source.clone(), config);

    // Scroll down in small steps; intermediate positions are debounced away
    for top in (0..2_000).step_by(7) {
        cache.update_ranges([viewport(top)?])?;
    }
    wait_for_loads(&mut events).await?;
    info!(ranges = ?cache.ranges(), "Viewport after scrolling");

    // Jump far ahead: the old block is dropped and a new one fetched
    cache.update_ranges([viewport(75_000)?])?;
    wait_for_loads(&mut events).await?;

    let first_visible = cache.get(75_000)?.context("first visible row not loaded")?;
    info!(row = %first_visible, "First visible row");

    // Edit the source while the viewport is showing it
    let inserted = source.insert(75_010, "inserted row".to_string()).await?;
    let removed = source.remove(75_030).await?;
    cache.source_changed(vec![inserted, removed])?;

    loop {
        match events.recv().await? {
            CacheEvent::SourceUpdated {
                discarded_items,
                changes,
                total_count,
            } => {
                info!(
                    discarded = discarded_items.len(),
                    changes = changes.len(),
                    total_count,
                    "Source changes reconciled"
                );
                break;
            }
            other => info!(event = other.kind(), "Cache event"),
        }
    }

    info!(row = ?cache.get(75_010)?, "Row at the insertion point");
    cache.dispose();
    Ok(())
}

/// The visible rows starting at `top`, plus overscan on both sides.
fn viewport(top: usize) -> Result<IndexRange> {
    let first = top.saturating_sub(OVERSCAN);
    let last = (top + VIEWPORT + OVERSCAN).min(ROWS - 1);
    Ok(IndexRange::new(first, last)?)
}

/// Logs events until a rebuild's requests have all delivered.
async fn wait_for_loads(events: &mut broadcast::Receiver<CacheEvent<String>>) -> Result<()> {
    let mut rebuilt = false;
    loop {
        let event = tokio::time::timeout(Duration::from_millis(500), events.recv()).await;
        match event {
            Ok(Ok(CacheEvent::RangesUpdated { removed_ranges })) => {
                info!(removed = ?removed_ranges, "Blocks rebuilt");
                rebuilt = true;
            }
            Ok(Ok(CacheEvent::ItemsLoaded { range, block })) => {
                info!(range = %range, loaded = block.loaded_count(), "Items loaded");
            }
            Ok(Ok(other)) => info!(event = other.kind(), "Cache event"),
            Ok(Err(e)) => return Err(e.into()),
            // Quiet for a while after a rebuild: everything has landed
            Err(_) if rebuilt => return Ok(()),
            Err(_) => {}
        }
    }
}
