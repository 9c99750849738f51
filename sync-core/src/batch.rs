//! Batch planning for locksync.
//!
//! This module provides the pure half of batch pushes:
//! - Fixed-size chunking of the input (chunk size = in-flight parallelism)
//! - A fixed pause between chunks as crude backpressure
//! - A bound on every item's push, so one stalled item fails alone
//! - Per-item tallying into succeeded / failed / conflict counts
//!
//! The adapter layer runs each chunk concurrently and chunks one after the
//! other. A failing item never aborts its siblings.

use std::time::Duration;

use locksync_types::{BatchItemResult, BatchItemStatus, BatchPushResult};
use thiserror::Error;

/// Default number of items pushed concurrently per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Default pause between chunks.
pub const DEFAULT_INTER_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Default bound on a single item's push.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for batch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Chunk size must be at least one.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// A zero item timeout would fail every push.
    #[error("item timeout must be greater than zero")]
    ZeroItemTimeout,
}

/// Chunking and pacing for batch pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items per chunk.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub inter_chunk_delay: Duration,
    /// Bound on each item's push; an expired item is reported as failed.
    pub item_timeout: Duration,
}

impl BatchConfig {
    /// Create a config with the given chunk size and delay.
    pub fn new(chunk_size: usize, inter_chunk_delay: Duration) -> Self {
        Self {
            chunk_size,
            inter_chunk_delay,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    /// Set the per-item push bound.
    pub fn with_item_timeout(mut self, item_timeout: Duration) -> Self {
        self.item_timeout = item_timeout;
        self
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::ZeroChunkSize);
        }
        if self.item_timeout.is_zero() {
            return Err(BatchError::ZeroItemTimeout);
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_INTER_CHUNK_DELAY)
    }
}

/// Split items into consecutive chunks of at most `chunk_size`, keeping order.
///
/// A zero chunk size is treated as one so no item is ever dropped.
/// Allocation follows the input, not the configured chunk size.
pub fn plan_chunks<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let chunk_size = chunk_size.max(1);
    let mut remaining = items.len();
    let mut chunks = Vec::with_capacity(remaining.div_ceil(chunk_size));
    let mut current = Vec::with_capacity(chunk_size.min(remaining));

    for item in items {
        current.push(item);
        remaining -= 1;
        if current.len() == chunk_size {
            chunks.push(std::mem::replace(
                &mut current,
                Vec::with_capacity(chunk_size.min(remaining)),
            ));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Accumulates per-item outcomes into a [`BatchPushResult`].
#[derive(Debug, Default)]
pub struct BatchTally {
    result: BatchPushResult,
}

impl BatchTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one item's outcome.
    pub fn record(&mut self, item: BatchItemResult) {
        match item.status {
            BatchItemStatus::Succeeded { .. } => self.result.succeeded += 1,
            BatchItemStatus::Conflict(_) => self.result.conflicts += 1,
            BatchItemStatus::Failed { .. } => self.result.failed += 1,
        }
        self.result.results.push(item);
    }

    /// Number of items recorded so far.
    pub fn len(&self) -> usize {
        self.result.results.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.result.results.is_empty()
    }

    /// Finish and return the aggregate.
    pub fn finish(self) -> BatchPushResult {
        self.result
    }
}
