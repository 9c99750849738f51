//! Cursor bookkeeping for locksync.
//!
//! This module provides per entity-type sync bookmarks with:
//! - Lookup of the "pull since" timestamp for an entity type
//! - Monotonic updates (a stale write never moves a cursor backwards)
//! - Computing the next cursor after a successful pull
//!
//! Incremental pull is timestamp-driven: the next pull asks for everything
//! at or after the previous pull time. Records written exactly on the
//! boundary are re-delivered, which is harmless because pulls are idempotent.

use std::collections::BTreeMap;

use locksync_types::{EntityType, PullResult, SyncCursor};
use serde::{Deserialize, Serialize};

/// Adapter-local cursor store, keyed by entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorBook {
    cursors: BTreeMap<EntityType, SyncCursor>,
}

impl CursorBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cursor for an entity type.
    pub fn get(&self, entity_type: &EntityType) -> Option<&SyncCursor> {
        self.cursors.get(entity_type)
    }

    /// Timestamp to pull from; 0 when the entity type was never synced.
    pub fn since(&self, entity_type: &EntityType) -> u64 {
        self.get(entity_type)
            .map(|c| c.last_sync_timestamp)
            .unwrap_or(0)
    }

    /// Store a cursor.
    ///
    /// Returns `false` (and changes nothing) if the update is older than the
    /// stored cursor. The original `created_at` is preserved and the version
    /// only ever grows.
    pub fn update(&mut self, cursor: SyncCursor) -> bool {
        match self.cursors.get_mut(&cursor.entity_type) {
            Some(existing) => {
                if cursor.last_sync_timestamp < existing.last_sync_timestamp {
                    return false;
                }
                existing.last_sync_timestamp = cursor.last_sync_timestamp;
                existing.last_sync_version =
                    existing.last_sync_version.max(cursor.last_sync_version);
                true
            }
            None => {
                self.cursors.insert(cursor.entity_type.clone(), cursor);
                true
            }
        }
    }

    /// Forget an entity type, forcing the next pull to start from 0.
    pub fn reset(&mut self, entity_type: &EntityType) -> Option<SyncCursor> {
        self.cursors.remove(entity_type)
    }

    /// All cursors, ordered by entity type.
    pub fn iter(&self) -> impl Iterator<Item = &SyncCursor> {
        self.cursors.values()
    }

    /// Number of tracked entity types.
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Check if no entity type is tracked.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// Compute the cursor to write after a successful pull.
///
/// The timestamp comes from the pull itself (when the backend served it),
/// not from the timestamps of the pulled records.
pub fn advance_cursor(
    current: Option<SyncCursor>,
    entity_type: &EntityType,
    pull: &PullResult,
    now: u64,
) -> SyncCursor {
    let mut cursor = current.unwrap_or_else(|| SyncCursor::new(entity_type.clone(), now));
    cursor.last_sync_timestamp = cursor.last_sync_timestamp.max(pull.pulled_at);
    if let Some(max) = pull.max_version() {
        cursor.last_sync_version = cursor.last_sync_version.max(max);
    }
    cursor
}
