//! Values exchanged through the sync adapter contract.

use serde::{Deserialize, Serialize};

use crate::{EncryptedEnvelope, EntityId, EntityType, Version};

/// Per entity-type bookmark of incremental sync progress.
///
/// Owned by the adapter layer, written by the orchestrator after a
/// successful pull, never by the backend itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    /// Entity type this cursor tracks.
    pub entity_type: EntityType,
    /// Pull timestamp (ms) of the last successful pull.
    pub last_sync_timestamp: u64,
    /// Highest record version seen so far.
    pub last_sync_version: Version,
    /// When the cursor was first created (ms).
    pub created_at: u64,
}

impl SyncCursor {
    /// A fresh cursor that has not synced anything yet.
    pub fn new(entity_type: EntityType, created_at: u64) -> Self {
        Self {
            entity_type,
            last_sync_timestamp: 0,
            last_sync_version: Version::zero(),
            created_at,
        }
    }
}

/// The backend's logical storage layout: one object per
/// `(entityType, entityId)` wrapping the envelope with its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The encrypted record.
    pub data: EncryptedEnvelope,
    /// Backend-assigned version.
    pub version: Version,
    /// Unix timestamp (ms) of the write.
    pub timestamp: u64,
}

/// Produced when a push fails because the backend version moved on.
///
/// Consumed by exactly one conflict resolution, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    /// Entity type of the conflicted record.
    pub entity_type: EntityType,
    /// Entity id of the conflicted record.
    pub entity_id: EntityId,
    /// The version the pushing client believed was current.
    pub local_version: Version,
    /// The version the backend actually holds.
    pub remote_version: Version,
    /// The envelope that was rejected.
    pub local_data: EncryptedEnvelope,
    /// The envelope the backend holds. `None` when the backend has no
    /// record at all (`remote_version` is zero).
    pub remote_data: Option<EncryptedEnvelope>,
    /// Unix timestamp (ms) of detection.
    pub detected_at: u64,
}

/// How a conflict should be settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Recommit the local envelope over the remote one.
    Local,
    /// Keep the remote record and discard the local envelope.
    Remote,
    /// The caller supplies the final envelope.
    Manual(EncryptedEnvelope),
    /// The caller merged both sides and supplies the combined envelope.
    /// The adapter performs no semantic merge itself.
    Merge(EncryptedEnvelope),
}

impl ConflictResolution {
    /// Strategy name for logging.
    pub fn strategy(&self) -> &'static str {
        match self {
            ConflictResolution::Local => "local",
            ConflictResolution::Remote => "remote",
            ConflictResolution::Manual(_) => "manual",
            ConflictResolution::Merge(_) => "merge",
        }
    }
}

/// Outcome of a single push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    /// Whether the write happened.
    pub success: bool,
    /// Resulting version on success, current remote version on conflict.
    pub version: Version,
    /// Unix timestamp (ms) of the write or of the rejection.
    pub timestamp: u64,
    /// Present exactly when the push was rejected for a version mismatch.
    pub conflict: Option<ConflictRecord>,
}

impl PushResult {
    /// A push the backend accepted.
    pub fn accepted(version: Version, timestamp: u64) -> Self {
        Self {
            success: true,
            version,
            timestamp,
            conflict: None,
        }
    }

    /// A push the backend rejected because of a version mismatch.
    pub fn conflicted(conflict: ConflictRecord) -> Self {
        Self {
            success: false,
            version: conflict.remote_version,
            timestamp: conflict.detected_at,
            conflict: Some(conflict),
        }
    }

    /// Whether a version conflict was detected.
    pub fn conflict_detected(&self) -> bool {
        self.conflict.is_some()
    }
}

/// One record returned by a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullItem {
    /// Entity type of the record.
    pub entity_type: EntityType,
    /// Entity id of the record.
    pub entity_id: EntityId,
    /// The encrypted record.
    pub data: EncryptedEnvelope,
    /// Remote version.
    pub version: Version,
    /// Remote write timestamp (ms).
    pub timestamp: u64,
}

/// Everything modified at or after the requested timestamp.
///
/// Item order is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// Matching records.
    pub items: Vec<PullItem>,
    /// Backend time (ms) at which the pull was served.
    pub pulled_at: u64,
}

impl PullResult {
    /// Highest version among the pulled items.
    pub fn max_version(&self) -> Option<Version> {
        self.items.iter().map(|item| item.version).max()
    }
}

/// One entry in a batch push request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPushItem {
    /// Entity type of the record.
    pub entity_type: EntityType,
    /// Entity id of the record.
    pub entity_id: EntityId,
    /// The encrypted record.
    pub data: EncryptedEnvelope,
    /// The version the caller believes is current.
    pub expected_version: Version,
}

/// Per-item outcome within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItemStatus {
    /// Written at the given version.
    Succeeded {
        /// New version.
        version: Version,
    },
    /// Rejected for a version mismatch.
    Conflict(ConflictRecord),
    /// Failed for any other reason.
    Failed {
        /// Error description.
        error: String,
    },
}

/// Outcome for one input item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult {
    /// Entity type of the record.
    pub entity_type: EntityType,
    /// Entity id of the record.
    pub entity_id: EntityId,
    /// What happened to it.
    pub status: BatchItemStatus,
}

/// Aggregate of a batch push. Never all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPushResult {
    /// One entry per input item.
    pub results: Vec<BatchItemResult>,
    /// Items written.
    pub succeeded: usize,
    /// Items that failed for non-conflict reasons.
    pub failed: usize,
    /// Items rejected for version mismatch.
    pub conflicts: usize,
}

/// Read-only version probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersionInfo {
    /// Entity type probed.
    pub entity_type: EntityType,
    /// Entity id probed.
    pub entity_id: EntityId,
    /// Current remote version (zero when absent).
    pub version: Version,
    /// Remote write timestamp (ms), `None` when absent.
    pub last_modified: Option<u64>,
}

impl RemoteVersionInfo {
    /// Whether the backend holds the record.
    pub fn exists(&self) -> bool {
        self.version > Version::zero()
    }
}

/// Remaining request budget reported by rate-limited backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests left in the current window.
    pub remaining: u32,
    /// Unix timestamp (ms) when the window resets.
    pub reset_at: u64,
}

/// Advisory capacity report. Never used to block a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaInfo {
    /// Bytes used by this engine's records.
    pub used: u64,
    /// Total capacity, `None` when the backend reports none.
    pub total: Option<u64>,
    /// Remaining capacity, `None` when the backend reports none.
    pub available: Option<u64>,
    /// Rate-limit budget, `None` when not applicable.
    pub rate_limit: Option<RateLimitInfo>,
}

impl QuotaInfo {
    /// Build a report from usage and an optional capacity.
    pub fn from_usage(used: u64, total: Option<u64>) -> Self {
        Self {
            used,
            total,
            available: total.map(|t| t.saturating_sub(used)),
            rate_limit: None,
        }
    }

    /// Whether usage appears to have reached capacity (advisory only).
    pub fn appears_exhausted(&self) -> bool {
        matches!(self.available, Some(0))
    }
}
