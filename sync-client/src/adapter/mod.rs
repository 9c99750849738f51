//! Sync adapter contract for locksync.
//!
//! This module defines the capability every storage backend implements.
//! Adapters only ever see [`EncryptedEnvelope`]s; plaintext never crosses
//! this boundary.
//!
//! # Design
//!
//! The contract is async and record-oriented:
//! - `push()` writes one envelope under optimistic concurrency
//! - `pull()` returns everything modified at or after a timestamp
//! - `batch_push()` and `resolve_conflict()` have default implementations
//!   built on `push()`, so backends only implement primitives
//! - cursors are adapter-local and written by the caller after a pull
//!
//! # Example
//!
//! ```ignore
//! let adapter = MemoryAdapter::new();
//! adapter.authenticate(&Credentials::for_provider(Provider::Memory)).await?;
//! let result = adapter.push(&goals, &id, envelope, Version::zero()).await?;
//! assert!(result.success);
//! ```

mod folder;
mod memory;

pub use folder::FolderAdapter;
pub use memory::MemoryAdapter;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use locksync_core::{plan_chunks, plan_resolution, BatchConfig, BatchTally, ExportError, ResolutionPlan};
use locksync_types::{
    BatchItemResult, BatchItemStatus, BatchPushItem, BatchPushResult, ConflictRecord,
    ConflictResolution, Credentials, EncryptedEnvelope, EntityId, EntityType, ExportBundle,
    ImportReport, ImportStrategy, PullResult, PushResult, QuotaInfo, RemoteVersionInfo,
    SyncCursor, SyncError, Version,
};
use thiserror::Error;

/// Adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Malformed credentials, ids or envelopes; raised before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// An operation ran before `authenticate()` succeeded.
    #[error("adapter is not authenticated")]
    NotAuthenticated,

    /// Backend unreachable or request timed out.
    #[error("network error: {0}")]
    Network(String),

    /// A resolution write found the remote moved on again.
    #[error("conflict resolution is stale: expected remote v{expected}, found v{remote}")]
    StaleResolution {
        /// Remote version recorded in the conflict.
        expected: Version,
        /// Remote version found at write time.
        remote: Version,
    },

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Stored record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Export bundle failed verification.
    #[error("bundle error: {0}")]
    Bundle(#[from] ExportError),
}

impl AdapterError {
    /// Whether a caller-level retry could succeed.
    ///
    /// Nothing in this crate retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Network(_))
    }
}

impl From<SyncError> for AdapterError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Serialization(e) => AdapterError::Serialization(e),
            other => AdapterError::Validation(other.to_string()),
        }
    }
}

/// Storage backend capability.
///
/// Implementations handle one storage service each and are
/// interchangeable.
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Short backend name for logs and export metadata.
    fn name(&self) -> &str;

    /// Validate credentials and connectivity.
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AdapterError>;

    /// Check if `authenticate()` has succeeded.
    fn is_authenticated(&self) -> bool;

    /// Write an envelope if the stored version equals `expected_version`.
    ///
    /// A mismatch performs no write and returns a result carrying a
    /// [`ConflictRecord`]. Version zero means "expect no record".
    async fn push(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        data: EncryptedEnvelope,
        expected_version: Version,
    ) -> Result<PushResult, AdapterError>;

    /// Every record of `entity_type` modified at or after `since` (ms).
    async fn pull(&self, entity_type: &EntityType, since: u64) -> Result<PullResult, AdapterError>;

    /// Read-only version probe.
    async fn get_remote_version(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<RemoteVersionInfo, AdapterError>;

    /// Stored cursor for an entity type.
    async fn get_cursor(&self, entity_type: &EntityType) -> Result<Option<SyncCursor>, AdapterError>;

    /// Store a cursor. Older cursors never replace newer ones.
    async fn update_cursor(&self, cursor: SyncCursor) -> Result<(), AdapterError>;

    /// Advisory capacity report.
    async fn get_quota(&self) -> Result<QuotaInfo, AdapterError>;

    /// Dump every record.
    async fn export_all(&self) -> Result<ExportBundle, AdapterError>;

    /// Restore a verified bundle using `strategy` for existing records.
    async fn import_data(
        &self,
        bundle: &ExportBundle,
        strategy: ImportStrategy,
    ) -> Result<ImportReport, AdapterError>;

    /// Chunking used by [`batch_push`](Self::batch_push).
    fn batch_config(&self) -> BatchConfig {
        BatchConfig::default()
    }

    /// Push many items, chunk by chunk.
    ///
    /// Items in a chunk run concurrently; chunks run one after another with
    /// a fixed pause between them. Each push is bounded by
    /// [`BatchConfig::item_timeout`]; an item that fails or times out is
    /// reported as failed and never affects another.
    async fn batch_push(&self, items: Vec<BatchPushItem>) -> Result<BatchPushResult, AdapterError> {
        let config = self.batch_config();
        config
            .validate()
            .map_err(|e| AdapterError::Validation(e.to_string()))?;

        let chunks = plan_chunks(items, config.chunk_size);
        let total = chunks.len();
        let mut tally = BatchTally::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if index > 0 && !config.inter_chunk_delay.is_zero() {
                tokio::time::sleep(config.inter_chunk_delay).await;
            }

            let pushes = chunk.into_iter().map(|item| async move {
                let BatchPushItem {
                    entity_type,
                    entity_id,
                    data,
                    expected_version,
                } = item;
                let push = self.push(&entity_type, &entity_id, data, expected_version);
                let status = match with_timeout(config.item_timeout, "push", push).await {
                    Ok(PushResult {
                        conflict: Some(conflict),
                        ..
                    }) => BatchItemStatus::Conflict(conflict),
                    Ok(result) => BatchItemStatus::Succeeded {
                        version: result.version,
                    },
                    Err(e) => BatchItemStatus::Failed {
                        error: e.to_string(),
                    },
                };
                BatchItemResult {
                    entity_type,
                    entity_id,
                    status,
                }
            });

            for result in join_all(pushes).await {
                tally.record(result);
            }
            tracing::debug!(
                "{}: batch chunk {}/{} done ({} items so far)",
                self.name(),
                index + 1,
                total,
                tally.len()
            );
        }

        let result = tally.finish();
        tracing::info!(
            "{}: batch push finished: {} succeeded, {} failed, {} conflicts",
            self.name(),
            result.succeeded,
            result.failed,
            result.conflicts
        );
        Ok(result)
    }

    /// Settle a conflict. The record is consumed.
    ///
    /// Writes target the remote version captured in the conflict; if the
    /// remote moved again the call fails with
    /// [`AdapterError::StaleResolution`] and nothing is written.
    async fn resolve_conflict(
        &self,
        conflict: ConflictRecord,
        resolution: ConflictResolution,
    ) -> Result<(), AdapterError> {
        let strategy = resolution.strategy();
        match plan_resolution(&conflict, resolution) {
            ResolutionPlan::KeepRemote => {
                tracing::debug!(
                    "{}: kept remote v{} for {}/{}",
                    self.name(),
                    conflict.remote_version,
                    conflict.entity_type,
                    conflict.entity_id
                );
                Ok(())
            }
            ResolutionPlan::Write {
                envelope,
                expected_version,
            } => {
                let result = self
                    .push(
                        &conflict.entity_type,
                        &conflict.entity_id,
                        envelope,
                        expected_version,
                    )
                    .await?;
                if let Some(again) = result.conflict {
                    tracing::warn!(
                        "{}: {} resolution for {}/{} is stale (remote now v{})",
                        self.name(),
                        strategy,
                        conflict.entity_type,
                        conflict.entity_id,
                        again.remote_version
                    );
                    return Err(AdapterError::StaleResolution {
                        expected: expected_version,
                        remote: again.remote_version,
                    });
                }
                tracing::info!(
                    "{}: resolved {}/{} with {} strategy at v{}",
                    self.name(),
                    conflict.entity_type,
                    conflict.entity_id,
                    strategy,
                    result.version
                );
                Ok(())
            }
        }
    }
}

/// Bound an adapter call by `limit`, reporting expiry as a network error.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, future: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Network(format!(
            "{operation} timed out after {limit:?}"
        ))),
    }
}
