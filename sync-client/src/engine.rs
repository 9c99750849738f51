//! SyncEngine - the orchestrator applications drive.
//!
//! This module provides [`SyncEngine`], which feeds records through the
//! [`EncryptionService`] and drives a [`SyncAdapter`] per entity type.
//!
//! # Architecture
//!
//! ```text
//! Application → SyncEngine → EncryptionService → envelope → SyncAdapter → backend
//!                   ↓
//!              sync-core (cursor, record state, conflict planning)
//! ```
//!
//! Pulls fail closed: if any pulled envelope does not decrypt, the whole
//! pull is rejected and the cursor is not advanced.
//!
//! # Example
//!
//! ```ignore
//! let crypto = Arc::new(EncryptionService::new("Secure1234", None, KdfParams::default())?);
//! let engine = SyncEngine::new(MemoryAdapter::new(), crypto, EngineOptions::default());
//! engine.connect(&Credentials::for_provider(Provider::Memory)).await?;
//!
//! engine.push_record(&goals, &id, &goal, Version::zero()).await?;
//! let changes = engine.pull_changes(&goals).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use locksync_core::{advance_cursor, RecordAction, RecordEvent, RecordState};
use locksync_types::{
    now_millis, BatchItemStatus, BatchPushItem, BatchPushResult, ConflictRecord,
    ConflictResolution, Credentials, EntityId, EntityType, ExportBundle, ImportReport,
    ImportStrategy, PushResult, QuotaInfo, Version,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::adapter::{with_timeout, AdapterError, SyncAdapter};
use crate::crypto::{CryptoError, EncryptionService};

/// Default bound on a single adapter call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Encryption or decryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The adapter reported an error.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Plaintext (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pulled record failed to decrypt; nothing from the pull was accepted.
    #[error("pulled record {entity_type}/{entity_id} rejected: {source}")]
    RejectedRecord {
        /// Entity type of the bad record.
        entity_type: EntityType,
        /// Entity id of the bad record.
        entity_id: EntityId,
        /// Why it was rejected.
        source: CryptoError,
    },
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Bound on each adapter call; expiry surfaces as a network error.
    pub request_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A pulled and decrypted record.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedItem {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity id.
    pub entity_id: EntityId,
    /// Decrypted plaintext.
    pub payload: Vec<u8>,
    /// Remote version.
    pub version: Version,
    /// Remote write timestamp (ms).
    pub timestamp: u64,
}

impl DecryptedItem {
    /// Parse the plaintext as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

impl fmt::Debug for DecryptedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedItem")
            .field("entity_type", &self.entity_type)
            .field("entity_id", &self.entity_id)
            .field(
                "payload",
                &format!("[{} bytes REDACTED]", self.payload.len()),
            )
            .field("version", &self.version)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// One plaintext record for [`SyncEngine::push_batch`].
#[derive(Clone)]
pub struct OutgoingRecord {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity id.
    pub entity_id: EntityId,
    /// Plaintext to encrypt.
    pub plaintext: Vec<u8>,
    /// Version the caller believes is current.
    pub expected_version: Version,
}

impl fmt::Debug for OutgoingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingRecord")
            .field("entity_type", &self.entity_type)
            .field("entity_id", &self.entity_id)
            .field(
                "plaintext",
                &format!("[{} bytes REDACTED]", self.plaintext.len()),
            )
            .field("expected_version", &self.expected_version)
            .finish()
    }
}

type RecordKey = (EntityType, EntityId);

/// The sync orchestrator.
///
/// Owns an adapter and shares an encryption service. Holds no global lock;
/// concurrent pushes for different records proceed independently.
pub struct SyncEngine<A: SyncAdapter> {
    adapter: A,
    crypto: Arc<EncryptionService>,
    options: EngineOptions,
    // One entry per record pushed, resolved or conflicted through this
    // engine; grows with the working set until `forget_record`
    states: Mutex<HashMap<RecordKey, RecordState>>,
}

impl<A: SyncAdapter> SyncEngine<A> {
    /// Create an engine.
    pub fn new(adapter: A, crypto: Arc<EncryptionService>, options: EngineOptions) -> Self {
        Self {
            adapter,
            crypto,
            options,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The encryption service.
    pub fn encryption(&self) -> &EncryptionService {
        &self.crypto
    }

    /// Authenticate the adapter.
    pub async fn connect(&self, credentials: &Credentials) -> Result<(), EngineError> {
        with_timeout(
            self.options.request_timeout,
            "authenticate",
            self.adapter.authenticate(credentials),
        )
        .await?;
        tracing::info!("connected to {} backend", self.adapter.name());
        Ok(())
    }

    /// Encrypt and push raw bytes.
    ///
    /// A version conflict is returned as data in the result; the engine
    /// never picks a winner.
    pub async fn push_bytes(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        plaintext: &[u8],
        expected_version: Version,
    ) -> Result<PushResult, EngineError> {
        let envelope = self.crypto.encrypt(plaintext)?;
        let result = with_timeout(
            self.options.request_timeout,
            "push",
            self.adapter
                .push(entity_type, entity_id, envelope, expected_version),
        )
        .await?;
        self.observe_push(entity_type, entity_id, &result);
        Ok(result)
    }

    /// Serialize a record to JSON, encrypt and push it.
    pub async fn push_record<T: Serialize + Sync>(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        record: &T,
        expected_version: Version,
    ) -> Result<PushResult, EngineError> {
        let bytes = serde_json::to_vec(record)?;
        self.push_bytes(entity_type, entity_id, &bytes, expected_version)
            .await
    }

    /// Probe the remote version and push over it.
    ///
    /// Still returns a conflict if another writer lands between the probe
    /// and the push.
    pub async fn force_push(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        plaintext: &[u8],
    ) -> Result<PushResult, EngineError> {
        let remote = with_timeout(
            self.options.request_timeout,
            "get_remote_version",
            self.adapter.get_remote_version(entity_type, entity_id),
        )
        .await?;
        tracing::debug!(
            "force push {}/{} over remote v{}",
            entity_type,
            entity_id,
            remote.version
        );
        self.push_bytes(entity_type, entity_id, plaintext, remote.version)
            .await
    }

    /// Encrypt and batch-push many records.
    ///
    /// Encryption happens up front; any encryption failure aborts before
    /// anything is sent. After that, outcomes are reported per item and
    /// record states are updated for every item that reached the backend.
    pub async fn push_batch(
        &self,
        records: Vec<OutgoingRecord>,
    ) -> Result<BatchPushResult, EngineError> {
        let items = records
            .into_iter()
            .map(|record| {
                Ok(BatchPushItem {
                    data: self.crypto.encrypt(&record.plaintext)?,
                    entity_type: record.entity_type,
                    entity_id: record.entity_id,
                    expected_version: record.expected_version,
                })
            })
            .collect::<Result<Vec<_>, CryptoError>>()?;

        // Each item is bounded by the adapter's batch item timeout, so a
        // stalled item comes back as a failed item rather than sinking the batch
        let result = self.adapter.batch_push(items).await?;

        for item in &result.results {
            let event = match &item.status {
                BatchItemStatus::Succeeded { version } => {
                    RecordEvent::PushAccepted { version: *version }
                }
                BatchItemStatus::Conflict(conflict) => RecordEvent::PushRejected {
                    local: conflict.local_version,
                    remote: conflict.remote_version,
                },
                BatchItemStatus::Failed { error } => {
                    tracing::warn!(
                        "batch item {}/{} failed: {}",
                        item.entity_type,
                        item.entity_id,
                        error
                    );
                    continue;
                }
            };
            self.apply(&item.entity_type, &item.entity_id, event);
        }
        Ok(result)
    }

    /// Pull and decrypt everything modified at or after `since`.
    ///
    /// Does not touch the cursor.
    pub async fn pull_since(
        &self,
        entity_type: &EntityType,
        since: u64,
    ) -> Result<Vec<DecryptedItem>, EngineError> {
        Ok(self.pull_decrypted(entity_type, since).await?.0)
    }

    /// Cursor-driven incremental pull.
    ///
    /// Reads the cursor, pulls, decrypts every item and only then advances
    /// the cursor. A crash before the cursor write means the same items are
    /// delivered again next time.
    pub async fn pull_changes(
        &self,
        entity_type: &EntityType,
    ) -> Result<Vec<DecryptedItem>, EngineError> {
        let cursor = with_timeout(
            self.options.request_timeout,
            "get_cursor",
            self.adapter.get_cursor(entity_type),
        )
        .await?;
        let since = cursor.as_ref().map(|c| c.last_sync_timestamp).unwrap_or(0);

        let (items, pull) = self.pull_decrypted(entity_type, since).await?;

        let next = advance_cursor(cursor, entity_type, &pull, now_millis());
        with_timeout(
            self.options.request_timeout,
            "update_cursor",
            self.adapter.update_cursor(next),
        )
        .await?;

        tracing::debug!(
            "pulled {} {} records since {}",
            items.len(),
            entity_type,
            since
        );
        Ok(items)
    }

    async fn pull_decrypted(
        &self,
        entity_type: &EntityType,
        since: u64,
    ) -> Result<(Vec<DecryptedItem>, locksync_types::PullResult), EngineError> {
        if self.crypto.is_destroyed() {
            return Err(CryptoError::ServiceDestroyed.into());
        }
        let mut pull = with_timeout(
            self.options.request_timeout,
            "pull",
            self.adapter.pull(entity_type, since),
        )
        .await?;

        let mut items = Vec::with_capacity(pull.items.len());
        for item in std::mem::take(&mut pull.items) {
            let payload = self.crypto.decrypt(&item.data).map_err(|source| {
                tracing::warn!(
                    "rejecting pull of {}: {}/{} failed to decrypt: {}",
                    entity_type,
                    item.entity_type,
                    item.entity_id,
                    source
                );
                EngineError::RejectedRecord {
                    entity_type: item.entity_type.clone(),
                    entity_id: item.entity_id.clone(),
                    source,
                }
            })?;
            self.observe_remote(&item.entity_type, &item.entity_id, item.version);
            items.push(DecryptedItem {
                entity_type: item.entity_type.clone(),
                entity_id: item.entity_id.clone(),
                payload,
                version: item.version,
                timestamp: item.timestamp,
            });
            pull.items.push(item);
        }
        Ok((items, pull))
    }

    /// Settle a conflict with one of the four strategies.
    pub async fn resolve(
        &self,
        conflict: ConflictRecord,
        resolution: ConflictResolution,
    ) -> Result<(), EngineError> {
        let entity_type = conflict.entity_type.clone();
        let entity_id = conflict.entity_id.clone();
        with_timeout(
            self.options.request_timeout,
            "resolve_conflict",
            self.adapter.resolve_conflict(conflict, resolution),
        )
        .await?;
        self.apply(&entity_type, &entity_id, RecordEvent::ConflictResolved);
        Ok(())
    }

    /// Decrypt both sides, let the caller merge the plaintexts, then
    /// encrypt the result and resolve with the merge strategy.
    ///
    /// `merge` receives the local plaintext and the remote plaintext
    /// (`None` when the remote record is absent).
    pub async fn resolve_with_merge<F>(
        &self,
        conflict: ConflictRecord,
        merge: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&[u8], Option<&[u8]>) -> Vec<u8> + Send,
    {
        let local = self.crypto.decrypt(&conflict.local_data)?;
        let remote = conflict
            .remote_data
            .as_ref()
            .map(|envelope| self.crypto.decrypt(envelope))
            .transpose()?;
        let merged = merge(&local, remote.as_deref());
        let envelope = self.crypto.encrypt(&merged)?;
        self.resolve(conflict, ConflictResolution::Merge(envelope))
            .await
    }

    /// Dump the backend to a verified bundle.
    pub async fn export_backup(&self) -> Result<ExportBundle, EngineError> {
        let bundle = with_timeout(
            self.options.request_timeout,
            "export_all",
            self.adapter.export_all(),
        )
        .await?;
        tracing::info!("exported {} records", bundle.items.len());
        Ok(bundle)
    }

    /// Restore a bundle into the backend.
    pub async fn restore_backup(
        &self,
        bundle: &ExportBundle,
        strategy: ImportStrategy,
    ) -> Result<ImportReport, EngineError> {
        Ok(with_timeout(
            self.options.request_timeout,
            "import_data",
            self.adapter.import_data(bundle, strategy),
        )
        .await?)
    }

    /// Advisory capacity report.
    pub async fn quota(&self) -> Result<QuotaInfo, EngineError> {
        let quota = with_timeout(
            self.options.request_timeout,
            "get_quota",
            self.adapter.get_quota(),
        )
        .await?;
        if quota.appears_exhausted() {
            tracing::warn!(
                "{} backend reports no capacity left (pushes are not blocked)",
                self.adapter.name()
            );
        }
        Ok(quota)
    }

    /// Protocol state of one record as seen by this engine.
    pub fn record_state(&self, entity_type: &EntityType, entity_id: &EntityId) -> RecordState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(entity_type.clone(), entity_id.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Stop tracking a record and return its last known state.
    ///
    /// States are kept for every record this engine has touched. Long-lived
    /// engines cycling through many ids can drop the ones they are done with;
    /// a forgotten record reads as [`RecordState::Unsynced`] again.
    pub fn forget_record(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Option<RecordState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(entity_type.clone(), entity_id.clone()))
    }

    /// Number of records with a tracked state.
    pub fn tracked_records(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Destroy the encryption service. Every later operation fails.
    pub fn shutdown(&self) {
        self.crypto.destroy();
        tracing::info!("sync engine shut down");
    }

    fn observe_push(&self, entity_type: &EntityType, entity_id: &EntityId, result: &PushResult) {
        let event = match &result.conflict {
            Some(conflict) => RecordEvent::PushRejected {
                local: conflict.local_version,
                remote: conflict.remote_version,
            },
            None => RecordEvent::PushAccepted {
                version: result.version,
            },
        };
        self.apply(entity_type, entity_id, event);
    }

    fn observe_remote(&self, entity_type: &EntityType, entity_id: &EntityId, version: Version) {
        let key = (entity_type.clone(), entity_id.clone());
        let tracked = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key);
        if tracked {
            self.apply(entity_type, entity_id, RecordEvent::RemoteObserved { version });
        }
    }

    fn apply(&self, entity_type: &EntityType, entity_id: &EntityId, event: RecordEvent) {
        let actions = {
            let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            let state = states
                .entry((entity_type.clone(), entity_id.clone()))
                .or_default();
            let (next, actions) = state.on_event(event);
            *state = next;
            actions
        };

        for action in actions {
            match action {
                RecordAction::SurfaceConflict { local, remote } => tracing::info!(
                    "conflict on {}/{}: pushed against v{}, remote is v{}",
                    entity_type,
                    entity_id,
                    local,
                    remote
                ),
                RecordAction::ProbeRemoteVersion => tracing::debug!(
                    "{}/{} changed remotely; next push should re-read the version",
                    entity_type,
                    entity_id
                ),
            }
        }
    }
}

impl<A: SyncAdapter> fmt::Debug for SyncEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("adapter", &self.adapter.name())
            .field("options", &self.options)
            .finish()
    }
}
