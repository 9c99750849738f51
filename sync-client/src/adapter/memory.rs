//! In-memory reference adapter.
//!
//! Implements the full contract against a shared map. Clones share state,
//! so two handles behave like two clients talking to the same backend.
//! Failures can be injected for testing.

use super::{AdapterError, SyncAdapter};
use async_trait::async_trait;
use locksync_core::{build_bundle, plan_import, verify_bundle, BatchConfig, CursorBook, ImportDecision};
use locksync_types::{
    now_millis, ConflictRecord, Credentials, EncryptedEnvelope, EntityId, EntityType,
    ExportBundle, ExportItem, ImportReport, ImportStrategy, Provider, PullItem, PullResult,
    PushResult, QuotaInfo, RateLimitInfo, RemoteVersionInfo, StoredRecord, SyncCursor, Version,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    authenticated: bool,
    records: BTreeMap<(EntityType, EntityId), StoredRecord>,
    cursors: CursorBook,
    clock: u64,
    capacity: Option<u64>,
    rate_limit: Option<RateLimitInfo>,
    batch: BatchConfig,
    fail_next_authenticate: Option<String>,
    failing_ids: BTreeSet<EntityId>,
    push_attempts: usize,
}

impl MemoryInner {
    /// Timestamp for a write, strictly after every earlier write.
    fn next_write_time(&mut self) -> u64 {
        self.clock = now_millis().max(self.clock + 1);
        self.clock
    }

    /// Timestamp for a read, never before the latest write.
    fn read_time(&mut self) -> u64 {
        self.clock = now_millis().max(self.clock);
        self.clock
    }

    fn require_auth(&self) -> Result<(), AdapterError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(AdapterError::NotAuthenticated)
        }
    }

    fn spend_request(&mut self) {
        if let Some(limit) = self.rate_limit.as_mut() {
            limit.remaining = limit.remaining.saturating_sub(1);
        }
    }
}

impl MemoryAdapter {
    /// Create an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this capacity in [`get_quota`](SyncAdapter::get_quota).
    pub fn with_capacity(self, bytes: u64) -> Self {
        self.lock().capacity = Some(bytes);
        self
    }

    /// Use this chunking for batch pushes.
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        self.lock().batch = config;
        self
    }

    /// Report a rate-limit budget; each push or pull spends one request.
    pub fn set_rate_limit(&self, remaining: u32, reset_at: u64) {
        self.lock().rate_limit = Some(RateLimitInfo {
            remaining,
            reset_at,
        });
    }

    /// Cause the next authenticate() to fail with the given error.
    pub fn fail_next_authenticate(&self, error: &str) {
        self.lock().fail_next_authenticate = Some(error.to_string());
    }

    /// Fail every push for this id with a network error until cleared.
    pub fn fail_pushes_for(&self, entity_id: &EntityId) {
        self.lock().failing_ids.insert(entity_id.clone());
    }

    /// Clear injected push failures.
    pub fn clear_failures(&self) {
        self.lock().failing_ids.clear();
    }

    /// Stored record for a key, if any.
    pub fn stored(&self, entity_type: &EntityType, entity_id: &EntityId) -> Option<StoredRecord> {
        self.lock()
            .records
            .get(&(entity_type.clone(), entity_id.clone()))
            .cloned()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Number of push calls received, including rejected ones.
    pub fn push_attempts(&self) -> usize {
        self.lock().push_attempts
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for MemoryAdapter {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl SyncAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AdapterError> {
        let provider = credentials.validate()?;
        if provider != Provider::Memory {
            return Err(AdapterError::Validation(format!(
                "memory adapter cannot use {provider} credentials"
            )));
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_authenticate.take() {
            inner.authenticated = false;
            return Err(AdapterError::Authentication(error));
        }
        inner.authenticated = true;
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    async fn push(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        data: EncryptedEnvelope,
        expected_version: Version,
    ) -> Result<PushResult, AdapterError> {
        data.check_shape()?;
        let mut inner = self.lock();
        inner.require_auth()?;
        inner.push_attempts += 1;
        inner.spend_request();

        if inner.failing_ids.contains(entity_id) {
            return Err(AdapterError::Network(format!(
                "injected failure for {entity_type}/{entity_id}"
            )));
        }

        let key = (entity_type.clone(), entity_id.clone());
        let current = inner.records.get(&key);
        let current_version = current.map(|r| r.version).unwrap_or_default();

        if current_version != expected_version {
            let remote_data = current.map(|r| r.data.clone());
            let detected_at = inner.read_time();
            tracing::debug!(
                "memory: conflict on {}/{}: expected v{}, stored v{}",
                entity_type,
                entity_id,
                expected_version,
                current_version
            );
            return Ok(PushResult::conflicted(ConflictRecord {
                entity_type: entity_type.clone(),
                entity_id: entity_id.clone(),
                local_version: expected_version,
                remote_version: current_version,
                local_data: data,
                remote_data,
                detected_at,
            }));
        }

        let version = current_version.next();
        let timestamp = inner.next_write_time();
        inner.records.insert(
            key,
            StoredRecord {
                data,
                version,
                timestamp,
            },
        );
        Ok(PushResult::accepted(version, timestamp))
    }

    async fn pull(&self, entity_type: &EntityType, since: u64) -> Result<PullResult, AdapterError> {
        let mut inner = self.lock();
        inner.require_auth()?;
        inner.spend_request();

        let items = inner
            .records
            .iter()
            .filter(|((ty, _), record)| ty == entity_type && record.timestamp >= since)
            .map(|((ty, id), record)| PullItem {
                entity_type: ty.clone(),
                entity_id: id.clone(),
                data: record.data.clone(),
                version: record.version,
                timestamp: record.timestamp,
            })
            .collect();
        let pulled_at = inner.read_time();
        Ok(PullResult { items, pulled_at })
    }

    async fn get_remote_version(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<RemoteVersionInfo, AdapterError> {
        let inner = self.lock();
        inner.require_auth()?;
        let record = inner.records.get(&(entity_type.clone(), entity_id.clone()));
        Ok(RemoteVersionInfo {
            entity_type: entity_type.clone(),
            entity_id: entity_id.clone(),
            version: record.map(|r| r.version).unwrap_or_default(),
            last_modified: record.map(|r| r.timestamp),
        })
    }

    async fn get_cursor(&self, entity_type: &EntityType) -> Result<Option<SyncCursor>, AdapterError> {
        Ok(self.lock().cursors.get(entity_type).cloned())
    }

    async fn update_cursor(&self, cursor: SyncCursor) -> Result<(), AdapterError> {
        let entity_type = cursor.entity_type.clone();
        let timestamp = cursor.last_sync_timestamp;
        if !self.lock().cursors.update(cursor) {
            tracing::debug!(
                "memory: ignored stale cursor for {} at {}",
                entity_type,
                timestamp
            );
        }
        Ok(())
    }

    async fn get_quota(&self) -> Result<QuotaInfo, AdapterError> {
        let inner = self.lock();
        inner.require_auth()?;
        let used = inner.records.values().map(|r| r.data.stored_size()).sum();
        let mut quota = QuotaInfo::from_usage(used, inner.capacity);
        quota.rate_limit = inner.rate_limit;
        Ok(quota)
    }

    async fn export_all(&self) -> Result<ExportBundle, AdapterError> {
        let mut inner = self.lock();
        inner.require_auth()?;
        let items = inner
            .records
            .iter()
            .map(|((ty, id), record)| ExportItem {
                entity_type: ty.clone(),
                entity_id: id.clone(),
                data: record.data.clone(),
                version: record.version,
                timestamp: record.timestamp,
            })
            .collect();
        let exported_at = inner.read_time();
        Ok(build_bundle(items, self.name(), exported_at)?)
    }

    async fn import_data(
        &self,
        bundle: &ExportBundle,
        strategy: ImportStrategy,
    ) -> Result<ImportReport, AdapterError> {
        verify_bundle(bundle)?;
        let mut inner = self.lock();
        inner.require_auth()?;

        let mut report = ImportReport::default();
        for item in &bundle.items {
            item.data.check_shape()?;
            let key = (item.entity_type.clone(), item.entity_id.clone());
            let existing = inner.records.get(&key).map(|r| r.version);
            let version = match plan_import(existing, item.version, strategy) {
                ImportDecision::Skip => {
                    report.skipped += 1;
                    continue;
                }
                ImportDecision::Insert { version } => {
                    report.imported += 1;
                    version
                }
                ImportDecision::Overwrite { version } => {
                    report.overwritten += 1;
                    version
                }
            };
            let timestamp = inner.next_write_time();
            inner.records.insert(
                key,
                StoredRecord {
                    data: item.data.clone(),
                    version,
                    timestamp,
                },
            );
        }

        tracing::info!(
            "memory: import finished: {} imported, {} overwritten, {} skipped",
            report.imported,
            report.overwritten,
            report.skipped
        );
        Ok(report)
    }

    fn batch_config(&self) -> BatchConfig {
        self.lock().batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locksync_types::{Algorithm, BatchItemStatus, BatchPushItem, ConflictResolution, EnvelopeMetadata};
    use std::time::Duration;

    fn goals() -> EntityType {
        EntityType::new("goals").unwrap()
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s).unwrap()
    }

    fn envelope(tag: u8) -> EncryptedEnvelope {
        EncryptedEnvelope {
            encrypted_payload: vec![tag; 10],
            iv: vec![tag; 12],
            auth_tag: vec![tag; 16],
            algorithm: Algorithm::Aes256Gcm,
            key_version: 1,
            metadata: EnvelopeMetadata {
                original_size: 10,
                timestamp: 0,
                checksum: None,
            },
        }
    }

    async fn connected() -> MemoryAdapter {
        let adapter = MemoryAdapter::new().with_batch_config(BatchConfig::new(3, Duration::ZERO));
        adapter
            .authenticate(&Credentials::for_provider(Provider::Memory))
            .await
            .unwrap();
        adapter
    }

    // ===========================================
    // Authentication Tests
    // ===========================================

    #[tokio::test]
    async fn operations_require_authentication() {
        let adapter = MemoryAdapter::new();
        assert!(!adapter.is_authenticated());
        let result = adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await;
        assert!(matches!(result, Err(AdapterError::NotAuthenticated)));
        assert!(matches!(
            adapter.pull(&goals(), 0).await,
            Err(AdapterError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn forced_authentication_failure() {
        let adapter = MemoryAdapter::new();
        adapter.fail_next_authenticate("token revoked");
        let creds = Credentials::for_provider(Provider::Memory);

        let result = adapter.authenticate(&creds).await;
        assert!(matches!(result, Err(AdapterError::Authentication(_))));
        assert!(!adapter.is_authenticated());

        adapter.authenticate(&creds).await.unwrap();
        assert!(adapter.is_authenticated());
    }

    #[tokio::test]
    async fn wrong_provider_is_a_validation_error() {
        let adapter = MemoryAdapter::new();
        let creds = Credentials::for_provider(Provider::Dropbox).with_token("t");
        assert!(matches!(
            adapter.authenticate(&creds).await,
            Err(AdapterError::Validation(_))
        ));
        assert!(matches!(
            adapter.authenticate(&Credentials::default()).await,
            Err(AdapterError::Validation(_))
        ));
    }

    // ===========================================
    // Push / Conflict Tests
    // ===========================================

    #[tokio::test]
    async fn first_push_creates_version_one() {
        let adapter = connected().await;
        let result = adapter
            .push(&goals(), &id("g1"), envelope(1), Version::zero())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.version, Version::new(1));
        assert!(!result.conflict_detected());
    }

    #[tokio::test]
    async fn matching_version_increments() {
        let adapter = connected().await;
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let result = adapter
            .push(&goals(), &id("g1"), envelope(2), Version::new(1))
            .await
            .unwrap();
        assert_eq!(result.version, Version::new(2));
        assert_eq!(adapter.stored(&goals(), &id("g1")).unwrap().data, envelope(2));
    }

    #[tokio::test]
    async fn version_mismatch_returns_conflict_without_writing() {
        let adapter = connected().await;
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();

        let result = adapter
            .push(&goals(), &id("g1"), envelope(2), Version::zero())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.conflict_detected());
        let conflict = result.conflict.unwrap();
        assert_eq!(conflict.local_version, Version::zero());
        assert_eq!(conflict.remote_version, Version::new(1));
        assert_eq!(conflict.local_data, envelope(2));
        assert_eq!(conflict.remote_data, Some(envelope(1)));

        // Nothing was written
        let stored = adapter.stored(&goals(), &id("g1")).unwrap();
        assert_eq!(stored.version, Version::new(1));
        assert_eq!(stored.data, envelope(1));
    }

    #[tokio::test]
    async fn expecting_a_missing_record_conflicts() {
        let adapter = connected().await;
        let result = adapter
            .push(&goals(), &id("ghost"), envelope(1), Version::new(3))
            .await
            .unwrap();
        let conflict = result.conflict.unwrap();
        assert_eq!(conflict.remote_version, Version::zero());
        assert!(conflict.remote_data.is_none());
        assert_eq!(adapter.record_count(), 0);
    }

    #[tokio::test]
    async fn malformed_envelope_rejected_before_write() {
        let adapter = connected().await;
        let mut bad = envelope(1);
        bad.auth_tag.truncate(4);
        let result = adapter.push(&goals(), &id("g1"), bad, Version::zero()).await;
        assert!(matches!(result, Err(AdapterError::Validation(_))));
        assert_eq!(adapter.push_attempts(), 0);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = connected().await;
        let b = a.clone();
        a.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let info = b.get_remote_version(&goals(), &id("g1")).await.unwrap();
        assert!(info.exists());
        assert_eq!(info.version, Version::new(1));
    }

    // ===========================================
    // Pull Tests
    // ===========================================

    #[tokio::test]
    async fn pull_filters_by_type_and_time() {
        let adapter = connected().await;
        let tasks = EntityType::new("tasks").unwrap();
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        adapter.push(&tasks, &id("t1"), envelope(2), Version::zero()).await.unwrap();

        let first = adapter.pull(&goals(), 0).await.unwrap();
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].entity_id, id("g1"));

        let second = adapter
            .push(&goals(), &id("g2"), envelope(3), Version::zero())
            .await
            .unwrap();
        assert!(second.timestamp > first.items[0].timestamp);

        let incremental = adapter.pull(&goals(), second.timestamp).await.unwrap();
        assert_eq!(incremental.items.len(), 1);
        assert_eq!(incremental.items[0].entity_id, id("g2"));
    }

    #[tokio::test]
    async fn pull_is_idempotent() {
        let adapter = connected().await;
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let a = adapter.pull(&goals(), 0).await.unwrap();
        let b = adapter.pull(&goals(), 0).await.unwrap();
        assert_eq!(a.items, b.items);
    }

    #[tokio::test]
    async fn write_after_pull_is_seen_by_next_pull() {
        let adapter = connected().await;
        let pulled = adapter.pull(&goals(), 0).await.unwrap();
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let next = adapter.pull(&goals(), pulled.pulled_at).await.unwrap();
        assert_eq!(next.items.len(), 1);
    }

    // ===========================================
    // Batch Tests
    // ===========================================

    #[tokio::test]
    async fn batch_reports_each_item() {
        let adapter = connected().await;
        adapter.push(&goals(), &id("g2"), envelope(9), Version::zero()).await.unwrap();
        adapter.fail_pushes_for(&id("g4"));

        let items = (1..=7)
            .map(|n| BatchPushItem {
                entity_type: goals(),
                entity_id: id(&format!("g{n}")),
                data: envelope(n as u8),
                expected_version: Version::zero(),
            })
            .collect();
        let result = adapter.batch_push(items).await.unwrap();

        assert_eq!(result.results.len(), 7);
        assert_eq!(result.conflicts, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.succeeded, 5);
        assert!(matches!(result.results[1].status, BatchItemStatus::Conflict(_)));
        assert!(matches!(result.results[3].status, BatchItemStatus::Failed { .. }));
        assert_eq!(adapter.record_count(), 6);
    }

    #[tokio::test]
    async fn empty_batch_is_empty_result() {
        let adapter = connected().await;
        let result = adapter.batch_push(vec![]).await.unwrap();
        assert!(result.results.is_empty());
    }

    // ===========================================
    // Resolution Tests
    // ===========================================

    async fn conflict_on_g1(adapter: &MemoryAdapter) -> ConflictRecord {
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        adapter
            .push(&goals(), &id("g1"), envelope(2), Version::zero())
            .await
            .unwrap()
            .conflict
            .unwrap()
    }

    #[tokio::test]
    async fn resolve_local_overwrites_remote() {
        let adapter = connected().await;
        let conflict = conflict_on_g1(&adapter).await;
        adapter
            .resolve_conflict(conflict, ConflictResolution::Local)
            .await
            .unwrap();
        let stored = adapter.stored(&goals(), &id("g1")).unwrap();
        assert_eq!(stored.data, envelope(2));
        assert_eq!(stored.version, Version::new(2));
    }

    #[tokio::test]
    async fn resolve_remote_writes_nothing() {
        let adapter = connected().await;
        let conflict = conflict_on_g1(&adapter).await;
        let attempts = adapter.push_attempts();
        adapter
            .resolve_conflict(conflict, ConflictResolution::Remote)
            .await
            .unwrap();
        assert_eq!(adapter.push_attempts(), attempts);
        assert_eq!(adapter.stored(&goals(), &id("g1")).unwrap().data, envelope(1));
    }

    #[tokio::test]
    async fn resolve_merge_writes_supplied_envelope() {
        let adapter = connected().await;
        let conflict = conflict_on_g1(&adapter).await;
        adapter
            .resolve_conflict(conflict, ConflictResolution::Merge(envelope(7)))
            .await
            .unwrap();
        assert_eq!(adapter.stored(&goals(), &id("g1")).unwrap().data, envelope(7));
    }

    #[tokio::test]
    async fn stale_resolution_fails_without_writing() {
        let adapter = connected().await;
        let conflict = conflict_on_g1(&adapter).await;
        // A third writer moves the record on
        adapter.push(&goals(), &id("g1"), envelope(5), Version::new(1)).await.unwrap();

        let result = adapter
            .resolve_conflict(conflict, ConflictResolution::Manual(envelope(8)))
            .await;
        assert!(matches!(
            result,
            Err(AdapterError::StaleResolution { expected, remote })
                if expected == Version::new(1) && remote == Version::new(2)
        ));
        assert_eq!(adapter.stored(&goals(), &id("g1")).unwrap().data, envelope(5));
    }

    // ===========================================
    // Cursor / Quota / Export Tests
    // ===========================================

    #[tokio::test]
    async fn cursors_never_move_backwards() {
        let adapter = connected().await;
        let mut cursor = SyncCursor::new(goals(), 1);
        cursor.last_sync_timestamp = 500;
        adapter.update_cursor(cursor.clone()).await.unwrap();

        cursor.last_sync_timestamp = 100;
        adapter.update_cursor(cursor).await.unwrap();

        let stored = adapter.get_cursor(&goals()).await.unwrap().unwrap();
        assert_eq!(stored.last_sync_timestamp, 500);
    }

    #[tokio::test]
    async fn quota_is_advisory() {
        let adapter = MemoryAdapter::new().with_capacity(40);
        adapter
            .authenticate(&Credentials::for_provider(Provider::Memory))
            .await
            .unwrap();
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();

        let quota = adapter.get_quota().await.unwrap();
        assert_eq!(quota.used, 38);
        assert_eq!(quota.available, Some(2));

        // Exceeding capacity still writes
        adapter.push(&goals(), &id("g2"), envelope(2), Version::zero()).await.unwrap();
        let quota = adapter.get_quota().await.unwrap();
        assert!(quota.appears_exhausted());
        assert_eq!(adapter.record_count(), 2);
    }

    #[tokio::test]
    async fn rate_limit_budget_is_reported() {
        let adapter = connected().await;
        adapter.set_rate_limit(10, 99_000);
        adapter.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        adapter.pull(&goals(), 0).await.unwrap();

        let limit = adapter.get_quota().await.unwrap().rate_limit.unwrap();
        assert_eq!(limit.remaining, 8);
        assert_eq!(limit.reset_at, 99_000);
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_adapter() {
        let source = connected().await;
        source.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        source.push(&goals(), &id("g1"), envelope(2), Version::new(1)).await.unwrap();
        source.push(&goals(), &id("g2"), envelope(3), Version::zero()).await.unwrap();

        let bundle = source.export_all().await.unwrap();
        assert_eq!(bundle.items.len(), 2);
        assert_eq!(bundle.metadata.source, "memory");

        let target = connected().await;
        let report = target.import_data(&bundle, ImportStrategy::Skip).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(target.stored(&goals(), &id("g1")).unwrap().version, Version::new(2));
    }

    #[tokio::test]
    async fn import_honours_strategy() {
        let source = connected().await;
        source.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let bundle = source.export_all().await.unwrap();

        let target = connected().await;
        target.push(&goals(), &id("g1"), envelope(9), Version::zero()).await.unwrap();
        target.push(&goals(), &id("g1"), envelope(9), Version::new(1)).await.unwrap();

        let report = target.import_data(&bundle, ImportStrategy::Skip).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(target.stored(&goals(), &id("g1")).unwrap().data, envelope(9));

        let report = target
            .import_data(&bundle, ImportStrategy::Overwrite)
            .await
            .unwrap();
        assert_eq!(report.overwritten, 1);
        let stored = target.stored(&goals(), &id("g1")).unwrap();
        assert_eq!(stored.data, envelope(1));
        assert_eq!(stored.version, Version::new(3));
    }

    #[tokio::test]
    async fn tampered_bundle_is_rejected() {
        let source = connected().await;
        source.push(&goals(), &id("g1"), envelope(1), Version::zero()).await.unwrap();
        let mut bundle = source.export_all().await.unwrap();
        bundle.items[0].data.encrypted_payload[0] ^= 1;

        let target = connected().await;
        assert!(matches!(
            target.import_data(&bundle, ImportStrategy::Overwrite).await,
            Err(AdapterError::Bundle(_))
        ));
        assert_eq!(target.record_count(), 0);
    }
}
