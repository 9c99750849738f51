//! Directory-backed adapter.
//!
//! Stores one JSON object per record at
//! `<root>/<namespace>/<entityType>/<entityId>.json`, wrapping
//! `{ data, version, timestamp }`. Pointing `root` at a folder mirrored by
//! a file-sync client turns that service into a backend.
//!
//! Writes go to a dot-prefixed temp file and are renamed into place, so a
//! reader never sees half a record. Pushes from one adapter instance are
//! serialised; separate processes sharing a folder are not coordinated.

use super::{AdapterError, SyncAdapter};
use async_trait::async_trait;
use locksync_core::{build_bundle, plan_import, verify_bundle, BatchConfig, CursorBook, ImportDecision};
use locksync_types::{
    now_millis, ConflictRecord, Credentials, EncryptedEnvelope, EntityId, EntityType,
    ExportBundle, ExportItem, ImportReport, ImportStrategy, Provider, PullItem, PullResult,
    PushResult, QuotaInfo, RemoteVersionInfo, StoredRecord, SyncCursor, Version,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;

const RECORD_EXT: &str = "json";

/// Folder backend.
#[derive(Debug)]
pub struct FolderAdapter {
    namespace: String,
    base: RwLock<Option<PathBuf>>,
    cursor_file: Option<PathBuf>,
    cursors: Mutex<CursorBook>,
    write_lock: Mutex<()>,
    clock: AtomicU64,
    capacity: Option<u64>,
    batch: BatchConfig,
}

impl FolderAdapter {
    /// Create an adapter storing records under `<root>/<namespace>`.
    ///
    /// The root comes from the credentials passed to `authenticate()`.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            base: RwLock::new(None),
            cursor_file: None,
            cursors: Mutex::new(CursorBook::new()),
            write_lock: Mutex::new(()),
            clock: AtomicU64::new(0),
            capacity: None,
            batch: BatchConfig::default(),
        }
    }

    /// Persist cursors to this local file instead of keeping them in memory.
    ///
    /// Keep it outside the synced folder: cursors are per client.
    pub fn with_cursor_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cursor_file = Some(path.into());
        self
    }

    /// Report this capacity in quota queries.
    pub fn with_capacity(mut self, bytes: Option<u64>) -> Self {
        self.capacity = bytes;
        self
    }

    /// Use this chunking for batch pushes.
    pub fn with_batch_config(mut self, config: BatchConfig) -> Self {
        self.batch = config;
        self
    }

    /// Directory holding this namespace, once authenticated.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.base
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_base(&self) -> Result<PathBuf, AdapterError> {
        self.base_dir().ok_or(AdapterError::NotAuthenticated)
    }

    fn record_path(base: &Path, entity_type: &EntityType, entity_id: &EntityId) -> PathBuf {
        base.join(entity_type.as_str())
            .join(format!("{}.{RECORD_EXT}", entity_id.as_str()))
    }

    fn next_write_time(&self) -> u64 {
        let next = now_millis().max(self.clock.load(Ordering::SeqCst) + 1);
        self.clock.fetch_max(next, Ordering::SeqCst);
        next
    }

    fn read_time(&self) -> u64 {
        now_millis().max(self.clock.load(Ordering::SeqCst))
    }

    async fn persist_cursors(&self, book: &CursorBook) -> Result<(), AdapterError> {
        if let Some(path) = &self.cursor_file {
            let bytes = serde_json::to_vec_pretty(book)?;
            write_atomic(path, &bytes).await?;
        }
        Ok(())
    }

    /// Every record under the namespace as `(type, id, record)`.
    async fn scan(
        &self,
        base: &Path,
        unreadable: Unreadable,
    ) -> Result<Vec<(EntityType, EntityId, StoredRecord)>, AdapterError> {
        let mut out = Vec::new();
        let mut types = match tokio::fs::read_dir(base).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = types.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(entity_type) = EntityType::new(name) else {
                continue;
            };
            for (entity_id, record) in read_type_dir(&entry.path(), unreadable).await? {
                out.push((entity_type.clone(), entity_id, record));
            }
        }
        Ok(out)
    }
}

/// Read one record file; `None` when it does not exist.
async fn read_record(path: &Path) -> Result<Option<StoredRecord>, AdapterError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// What to do with a record file that exists but does not parse.
///
/// A file-sync client may still be delivering it. Anything that moves a
/// cursor or produces a backup must fail rather than miss it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unreadable {
    Fail,
    Skip,
}

/// All records in one entity-type directory.
async fn read_type_dir(
    dir: &Path,
    unreadable: Unreadable,
) -> Result<Vec<(EntityId, StoredRecord)>, AdapterError> {
    let mut out = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        // Temp files are dot-prefixed and never valid ids
        let Ok(entity_id) = EntityId::new(stem) else {
            continue;
        };
        match read_record(&path).await {
            Ok(Some(record)) => out.push((entity_id, record)),
            Ok(None) => {}
            Err(AdapterError::Serialization(e)) if unreadable == Unreadable::Skip => {
                tracing::warn!("folder: skipping unreadable record {}: {}", path.display(), e);
            }
            Err(AdapterError::Serialization(e)) => {
                tracing::warn!("folder: unreadable record {}: {}", path.display(), e);
                return Err(AdapterError::Serialization(e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Write via temp file + rename so readers never see partial content.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AdapterError> {
    let parent = path
        .parent()
        .ok_or_else(|| AdapterError::Validation(format!("{} has no parent", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SyncAdapter for FolderAdapter {
    fn name(&self) -> &str {
        "folder"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AdapterError> {
        let provider = credentials.validate()?;
        if provider != Provider::Folder {
            return Err(AdapterError::Validation(format!(
                "folder adapter cannot use {provider} credentials"
            )));
        }
        let root = credentials.root.as_deref().map(str::trim).unwrap_or_default();
        let base = PathBuf::from(root).join(&self.namespace);

        tokio::fs::create_dir_all(&base).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                AdapterError::Authentication(format!("cannot write {}: {}", base.display(), e))
            }
            _ => AdapterError::Storage(e),
        })?;

        if let Some(path) = &self.cursor_file {
            match tokio::fs::read(path).await {
                Ok(bytes) => *self.cursors.lock().await = serde_json::from_slice(&bytes)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("folder: using {}", base.display());
        *self.base.write().unwrap_or_else(PoisonError::into_inner) = Some(base);
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.base_dir().is_some()
    }

    async fn push(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
        data: EncryptedEnvelope,
        expected_version: Version,
    ) -> Result<PushResult, AdapterError> {
        data.check_shape()?;
        let base = self.require_base()?;
        let path = Self::record_path(&base, entity_type, entity_id);

        let _guard = self.write_lock.lock().await;
        let current = read_record(&path).await?;
        let current_version = current.as_ref().map(|r| r.version).unwrap_or_default();

        if current_version != expected_version {
            tracing::debug!(
                "folder: conflict on {}/{}: expected v{}, stored v{}",
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
                remote_data: current.map(|r| r.data),
                detected_at: self.read_time(),
            }));
        }

        let record = StoredRecord {
            data,
            version: current_version.next(),
            timestamp: self.next_write_time(),
        };
        write_atomic(&path, &serde_json::to_vec(&record)?).await?;
        Ok(PushResult::accepted(record.version, record.timestamp))
    }

    async fn pull(&self, entity_type: &EntityType, since: u64) -> Result<PullResult, AdapterError> {
        let base = self.require_base()?;
        let pulled_at = self.read_time();
        let items = read_type_dir(&base.join(entity_type.as_str()), Unreadable::Fail)
            .await?
            .into_iter()
            .filter(|(_, record)| record.timestamp >= since)
            .map(|(entity_id, record)| PullItem {
                entity_type: entity_type.clone(),
                entity_id,
                data: record.data,
                version: record.version,
                timestamp: record.timestamp,
            })
            .collect();
        Ok(PullResult { items, pulled_at })
    }

    async fn get_remote_version(
        &self,
        entity_type: &EntityType,
        entity_id: &EntityId,
    ) -> Result<RemoteVersionInfo, AdapterError> {
        let base = self.require_base()?;
        let record = read_record(&Self::record_path(&base, entity_type, entity_id)).await?;
        Ok(RemoteVersionInfo {
            entity_type: entity_type.clone(),
            entity_id: entity_id.clone(),
            version: record.as_ref().map(|r| r.version).unwrap_or_default(),
            last_modified: record.map(|r| r.timestamp),
        })
    }

    async fn get_cursor(&self, entity_type: &EntityType) -> Result<Option<SyncCursor>, AdapterError> {
        Ok(self.cursors.lock().await.get(entity_type).cloned())
    }

    async fn update_cursor(&self, cursor: SyncCursor) -> Result<(), AdapterError> {
        let mut book = self.cursors.lock().await;
        let entity_type = cursor.entity_type.clone();
        if !book.update(cursor) {
            tracing::debug!("folder: ignored stale cursor for {}", entity_type);
            return Ok(());
        }
        self.persist_cursors(&book).await
    }

    async fn get_quota(&self) -> Result<QuotaInfo, AdapterError> {
        let base = self.require_base()?;
        let used = self
            .scan(&base, Unreadable::Skip)
            .await?
            .iter()
            .map(|(_, _, record)| record.data.stored_size())
            .sum();
        Ok(QuotaInfo::from_usage(used, self.capacity))
    }

    async fn export_all(&self) -> Result<ExportBundle, AdapterError> {
        let base = self.require_base()?;
        let items = self
            .scan(&base, Unreadable::Fail)
            .await?
            .into_iter()
            .map(|(entity_type, entity_id, record)| ExportItem {
                entity_type,
                entity_id,
                data: record.data,
                version: record.version,
                timestamp: record.timestamp,
            })
            .collect();
        Ok(build_bundle(items, self.name(), self.read_time())?)
    }

    async fn import_data(
        &self,
        bundle: &ExportBundle,
        strategy: ImportStrategy,
    ) -> Result<ImportReport, AdapterError> {
        verify_bundle(bundle)?;
        let base = self.require_base()?;
        for item in &bundle.items {
            item.data.check_shape()?;
        }

        let _guard = self.write_lock.lock().await;
        let mut report = ImportReport::default();
        for item in &bundle.items {
            let path = Self::record_path(&base, &item.entity_type, &item.entity_id);
            let existing = read_record(&path).await?.map(|r| r.version);
            let version = match plan_import(existing, item.version, strategy) {
                ImportDecision::Skip => {
                    tracing::debug!(
                        "folder: import skipped existing {}/{}",
                        item.entity_type,
                        item.entity_id
                    );
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
            let record = StoredRecord {
                data: item.data.clone(),
                version,
                timestamp: self.next_write_time(),
            };
            write_atomic(&path, &serde_json::to_vec(&record)?).await?;
        }

        tracing::info!(
            "folder: import finished: {} imported, {} overwritten, {} skipped",
            report.imported,
            report.overwritten,
            report.skipped
        );
        Ok(report)
    }

    fn batch_config(&self) -> BatchConfig {
        self.batch
    }
}
