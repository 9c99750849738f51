//! Scenario harness: engines wired to the reference backends.
//!
//! Every engine built here uses cheap Argon2 parameters so scenarios stay
//! fast; nothing else differs from a production setup.

use std::path::Path;
use std::sync::Arc;

use sync_client::{
    EncryptionService, EngineOptions, FolderAdapter, KdfParams, MemoryAdapter, Salt,
    SyncAdapter, SyncEngine,
};
use sync_types::{Credentials, EntityId, EntityType, Provider};

/// Passphrase used across scenarios.
pub const PASSPHRASE: &str = "Secure1234";

/// Argon2 parameters small enough for tests.
pub fn fast_kdf() -> KdfParams {
    KdfParams::new(8, 1, 1)
}

/// A fresh encryption service with a random salt.
pub fn service() -> Arc<EncryptionService> {
    Arc::new(
        EncryptionService::new(PASSPHRASE, None, fast_kdf())
            .expect("scenario passphrase is valid"),
    )
}

/// A service that derives the same key as another device using `salt`.
pub fn service_with_salt(salt: Salt) -> Arc<EncryptionService> {
    Arc::new(
        EncryptionService::new(PASSPHRASE, Some(salt), fast_kdf())
            .expect("scenario passphrase is valid"),
    )
}

/// Entity type by name.
pub fn entity_type(name: &str) -> EntityType {
    EntityType::new(name).expect("scenario entity type is valid")
}

/// Entity id by name.
pub fn entity_id(name: &str) -> EntityId {
    EntityId::new(name).expect("scenario entity id is valid")
}

/// An authenticated engine over a (possibly shared) memory backend.
pub async fn memory_engine(
    adapter: MemoryAdapter,
    crypto: Arc<EncryptionService>,
) -> SyncEngine<MemoryAdapter> {
    let engine = SyncEngine::new(adapter, crypto, EngineOptions::default());
    engine
        .connect(&Credentials::for_provider(Provider::Memory))
        .await
        .expect("memory backend accepts memory credentials");
    engine
}

/// An authenticated engine over a folder backend rooted at `root`.
pub async fn folder_engine(
    root: &Path,
    crypto: Arc<EncryptionService>,
) -> SyncEngine<FolderAdapter> {
    connect_folder(FolderAdapter::new("locksync"), root, crypto).await
}

/// Like [`folder_engine`], persisting cursors to `cursor_file`.
pub async fn folder_engine_with_cursors(
    root: &Path,
    cursor_file: &Path,
    crypto: Arc<EncryptionService>,
) -> SyncEngine<FolderAdapter> {
    let adapter = FolderAdapter::new("locksync").with_cursor_file(cursor_file);
    connect_folder(adapter, root, crypto).await
}

/// Folder credentials rooted at `root`.
pub fn folder_credentials(root: &Path) -> Credentials {
    Credentials::for_provider(Provider::Folder).with_root(&root.display().to_string())
}

async fn connect_folder(
    adapter: FolderAdapter,
    root: &Path,
    crypto: Arc<EncryptionService>,
) -> SyncEngine<FolderAdapter> {
    let engine = SyncEngine::new(adapter, crypto, EngineOptions::default());
    engine
        .connect(&folder_credentials(root))
        .await
        .expect("folder backend accepts a writable root");
    assert!(engine.adapter().is_authenticated());
    engine
}
