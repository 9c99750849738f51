//! # sync-client
//!
//! Client library for locksync end-to-end encrypted sync.
//!
//! This is the main library that applications use to sync data.
//!
//! ## Features
//!
//! - **E2E Encryption**: AES-256-GCM envelopes with versioned keys
//! - **Passphrase Key Derivation**: Argon2id with a per-key random salt
//! - **Adapter Abstraction**: Pluggable storage backends (memory, folder)
//! - **Optimistic Concurrency**: Version conflicts are returned, never auto-resolved
//! - **Pure Protocol Logic**: Uses sync-core for side-effect-free cursor, batch and conflict planning
//!
//! ## Example
//!
//! ```ignore
//! use locksync_client::{EncryptionService, KdfParams, MemoryAdapter, SyncEngine, EngineOptions};
//!
//! let crypto = Arc::new(EncryptionService::new("Secure1234", None, KdfParams::default())?);
//! let engine = SyncEngine::new(MemoryAdapter::new(), crypto, EngineOptions::default());
//! engine.connect(&Credentials::for_provider(Provider::Memory)).await?;
//!
//! // Push an encrypted record
//! engine.push_record(&goals, &id, &goal, Version::zero()).await?;
//!
//! // Pull what changed since the last pull
//! let items = engine.pull_changes(&goals).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod config;
pub mod crypto;
pub mod engine;

pub use adapter::{with_timeout, AdapterError, FolderAdapter, MemoryAdapter, SyncAdapter};
pub use config::{Config, ConfigError};
pub use crypto::{
    derive_key, CryptoError, EncryptionService, KdfParams, KeySpec, Salt, SymmetricKey, IV_SIZE,
    KEY_SIZE, MIN_PASSPHRASE_CHARS, SALT_SIZE, TAG_SIZE,
};
pub use engine::{
    DecryptedItem, EngineError, EngineOptions, OutgoingRecord, SyncEngine,
    DEFAULT_REQUEST_TIMEOUT,
};
