//! # sync-types
//!
//! Backend-agnostic data model for the locksync encrypted sync engine.
//!
//! This crate provides the foundational types used across all locksync crates:
//! - [`EncryptedEnvelope`] - the opaque unit every backend stores
//! - [`EntityType`], [`EntityId`], [`Version`] - record identity and ordering
//! - [`SyncCursor`], [`ConflictRecord`], [`PushResult`], [`PullResult`],
//!   [`BatchPushResult`], [`QuotaInfo`] - adapter contract values
//! - [`ExportBundle`] - full-state backup format
//! - [`Credentials`] - backend credentials (never the encryption passphrase)
//! - [`SyncError`] - error types
//!
//! Nothing in here performs I/O or touches plaintext.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod credentials;
mod envelope;
mod error;
mod export;
mod ids;
mod sync;

pub use credentials::{Credentials, Provider};
pub use envelope::{Algorithm, EncryptedEnvelope, EnvelopeMetadata};
pub use error::SyncError;
pub use export::{ExportBundle, ExportItem, ExportMetadata, ImportReport, ImportStrategy};
pub use ids::{now_millis, EntityId, EntityType, Version};
pub use sync::{
    BatchItemResult, BatchItemStatus, BatchPushItem, BatchPushResult, ConflictRecord,
    ConflictResolution, PullItem, PullResult, PushResult, QuotaInfo, RateLimitInfo,
    RemoteVersionInfo, StoredRecord, SyncCursor,
};
