//! Export bundle assembly, verification and import decisions.
//!
//! Bundles stay ciphertext-only. The checksum covers the serialized item
//! list so a truncated or edited backup is rejected before anything is
//! written back.

use std::collections::BTreeSet;

use locksync_types::{
    ExportBundle, ExportItem, ExportMetadata, ImportStrategy, Version,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bundle format version produced by [`build_bundle`].
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Error type for bundle handling.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The bundle was written by an unknown format version.
    #[error("unsupported export format version {0} (supported: {EXPORT_FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    /// Items do not hash to the recorded checksum.
    #[error("export checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum recorded in the bundle.
        expected: String,
        /// Checksum computed over the items.
        actual: String,
    },

    /// Metadata disagrees with the items.
    #[error("export metadata lists {declared} items but bundle has {actual}")]
    ItemCountMismatch {
        /// Count in the metadata.
        declared: usize,
        /// Items actually present.
        actual: usize,
    },

    /// Items could not be serialized for hashing.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hex SHA-256 over the JSON serialization of `items`.
pub fn items_checksum(items: &[ExportItem]) -> Result<String, ExportError> {
    let bytes = serde_json::to_vec(items)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Assemble a bundle. Items are sorted by `(entityType, entityId)` so the
/// same store always produces the same checksum.
pub fn build_bundle(
    mut items: Vec<ExportItem>,
    source: &str,
    exported_at: u64,
) -> Result<ExportBundle, ExportError> {
    items.sort_by(|a, b| {
        (&a.entity_type, &a.entity_id).cmp(&(&b.entity_type, &b.entity_id))
    });

    let entity_types: BTreeSet<_> = items.iter().map(|i| i.entity_type.clone()).collect();
    let checksum = items_checksum(&items)?;

    Ok(ExportBundle {
        version: EXPORT_FORMAT_VERSION,
        exported_at,
        checksum,
        metadata: ExportMetadata {
            source: source.to_string(),
            item_count: items.len(),
            entity_types: entity_types.into_iter().collect(),
        },
        items,
    })
}

/// Check format version, item count and checksum.
pub fn verify_bundle(bundle: &ExportBundle) -> Result<(), ExportError> {
    if bundle.version != EXPORT_FORMAT_VERSION {
        return Err(ExportError::UnsupportedVersion(bundle.version));
    }
    if bundle.metadata.item_count != bundle.items.len() {
        return Err(ExportError::ItemCountMismatch {
            declared: bundle.metadata.item_count,
            actual: bundle.items.len(),
        });
    }
    let actual = items_checksum(&bundle.items)?;
    if !actual.eq_ignore_ascii_case(&bundle.checksum) {
        return Err(ExportError::ChecksumMismatch {
            expected: bundle.checksum.clone(),
            actual,
        });
    }
    Ok(())
}

/// What to do with one incoming bundle item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportDecision {
    /// The target has no such record; write it at this version.
    Insert {
        /// Version to store.
        version: Version,
    },
    /// Replace the existing record at this version.
    Overwrite {
        /// Version to store.
        version: Version,
    },
    /// Leave the existing record alone.
    Skip,
}

/// Decide how to import one item.
///
/// An overwrite never lowers the stored version: it lands at the larger of
/// the incoming version and the successor of the existing one, so clients
/// holding the old version see a conflict instead of a silent rollback.
pub fn plan_import(
    existing: Option<Version>,
    incoming: Version,
    strategy: ImportStrategy,
) -> ImportDecision {
    match (existing, strategy) {
        (None, _) => ImportDecision::Insert {
            version: incoming.max(Version::new(1)),
        },
        (Some(_), ImportStrategy::Skip) => ImportDecision::Skip,
        (Some(current), ImportStrategy::Overwrite) => ImportDecision::Overwrite {
            version: incoming.max(current.next()),
        },
    }
}
