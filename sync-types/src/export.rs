//! Full-state export bundle used for backup and migration.

use serde::{Deserialize, Serialize};

use crate::{EncryptedEnvelope, EntityId, EntityType, Version};

/// One record inside an export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    /// Entity type of the record.
    pub entity_type: EntityType,
    /// Entity id of the record.
    pub entity_id: EntityId,
    /// The encrypted record.
    pub data: EncryptedEnvelope,
    /// Version at export time.
    pub version: Version,
    /// Write timestamp (ms) at export time.
    pub timestamp: u64,
}

/// Descriptive metadata carried alongside the items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    /// Name of the adapter that produced the bundle.
    pub source: String,
    /// Number of items in the bundle.
    pub item_count: usize,
    /// Distinct entity types present, sorted.
    pub entity_types: Vec<EntityType>,
}

/// A complete dump of an adapter's records. Still ciphertext only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    /// Bundle format version.
    pub version: u32,
    /// Unix timestamp (ms) of the export.
    pub exported_at: u64,
    /// Hex SHA-256 over the serialized `items`.
    pub checksum: String,
    /// Exported records.
    pub items: Vec<ExportItem>,
    /// Descriptive metadata.
    pub metadata: ExportMetadata,
}

/// What an import does with a record that already exists on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Keep the existing record.
    Skip,
    /// Replace the existing record.
    Overwrite,
}

impl std::str::FromStr for ImportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(ImportStrategy::Skip),
            "overwrite" => Ok(ImportStrategy::Overwrite),
            other => Err(format!(
                "unknown import strategy {other:?} (expected skip or overwrite)"
            )),
        }
    }
}

/// Counts from an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records written that did not exist before.
    pub imported: usize,
    /// Existing records replaced.
    pub overwritten: usize,
    /// Existing records left untouched.
    pub skipped: usize,
}
