//! Identity and ordering types for locksync.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncError;

/// Longest identifier accepted for entity types and ids.
const MAX_IDENT_LEN: usize = 128;

/// Backends map identifiers straight onto file names and object keys, so
/// only a conservative character set is accepted.
fn validate_ident(kind: &str, value: &str) -> Result<(), SyncError> {
    if value.is_empty() {
        return Err(SyncError::Validation(format!("{kind} is empty")));
    }
    if value.len() > MAX_IDENT_LEN {
        return Err(SyncError::Validation(format!(
            "{kind} is {} bytes (max {MAX_IDENT_LEN})",
            value.len()
        )));
    }
    if value.starts_with('.') {
        return Err(SyncError::Validation(format!(
            "{kind} must not start with '.': {value:?}"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(SyncError::Validation(format!(
            "{kind} contains invalid character {bad:?}: {value:?}"
        )));
    }
    Ok(())
}

/// The kind of record being synchronized (e.g. `goals`, `tasks`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Create an entity type, rejecting names that are not storage-safe.
    pub fn new(name: impl Into<String>) -> Result<Self, SyncError> {
        let name = name.into();
        validate_ident("entity type", &name)?;
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityType {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.0)
    }
}

/// Identifier of one record within an entity type.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id, rejecting ids that are not storage-safe.
    pub fn new(id: impl Into<String>) -> Result<Self, SyncError> {
        let id = id.into();
        validate_ident("entity id", &id)?;
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

/// A per-record version number assigned by the backend on every accepted push.
///
/// Version 0 means "the backend holds no record"; the first accepted push
/// produces version 1.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Create a new Version with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Version.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version of a record that does not exist yet.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment the version by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
