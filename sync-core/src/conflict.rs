//! Conflict resolution planning.
//!
//! Conflicts are purely version-based. Turning a [`ConflictRecord`] plus the
//! caller's [`ConflictResolution`] into a concrete write is pure logic; the
//! adapter performs the write.

use locksync_types::{ConflictRecord, ConflictResolution, EncryptedEnvelope, Version};

/// What an adapter has to do to settle a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPlan {
    /// Write `envelope`, expecting the backend to still hold `expected_version`.
    Write {
        /// Envelope to commit.
        envelope: EncryptedEnvelope,
        /// The remote version observed when the conflict was detected.
        expected_version: Version,
    },
    /// Keep what the backend holds and drop the local envelope.
    KeepRemote,
}

/// Plan the write for a resolution.
///
/// Every write targets the remote version recorded in the conflict, so a
/// third writer sneaking in between detection and resolution produces a new
/// conflict instead of being overwritten.
pub fn plan_resolution(conflict: &ConflictRecord, resolution: ConflictResolution) -> ResolutionPlan {
    let expected_version = conflict.remote_version;
    match resolution {
        ConflictResolution::Local => ResolutionPlan::Write {
            envelope: conflict.local_data.clone(),
            expected_version,
        },
        ConflictResolution::Remote => ResolutionPlan::KeepRemote,
        ConflictResolution::Manual(envelope) | ConflictResolution::Merge(envelope) => {
            ResolutionPlan::Write {
                envelope,
                expected_version,
            }
        }
    }
}
