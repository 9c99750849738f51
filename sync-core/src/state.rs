//! Per-record sync state machine for locksync.
//!
//! This module provides a pure, side-effect-free state machine tracking one
//! `(entityType, entityId)` from the protocol's point of view. The machine
//! takes events as input and produces a new state plus a list of actions.
//!
//! ```text
//! Unsynced ──PushAccepted──▶ Pushed{v} ──PushAccepted──▶ Pushed{v+1}
//!                               │
//!                          PushRejected
//!                               ▼
//!                          Conflicted ──ConflictResolved──▶ Resolved ──PushAccepted──▶ Pushed{v'}
//! ```
//!
//! There is no locked state. Concurrent writers are expected; the conflict
//! branch is how they meet. The actual I/O is performed by sync-client.

use locksync_types::Version;

/// Record state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    /// Never pushed from this client.
    #[default]
    Unsynced,
    /// Last push was accepted at this version.
    Pushed {
        /// Version assigned by the backend.
        version: Version,
    },
    /// Last push was rejected for a version mismatch.
    Conflicted {
        /// Version the client expected.
        local: Version,
        /// Version the backend holds.
        remote: Version,
    },
    /// The conflict was settled; the next accepted push returns to `Pushed`.
    Resolved,
}

impl RecordState {
    /// Create a new state machine in the Unsynced state.
    pub fn new() -> Self {
        Self::Unsynced
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Pure function. Invalid transitions keep the current state and emit
    /// no actions.
    pub fn on_event(self, event: RecordEvent) -> (Self, Vec<RecordAction>) {
        match (self, event) {
            // Any non-conflicted state accepts a successful push
            (
                Self::Unsynced | Self::Pushed { .. } | Self::Resolved,
                RecordEvent::PushAccepted { version },
            ) => (Self::Pushed { version }, vec![]),

            // A rejection is valid from anywhere, including a stale conflict
            (_, RecordEvent::PushRejected { local, remote }) => (
                Self::Conflicted { local, remote },
                vec![RecordAction::SurfaceConflict { local, remote }],
            ),

            // From Conflicted: only a resolution moves us on
            (Self::Conflicted { .. }, RecordEvent::ConflictResolved) => (Self::Resolved, vec![]),
            (Self::Conflicted { .. }, RecordEvent::PushAccepted { version }) => {
                (Self::Pushed { version }, vec![])
            }

            // Remote moved past what we pushed: the next push would conflict
            (Self::Pushed { version: ours }, RecordEvent::RemoteObserved { version })
                if version > ours =>
            {
                (
                    Self::Pushed { version: ours },
                    vec![RecordAction::ProbeRemoteVersion],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Last version this client knows it wrote.
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Pushed { version } => Some(*version),
            _ => None,
        }
    }

    /// Check if a conflict is waiting for resolution.
    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

/// Events observed for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    /// The backend accepted a write.
    PushAccepted {
        /// Version assigned by the backend.
        version: Version,
    },
    /// The backend rejected a write for a version mismatch.
    PushRejected {
        /// Version the client expected.
        local: Version,
        /// Version the backend holds.
        remote: Version,
    },
    /// A conflict resolution completed.
    ConflictResolved,
    /// A pull or probe saw the record at this remote version.
    RemoteObserved {
        /// Remote version.
        version: Version,
    },
}

/// Actions for the orchestrator to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// Hand the conflict to the caller; never auto-pick a winner.
    SurfaceConflict {
        /// Version the client expected.
        local: Version,
        /// Version the backend holds.
        remote: Version,
    },
    /// Re-read the remote version before the next write.
    ProbeRemoteVersion,
}
