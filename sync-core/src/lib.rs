//! # sync-core
//!
//! Pure protocol logic for locksync (no I/O, instant tests).
//!
//! This crate implements the bookkeeping and decision rules of the sync
//! protocol without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`cursor`]: per entity-type bookmarks that never move backwards
//! - [`batch`]: chunk planning and per-item tallying for batch pushes
//! - [`state`]: the per-record `Unsynced → Pushed → Conflicted → Resolved` machine
//! - [`conflict`]: turning a conflict plus a resolution into a write plan
//! - [`export`]: bundle checksums, verification and import decisions
//!
//! The actual I/O (backends, timers) is performed by `sync-client`, which
//! interprets the plans produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod conflict;
pub mod cursor;
pub mod export;
pub mod state;

pub use batch::{
    plan_chunks, BatchConfig, BatchError, BatchTally, DEFAULT_CHUNK_SIZE, DEFAULT_INTER_CHUNK_DELAY,
    DEFAULT_ITEM_TIMEOUT,
};
pub use conflict::{plan_resolution, ResolutionPlan};
pub use cursor::{advance_cursor, CursorBook};
pub use export::{
    build_bundle, items_checksum, plan_import, verify_bundle, ExportError, ImportDecision,
    EXPORT_FORMAT_VERSION,
};
pub use state::{RecordAction, RecordEvent, RecordState};
