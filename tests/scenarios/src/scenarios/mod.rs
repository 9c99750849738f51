//! End-to-end scenarios for locksync.
//!
//! - `encryption` - envelope round trips, tamper detection, rotation across devices
//! - `sync` - optimistic concurrency, cursors and conflict resolution
//! - `batch` - chunked pushes with independent per-item outcomes
//! - `backup` - export bundles and restore between backends

pub mod backup;
pub mod batch;
pub mod encryption;
pub mod sync;
