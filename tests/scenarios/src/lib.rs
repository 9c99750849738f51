//! # scenario-tests
//!
//! End-to-end scenarios for locksync.
//!
//! These drive the public client API against the reference backends:
//! - Envelope encryption, tamper detection and key rotation
//! - Optimistic concurrency between independent writers
//! - Batch accounting under partial failure
//! - Backup export and restore across backends

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod harness;
pub mod scenarios;
