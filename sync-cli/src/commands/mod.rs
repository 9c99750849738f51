//! CLI command implementations.

pub mod export;
pub mod import;
pub mod init;
pub mod pull;
pub mod push;
pub mod status;
