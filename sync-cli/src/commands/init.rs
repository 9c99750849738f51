//! Write config and derive the encryption key.

use anyhow::{Context, Result};
use locksync_client::{Config, EncryptionService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config;
use crate::session;

/// Options for `locksync init`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Folder to sync through.
    pub root: PathBuf,
    /// Directory name under the root.
    pub namespace: String,
    /// Argon2id memory override (KiB).
    pub memory_kib: Option<u32>,
    /// Argon2id passes override.
    pub iterations: Option<u32>,
}

/// Run the init command.
pub async fn run(data_dir: &Path, options: InitOptions, passphrase: Option<&str>) -> Result<()> {
    // Check if already initialized
    if config::exists(data_dir) {
        anyhow::bail!(
            "Already initialized. Delete {} to reinitialize.",
            config::config_path(data_dir).display()
        );
    }

    tokio::fs::create_dir_all(&options.root)
        .await
        .with_context(|| format!("Failed to create sync folder {}", options.root.display()))?;

    let mut config = Config::default();
    config.backend.root = Some(options.root.display().to_string());
    config.backend.namespace = options.namespace;
    if let Some(memory_kib) = options.memory_kib {
        config.kdf.memory_kib = memory_kib;
    }
    if let Some(iterations) = options.iterations {
        config.kdf.iterations = iterations;
    }

    let passphrase = session::resolve_passphrase(passphrase, true)?;
    let crypto = EncryptionService::new(&passphrase, None, config.kdf_params())
        .context("Failed to derive key")?;
    let salt = crypto
        .salt_for(1)?
        .context("Key version 1 has no salt")?;
    config.set_salt(1, &salt);
    config.set_key_check(1, crypto.key_check(1)?);

    // Prove the folder is usable before writing anything locally
    let engine = session::connect(&config, data_dir, Arc::new(crypto)).await?;
    let base = engine.adapter().base_dir().unwrap_or_default();
    engine.shutdown();

    config::save(&config, data_dir).await?;

    println!("Initialized successfully!");
    println!();
    println!("  Sync folder: {}", base.display());
    println!("  Data dir:    {}", data_dir.display());
    println!("  Key:         v1 (Argon2id, {} KiB)", config.kdf.memory_kib);
    println!();
    println!("Other devices need this config.toml and the same passphrase.");

    Ok(())
}
