//! Opening an engine from the stored config.

use anyhow::{Context, Result};
use locksync_client::{
    Config, EncryptionService, FolderAdapter, KeySpec, SyncEngine, MIN_PASSPHRASE_CHARS,
};
use locksync_types::{EntityId, EntityType, Provider};
use std::path::Path;
use std::sync::Arc;

use crate::config;

/// A connected engine opened from the stored config.
pub struct Session {
    /// Engine over the configured folder.
    pub engine: SyncEngine<FolderAdapter>,
}

impl Session {
    /// Load config, derive keys and connect.
    pub async fn open(data_dir: &Path, passphrase: Option<&str>) -> Result<Self> {
        let config = config::load(data_dir)?;
        let passphrase = resolve_passphrase(passphrase, false)?;
        let crypto = Arc::new(key_service(&config, &passphrase)?);
        let engine = connect(&config, data_dir, crypto).await?;
        Ok(Self { engine })
    }
}

/// Rebuild the encryption service from the salts in the config.
///
/// Every stored key version is re-derived from the same passphrase and
/// checked against its recorded key check, so a mistyped passphrase is
/// refused before anything is encrypted with the wrong key.
pub fn key_service(config: &Config, passphrase: &str) -> Result<EncryptionService> {
    let mut specs = Vec::new();
    for version in config.key_versions() {
        let salt = config
            .salt(version)
            .with_context(|| format!("Invalid salt for key version {}", version))?
            .with_context(|| format!("Missing salt for key version {}", version))?;
        specs.push(KeySpec {
            version,
            passphrase,
            salt,
        });
    }
    if specs.is_empty() {
        anyhow::bail!("No key salts in config. Run 'locksync init' again.");
    }
    let crypto =
        EncryptionService::restore(&specs, config.kdf_params()).context("Failed to derive key")?;

    for spec in &specs {
        let check = config.key_check(spec.version).with_context(|| {
            format!(
                "Missing key check for key version {}. Run 'locksync init' again.",
                spec.version
            )
        })?;
        if crypto.verify_key_check(spec.version, check).is_err() {
            crypto.destroy();
            anyhow::bail!(
                "Wrong passphrase: it does not match key version {}",
                spec.version
            );
        }
    }
    Ok(crypto)
}

/// Build and authenticate a folder engine for this config.
pub async fn connect(
    config: &Config,
    data_dir: &Path,
    crypto: Arc<EncryptionService>,
) -> Result<SyncEngine<FolderAdapter>> {
    if config.backend.provider != Provider::Folder {
        anyhow::bail!(
            "Backend '{}' is not supported by the CLI; use provider = \"folder\"",
            config.backend.provider
        );
    }
    let adapter = FolderAdapter::new(&config.backend.namespace)
        .with_cursor_file(config::cursor_path(data_dir))
        .with_capacity(config.backend.capacity_bytes)
        .with_batch_config(config.batch_config());
    let engine = SyncEngine::new(adapter, crypto, config.engine_options());
    engine
        .connect(&config.credentials())
        .await
        .context("Failed to open sync folder")?;
    Ok(engine)
}

/// Use the given passphrase or prompt for one.
pub fn resolve_passphrase(given: Option<&str>, confirm: bool) -> Result<String> {
    let passphrase = match given {
        Some(p) => p.to_string(),
        None => {
            let first = rpassword::prompt_password("Passphrase: ")
                .context("Failed to read passphrase")?;
            if confirm {
                let second = rpassword::prompt_password("Confirm passphrase: ")
                    .context("Failed to read passphrase")?;
                if first != second {
                    anyhow::bail!("Passphrases do not match");
                }
            }
            first
        }
    };

    if passphrase.chars().count() < MIN_PASSPHRASE_CHARS {
        anyhow::bail!(
            "Passphrase must be at least {} characters",
            MIN_PASSPHRASE_CHARS
        );
    }
    Ok(passphrase)
}

/// Parse CLI entity arguments.
pub fn entity(entity_type: &str, entity_id: &str) -> Result<(EntityType, EntityId)> {
    Ok((entity_type_arg(entity_type)?, EntityId::new(entity_id)?))
}

/// Parse a CLI entity type argument.
pub fn entity_type_arg(entity_type: &str) -> Result<EntityType> {
    EntityType::new(entity_type).with_context(|| format!("Invalid entity type '{}'", entity_type))
}
