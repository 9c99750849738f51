//! Configuration management for the locksync CLI.

use anyhow::{Context, Result};
use locksync_client::Config;
use locksync_core::CursorBook;
use std::path::{Path, PathBuf};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Local cursor file; cursors are per device and never synced.
pub const CURSOR_FILE: &str = "cursors.json";

/// Path of the config file.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Path of the cursor file.
pub fn cursor_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CURSOR_FILE)
}

/// Load configuration from a data directory.
pub fn load(data_dir: &Path) -> Result<Config> {
    let path = config_path(data_dir);
    if !path.exists() {
        anyhow::bail!("Not initialized. Run 'locksync init' first.");
    }
    Config::from_file(&path).context("Invalid configuration")
}

/// Save configuration to a data directory.
pub async fn save(config: &Config, data_dir: &Path) -> Result<()> {
    let path = config_path(data_dir);
    config
        .save(&path)
        .context("Failed to save configuration")?;
    set_file_permissions_0600(&path).await?;
    Ok(())
}

/// Check if the data directory holds a config.
pub fn exists(data_dir: &Path) -> bool {
    config_path(data_dir).exists()
}

/// Load the local cursor book, empty if none was written yet.
pub async fn load_cursors(data_dir: &Path) -> Result<CursorBook> {
    match tokio::fs::read_to_string(cursor_path(data_dir)).await {
        Ok(contents) => serde_json::from_str(&contents).context("Invalid cursor file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CursorBook::new()),
        Err(e) => Err(e).context("Failed to read cursor file"),
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
