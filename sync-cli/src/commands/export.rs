//! Write a backup bundle.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::set_file_permissions_0600;
use crate::session::Session;

/// Run the export command.
pub async fn run(data_dir: &Path, passphrase: Option<&str>, path: &Path) -> Result<()> {
    let session = Session::open(data_dir, passphrase).await?;
    let bundle = session.engine.export_backup().await?;
    session.engine.shutdown();

    let contents = serde_json::to_string_pretty(&bundle)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    set_file_permissions_0600(path).await?;

    println!("Exported {} record(s) to {}", bundle.items.len(), path.display());
    if !bundle.metadata.entity_types.is_empty() {
        let types: Vec<&str> = bundle
            .metadata
            .entity_types
            .iter()
            .map(|t| t.as_str())
            .collect();
        println!("  Types:    {}", types.join(", "));
    }
    println!("  Checksum: {}", bundle.checksum);
    Ok(())
}
