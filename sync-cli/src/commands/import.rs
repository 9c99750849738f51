//! Restore a backup bundle.

use anyhow::{Context, Result};
use locksync_types::{ExportBundle, ImportStrategy};
use std::path::Path;

use crate::session::Session;

/// Run the import command.
pub async fn run(
    data_dir: &Path,
    passphrase: Option<&str>,
    path: &Path,
    strategy: ImportStrategy,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let bundle: ExportBundle = serde_json::from_str(&contents).context("Invalid bundle file")?;

    let session = Session::open(data_dir, passphrase).await?;
    let report = session.engine.restore_backup(&bundle, strategy).await?;
    session.engine.shutdown();

    println!("Import finished:");
    println!("  Imported:    {}", report.imported);
    println!("  Overwritten: {}", report.overwritten);
    println!("  Skipped:     {}", report.skipped);
    Ok(())
}
