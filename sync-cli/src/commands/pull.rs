//! Pull and decrypt changes.

use anyhow::Result;
use locksync_client::DecryptedItem;
use std::path::Path;

use crate::session::{self, Session};

/// Run the pull command.
pub async fn run(
    data_dir: &Path,
    passphrase: Option<&str>,
    entity_type: &str,
    since: Option<u64>,
) -> Result<()> {
    let entity_type = session::entity_type_arg(entity_type)?;
    let session = Session::open(data_dir, passphrase).await?;

    let items = match since {
        Some(since) => {
            println!("Pulling {} modified since {}...", entity_type, since);
            session.engine.pull_since(&entity_type, since).await?
        }
        None => {
            println!("Pulling {} changes...", entity_type);
            session.engine.pull_changes(&entity_type).await?
        }
    };
    session.engine.shutdown();

    if items.is_empty() {
        println!("No new data.");
        return Ok(());
    }

    println!("Received {} record(s):", items.len());
    println!();
    for item in &items {
        println!("  {}", describe(item));
    }
    Ok(())
}

fn describe(item: &DecryptedItem) -> String {
    // Try to display as UTF-8, otherwise show the size
    let content = match std::str::from_utf8(&item.payload) {
        Ok(s) => s.to_string(),
        Err(_) => format!("<binary {} bytes>", item.payload.len()),
    };
    format!("[{} v{}] {}", item.entity_id, item.version, content)
}
