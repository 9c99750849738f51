//! Encrypt and push one record.

use anyhow::Result;
use locksync_types::{PushResult, Version};
use std::path::Path;

use crate::session::{self, Session};

/// Which remote version the push is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The caller's last seen version (0 creates).
    Expected(u64),
    /// Whatever the backend currently holds.
    Force,
}

/// Run the push command.
pub async fn run(
    data_dir: &Path,
    passphrase: Option<&str>,
    entity_type: &str,
    entity_id: &str,
    data: &[u8],
    target: Target,
) -> Result<()> {
    let (entity_type, entity_id) = session::entity(entity_type, entity_id)?;
    let session = Session::open(data_dir, passphrase).await?;

    println!("Pushing {} bytes to {}/{}...", data.len(), entity_type, entity_id);

    let result = match target {
        Target::Expected(version) => {
            session
                .engine
                .push_bytes(&entity_type, &entity_id, data, Version::new(version))
                .await?
        }
        Target::Force => {
            session
                .engine
                .force_push(&entity_type, &entity_id, data)
                .await?
        }
    };
    session.engine.shutdown();

    report(&result)
}

fn report(result: &PushResult) -> Result<()> {
    match &result.conflict {
        None => {
            println!("Push successful!");
            println!();
            println!("  Version: {}", result.version);
            Ok(())
        }
        Some(conflict) => {
            println!("Conflict: nothing was written.");
            println!();
            println!("  You expected: v{}", conflict.local_version);
            println!("  Remote has:   v{}", conflict.remote_version);
            println!();
            println!("Pull to see the remote record, then push with --expected-version {} or --force.", conflict.remote_version);
            anyhow::bail!(
                "version conflict on {}/{}",
                conflict.entity_type,
                conflict.entity_id
            )
        }
    }
}
