//! Show sync status.

use anyhow::Result;
use locksync_client::{FolderAdapter, SyncAdapter};
use locksync_types::{now_millis, QuotaInfo};
use std::path::Path;

use crate::config;

/// Run the status command.
///
/// Needs no passphrase: only metadata is inspected.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== locksync status ===");
    println!();

    let config = match config::load(data_dir) {
        Ok(config) => config,
        Err(_) => {
            println!("Config: NOT INITIALIZED");
            println!();
            println!("Run 'locksync init --root <folder>' to initialize.");
            return Ok(());
        }
    };

    println!("Backend:");
    println!("  Provider:  {}", config.backend.provider);
    println!(
        "  Root:      {}",
        config.backend.root.as_deref().unwrap_or("<unset>")
    );
    println!("  Namespace: {}", config.backend.namespace);
    println!();

    println!("Keys:");
    let versions = config.key_versions();
    println!(
        "  Versions:  {}",
        versions
            .iter()
            .map(|v| format!("v{}", v))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Argon2id:  {} KiB, {} passes, {} lanes",
        config.kdf.memory_kib, config.kdf.iterations, config.kdf.parallelism
    );
    println!();

    let adapter =
        FolderAdapter::new(&config.backend.namespace).with_capacity(config.backend.capacity_bytes);
    println!("Storage:");
    match adapter.authenticate(&config.credentials()).await {
        Ok(()) => {
            let quota = adapter.get_quota().await?;
            println!("  {}", format_quota(&quota));
        }
        Err(e) => println!("  UNAVAILABLE ({})", e),
    }
    println!();

    let cursors = config::load_cursors(data_dir).await?;
    println!("Cursors:");
    if cursors.is_empty() {
        println!("  none (nothing pulled yet)");
    }
    let now = now_millis();
    for cursor in cursors.iter() {
        println!(
            "  {:<16} v{} ({})",
            cursor.entity_type.as_str(),
            cursor.last_sync_version,
            format_age(now, cursor.last_sync_timestamp)
        );
    }

    Ok(())
}

/// One-line quota summary.
fn format_quota(quota: &QuotaInfo) -> String {
    let mut line = match (quota.total, quota.available) {
        (Some(total), Some(available)) => format!(
            "{} used of {} ({} free)",
            format_bytes(quota.used),
            format_bytes(total),
            format_bytes(available)
        ),
        _ => format!("{} used (no capacity configured)", format_bytes(quota.used)),
    };
    if quota.appears_exhausted() {
        line.push_str(" - FULL (advisory)");
    }
    line
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a millisecond timestamp relative to `now`.
fn format_age(now: u64, ts: u64) -> String {
    let diff = now.saturating_sub(ts) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
