//! # locksync
//!
//! Command-line client for locksync encrypted sync over a shared folder.
//!
//! ## Commands
//!
//! - `init`: Write config, derive the key and persist its salt
//! - `push`: Encrypt and push one record
//! - `pull`: Pull and decrypt changes for an entity type
//! - `status`: Show backend, key and cursor status
//! - `export`: Write a verified backup bundle
//! - `import`: Restore a backup bundle
//!
//! ## Example
//!
//! ```bash
//! # Point at a folder mirrored by your file-sync client
//! locksync init --root ~/Dropbox/Apps/locksync
//!
//! # Push a record
//! locksync push goals g1 '{"title":"Learn"}'
//!
//! # On another device with the same config and passphrase
//! locksync pull goals
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod session;

use commands::{export, import, init, pull, push, status};
use locksync_types::ImportStrategy;

/// Command-line client for locksync.
#[derive(Parser, Debug)]
#[command(name = "locksync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for config and local sync state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Encryption passphrase (prompted for if not provided)
    #[arg(long, short, global = true, env = "LOCKSYNC_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write config and derive the encryption key
    Init {
        /// Folder to sync through
        #[arg(long)]
        root: PathBuf,

        /// Directory name under the root
        #[arg(long, default_value = "locksync")]
        namespace: String,

        /// Argon2id memory cost in KiB
        #[arg(long)]
        memory_kib: Option<u32>,

        /// Argon2id passes
        #[arg(long)]
        iterations: Option<u32>,
    },

    /// Encrypt and push one record
    Push {
        /// Entity type, e.g. goals
        entity_type: String,

        /// Entity id
        entity_id: String,

        /// Record content (or use --file)
        message: Option<String>,

        /// File to push
        #[arg(long, short, conflicts_with = "message")]
        file: Option<PathBuf>,

        /// Version you last saw (0 creates a new record)
        #[arg(long, default_value = "0", conflicts_with = "force")]
        expected_version: u64,

        /// Overwrite whatever version the backend holds
        #[arg(long)]
        force: bool,
    },

    /// Pull and decrypt changes
    Pull {
        /// Entity type to pull
        entity_type: String,

        /// Pull everything modified at or after this timestamp (ms) without
        /// touching the cursor
        #[arg(long)]
        since: Option<u64>,
    },

    /// Show sync status
    Status,

    /// Write a backup bundle
    Export {
        /// Output file
        path: PathBuf,
    },

    /// Restore a backup bundle
    Import {
        /// Bundle file
        path: PathBuf,

        /// What to do with records that already exist (skip or overwrite)
        #[arg(long, default_value = "skip")]
        strategy: ImportStrategy,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let passphrase = cli.passphrase.as_deref();
    match cli.command {
        Commands::Init {
            root,
            namespace,
            memory_kib,
            iterations,
        } => {
            let options = init::InitOptions {
                root,
                namespace,
                memory_kib,
                iterations,
            };
            init::run(&data_dir, options, passphrase).await?;
        }
        Commands::Push {
            entity_type,
            entity_id,
            message,
            file,
            expected_version,
            force,
        } => {
            let data = if let Some(msg) = message {
                msg.into_bytes()
            } else if let Some(path) = file {
                tokio::fs::read(&path)
                    .await
                    .context("Failed to read file")?
            } else {
                anyhow::bail!("Must specify message or --file");
            };
            let target = if force {
                push::Target::Force
            } else {
                push::Target::Expected(expected_version)
            };
            push::run(&data_dir, passphrase, &entity_type, &entity_id, &data, target).await?;
        }
        Commands::Pull { entity_type, since } => {
            pull::run(&data_dir, passphrase, &entity_type, since).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Export { path } => {
            export::run(&data_dir, passphrase, &path).await?;
        }
        Commands::Import { path, strategy } => {
            import::run(&data_dir, passphrase, &path, strategy).await?;
        }
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for locksync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "locksync", "locksync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
