//! Configuration loading for locksync.
//!
//! Configuration is loaded from a TOML file (default: `config.toml` in the
//! data directory). The passphrase is never stored here; only the salts
//! needed to re-derive each key version are.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use locksync_core::BatchConfig;
use locksync_types::{Credentials, Provider};
use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoError, KdfParams, Salt};
use crate::engine::EngineOptions;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Storage backend.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Batching and timeouts.
    #[serde(default)]
    pub sync: SyncSettings,
    /// Key derivation parameters and per-version salts.
    #[serde(default)]
    pub kdf: KdfConfig,
}

/// Backend configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend provider (default: folder).
    #[serde(default = "default_provider")]
    pub provider: Provider,
    /// Root directory for the folder backend.
    pub root: Option<String>,
    /// OAuth or personal access token.
    pub token: Option<String>,
    /// Username for basic-auth backends.
    pub username: Option<String>,
    /// Password for basic-auth backends.
    pub password: Option<String>,
    /// `owner/repo` for git-hosted storage.
    pub repo_path: Option<String>,
    /// Base URL for WebDAV.
    pub server_url: Option<String>,
    /// Namespace directory under the root (default: locksync).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Advisory capacity in bytes; unset means unlimited.
    pub capacity_bytes: Option<u64>,
}

/// Sync tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Items pushed concurrently per batch chunk (default: 10).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between batch chunks in milliseconds (default: 100).
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
    /// Bound on each backend call in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Key derivation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Argon2id memory cost in KiB (default: 65536).
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Argon2id passes (default: 3).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Argon2id lanes (default: 1).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Hex salt per key version, keyed by the version number.
    #[serde(default)]
    pub salts: BTreeMap<String, String>,
    /// Key check value per key version, used to catch a mistyped passphrase.
    #[serde(default)]
    pub checks: BTreeMap<String, String>,
}

// Default value functions
fn default_provider() -> Provider {
    Provider::Folder
}

fn default_namespace() -> String {
    "locksync".to_string()
}

fn default_chunk_size() -> usize {
    10
}

fn default_inter_chunk_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_memory_kib() -> u32 {
    64 * 1024 // 64 MiB
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    1
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root: None,
            token: None,
            username: None,
            password: None,
            repo_path: None,
            server_url: None,
            namespace: default_namespace(),
            capacity_bytes: None,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("root", &self.root)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("repo_path", &self.repo_path)
            .field("server_url", &self.server_url)
            .field("namespace", &self.namespace)
            .field("capacity_bytes", &self.capacity_bytes)
            .finish()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
            salts: BTreeMap::new(),
            checks: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Backend credentials derived from the backend section.
    ///
    /// Nothing is checked here; call [`Credentials::validate`] or let the
    /// adapter do it at authenticate time.
    pub fn credentials(&self) -> Credentials {
        let backend = &self.backend;
        Credentials {
            provider: Some(backend.provider),
            token: backend.token.clone(),
            username: backend.username.clone(),
            password: backend.password.clone(),
            repo_path: backend.repo_path.clone(),
            server_url: backend.server_url.clone(),
            root: backend.root.clone(),
        }
    }

    /// Batch chunking. Each item gets the same bound as a single request.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig::new(
            self.sync.chunk_size,
            Duration::from_millis(self.sync.inter_chunk_delay_ms),
        )
        .with_item_timeout(Duration::from_secs(self.sync.request_timeout_secs))
    }

    /// Engine options.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            request_timeout: Duration::from_secs(self.sync.request_timeout_secs),
        }
    }

    /// Argon2id parameters.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
        )
    }

    /// Stored salt for a key version.
    pub fn salt(&self, version: u32) -> Result<Option<Salt>, CryptoError> {
        self.kdf
            .salts
            .get(&version.to_string())
            .map(|hex| Salt::from_hex(hex))
            .transpose()
    }

    /// Record the salt for a key version.
    pub fn set_salt(&mut self, version: u32, salt: &Salt) {
        self.kdf.salts.insert(version.to_string(), salt.to_hex());
    }

    /// Stored key check value for a key version.
    pub fn key_check(&self, version: u32) -> Option<&str> {
        self.kdf.checks.get(&version.to_string()).map(String::as_str)
    }

    /// Record the key check value for a key version.
    pub fn set_key_check(&mut self, version: u32, check: String) {
        self.kdf.checks.insert(version.to_string(), check);
    }

    /// Key versions with a stored salt, ascending.
    pub fn key_versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .kdf
            .salts
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect();
        versions.sort_unstable();
        versions
    }

    /// Folder backend root as a path.
    pub fn root_path(&self) -> Option<PathBuf> {
        self.backend.root.as_ref().map(PathBuf::from)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to write configuration file.
    #[error("failed to write config file {path}: {source}")]
    WriteError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to serialize configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}
