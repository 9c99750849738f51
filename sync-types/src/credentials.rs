//! Backend credentials.
//!
//! The encryption passphrase is deliberately not part of [`Credentials`]:
//! credentials are handed to adapters, the passphrase never is.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncError;

/// Storage service a set of credentials targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// In-process reference backend.
    Memory,
    /// A local directory, typically one mirrored by a file-sync client.
    Folder,
    /// Git-hosted blob storage.
    Github,
    /// Dropbox app folder.
    Dropbox,
    /// Google Drive app data folder.
    GoogleDrive,
    /// WebDAV server.
    Webdav,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Memory => "memory",
            Provider::Folder => "folder",
            Provider::Github => "github",
            Provider::Dropbox => "dropbox",
            Provider::GoogleDrive => "google_drive",
            Provider::Webdav => "webdav",
        };
        f.write_str(name)
    }
}

/// Credentials for one backend.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Target provider. `None` is rejected by [`Credentials::validate`].
    pub provider: Option<Provider>,
    /// OAuth or personal access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Username for basic-auth backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for basic-auth backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `owner/repo` for git-hosted storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    /// Base URL for WebDAV.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Directory for folder-backed storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl Credentials {
    /// Credentials for a provider with no fields set.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    /// Set the token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set username and password.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    /// Set the repository path.
    pub fn with_repo_path(mut self, repo_path: &str) -> Self {
        self.repo_path = Some(repo_path.to_string());
        self
    }

    /// Set the server URL.
    pub fn with_server_url(mut self, url: &str) -> Self {
        self.server_url = Some(url.to_string());
        self
    }

    /// Set the folder root.
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = Some(root.to_string());
        self
    }

    /// Check that every field the provider needs is present and well formed.
    ///
    /// Runs before any network call.
    pub fn validate(&self) -> Result<Provider, SyncError> {
        let provider = self
            .provider
            .ok_or_else(|| SyncError::Validation("provider is required".into()))?;

        match provider {
            Provider::Memory => {}
            Provider::Folder => {
                require(provider, "root", &self.root)?;
            }
            Provider::Github => {
                require(provider, "token", &self.token)?;
                let repo = require(provider, "repo_path", &self.repo_path)?;
                let mut parts = repo.split('/');
                let well_formed = matches!(
                    (parts.next(), parts.next(), parts.next()),
                    (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
                );
                if !well_formed {
                    return Err(SyncError::Validation(format!(
                        "github repo_path must be owner/repo, got {repo:?}"
                    )));
                }
            }
            Provider::Dropbox | Provider::GoogleDrive => {
                require(provider, "token", &self.token)?;
            }
            Provider::Webdav => {
                let url = require(provider, "server_url", &self.server_url)?;
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(SyncError::Validation(format!(
                        "webdav server_url must be http(s), got {url:?}"
                    )));
                }
                require(provider, "username", &self.username)?;
                require(provider, "password", &self.password)?;
            }
        }

        Ok(provider)
    }
}

fn require<'a>(
    provider: Provider,
    field: &str,
    value: &'a Option<String>,
) -> Result<&'a str, SyncError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SyncError::Validation(format!(
            "{provider} credentials require {field}"
        ))),
    }
}

// Secrets stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("repo_path", &self.repo_path)
            .field("server_url", &self.server_url)
            .field("root", &self.root)
            .finish()
    }
}
