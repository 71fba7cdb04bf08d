//! Persisted key-value configuration collaborator.
//!
//! The engine never owns persistence. It reads the active authentication
//! method and saved credentials through [`ConfigStore`], and writes renewed
//! GitHub App credentials back through the same interface.

use crate::errors::GitHubResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Active authentication method (`pat` or `github_app`).
pub const AUTH_METHOD_KEY: &str = "authenticationMethod";
/// Saved personal access token.
pub const PAT_TOKEN_KEY: &str = "githubToken";
/// Saved GitHub App user-to-server token.
pub const APP_USER_TOKEN_KEY: &str = "githubAppUserToken";
/// Saved GitHub App installation id.
pub const APP_INSTALLATION_ID_KEY: &str = "githubAppInstallationId";
/// Saved GitHub App installation token.
pub const APP_INSTALLATION_TOKEN_KEY: &str = "githubAppInstallationToken";
/// Expiry of the saved installation token (RFC 3339).
pub const APP_TOKEN_EXPIRES_AT_KEY: &str = "githubAppTokenExpiresAt";

/// Key-value store supplying persisted settings.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> GitHubResult<Option<String>>;

    /// Writes a value.
    async fn set(&self, key: &str, value: String) -> GitHubResult<()>;

    /// Removes a value.
    async fn remove(&self, key: &str) -> GitHubResult<()>;
}

/// In-memory store, for tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> GitHubResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> GitHubResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> GitHubResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
