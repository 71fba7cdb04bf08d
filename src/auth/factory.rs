use super::{AuthMethodKind, AuthStrategy, GitHubAppStrategy, PatStrategy};
use crate::client::RestClient;
use crate::errors::{GitHubError, GitHubResult};
use crate::store::{
    ConfigStore, APP_INSTALLATION_ID_KEY, APP_INSTALLATION_TOKEN_KEY, APP_TOKEN_EXPIRES_AT_KEY,
    APP_USER_TOKEN_KEY, AUTH_METHOD_KEY, PAT_TOKEN_KEY,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds authentication strategies from persisted configuration.
///
/// The store is an explicit dependency, so resolution never reads hidden
/// global state.
#[derive(Clone)]
pub struct AuthStrategyFactory {
    client: RestClient,
    store: Arc<dyn ConfigStore>,
}

impl fmt::Debug for AuthStrategyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthStrategyFactory")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl AuthStrategyFactory {
    /// Creates a factory.
    pub fn new(client: RestClient, store: Arc<dyn ConfigStore>) -> Self {
        Self { client, store }
    }

    /// The transport strategies are built on.
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// The backing store.
    pub fn store(&self) -> Arc<dyn ConfigStore> {
        Arc::clone(&self.store)
    }

    /// Builds a PAT strategy.
    pub fn create_pat_strategy(&self, token: impl Into<String>) -> AuthStrategy {
        AuthStrategy::Pat(PatStrategy::new(
            self.client.clone(),
            Some(SecretString::new(token.into())),
        ))
    }

    /// Builds a GitHub App strategy.
    pub fn create_github_app_strategy(&self, user_token: Option<String>) -> AuthStrategy {
        AuthStrategy::GitHubApp(GitHubAppStrategy::new(
            self.client.clone(),
            user_token.map(SecretString::new),
        ))
    }

    /// Reads the active method. Missing or unrecognized values mean PAT.
    pub async fn current_method(&self) -> GitHubResult<AuthMethodKind> {
        let method = match self.store.get(AUTH_METHOD_KEY).await? {
            Some(raw) => AuthMethodKind::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unrecognized authentication method, using pat");
                AuthMethodKind::Pat
            }),
            None => AuthMethodKind::Pat,
        };
        Ok(method)
    }

    /// Resolves the strategy for the persisted method and credentials.
    pub async fn current_strategy(&self) -> GitHubResult<AuthStrategy> {
        let method = self.current_method().await?;
        debug!(method = %method, "Resolving authentication strategy");

        match method {
            AuthMethodKind::Pat => {
                let token = self.store.get(PAT_TOKEN_KEY).await?;
                Ok(AuthStrategy::Pat(PatStrategy::new(
                    self.client.clone(),
                    token.map(SecretString::new),
                )))
            }
            AuthMethodKind::GithubApp => {
                let user_token = self.store.get(APP_USER_TOKEN_KEY).await?;
                let installation_id = self.stored_installation_id().await?;
                let mut strategy =
                    GitHubAppStrategy::new(self.client.clone(), user_token.map(SecretString::new))
                        .with_installation_id(installation_id);

                if let Some((token, expires_at)) = self.stored_installation_token().await? {
                    strategy = strategy.with_installation_token(token, expires_at);
                }
                Ok(AuthStrategy::GitHubApp(strategy))
            }
        }
    }

    /// Persists renewed GitHub App credentials.
    pub async fn persist_installation(
        &self,
        installation_id: Option<u64>,
        token: Option<(SecretString, DateTime<Utc>)>,
    ) -> GitHubResult<()> {
        persist_installation(self.store.as_ref(), installation_id, token).await
    }

    /// Removes every saved credential. The active method is kept.
    pub async fn clear_persisted(&self) -> GitHubResult<()> {
        clear_persisted(self.store.as_ref()).await
    }

    async fn stored_installation_id(&self) -> GitHubResult<Option<u64>> {
        match self.store.get(APP_INSTALLATION_ID_KEY).await? {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                GitHubError::configuration(format!("Invalid stored installation id: {}", raw))
            }),
            None => Ok(None),
        }
    }

    async fn stored_installation_token(
        &self,
    ) -> GitHubResult<Option<(SecretString, DateTime<Utc>)>> {
        let token = self.store.get(APP_INSTALLATION_TOKEN_KEY).await?;
        let expires_at = self.store.get(APP_TOKEN_EXPIRES_AT_KEY).await?;

        match (token, expires_at) {
            (Some(token), Some(expires_at)) => match DateTime::parse_from_rfc3339(&expires_at) {
                Ok(parsed) => Ok(Some((SecretString::new(token), parsed.with_timezone(&Utc)))),
                Err(e) => {
                    warn!(error = %e, "Ignoring installation token with unreadable expiry");
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }
}

/// Writes installation id, token and expiry to the store.
pub(crate) async fn persist_installation(
    store: &dyn ConfigStore,
    installation_id: Option<u64>,
    token: Option<(SecretString, DateTime<Utc>)>,
) -> GitHubResult<()> {
    use secrecy::ExposeSecret;

    if let Some(id) = installation_id {
        store.set(APP_INSTALLATION_ID_KEY, id.to_string()).await?;
    }
    if let Some((token, expires_at)) = token {
        store
            .set(APP_INSTALLATION_TOKEN_KEY, token.expose_secret().clone())
            .await?;
        store
            .set(APP_TOKEN_EXPIRES_AT_KEY, expires_at.to_rfc3339())
            .await?;
    }
    Ok(())
}

/// Credential keys dropped on sign-out.
const CREDENTIAL_KEYS: [&str; 5] = [
    PAT_TOKEN_KEY,
    APP_USER_TOKEN_KEY,
    APP_INSTALLATION_ID_KEY,
    APP_INSTALLATION_TOKEN_KEY,
    APP_TOKEN_EXPIRES_AT_KEY,
];

/// Removes saved credentials from the store.
pub(crate) async fn clear_persisted(store: &dyn ConfigStore) -> GitHubResult<()> {
    for key in CREDENTIAL_KEYS {
        store.remove(key).await?;
    }
    debug!("Cleared persisted credentials");
    Ok(())
}
