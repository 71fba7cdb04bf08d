//! Unified GitHub service.
//!
//! [`GitHubService`] resolves exactly one [`AuthStrategy`] when it is built and
//! exposes every repository, content and issue operation the sync engine
//! needs. Existence checks (`repo_exists`, `is_repo_empty`) collapse every
//! failure into `false`; all other operations return a typed [`GitHubError`].
//!
//! [`GitHubError`]: crate::errors::GitHubError

mod files;
mod issues;
mod repos;

pub use files::{PushFileRequest, PushSummary, UpsertResult};
pub use issues::{CreateIssueRequest, UpdateIssueRequest};
pub use repos::CreateRepoRequest;

use crate::auth::{
    clear_persisted, persist_installation, AuthMetadata, AuthMethodKind, AuthStrategy, AuthStrategyFactory,
    AuthenticationConfig, AuthenticationResult, PermissionResult, PermissionStage, TokenType,
};
use crate::client::{ApiRequest, RestClient};
use crate::clone::{CloneReport, RepoRef, RepositoryCloner};
use crate::config::GitHubConfig;
use crate::errors::GitHubResult;
use crate::pagination::{PaginationParams, MAX_PER_PAGE};
use crate::store::ConfigStore;
use crate::types::User;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Facade over the active authentication strategy and the GitHub REST API.
pub struct GitHubService {
    client: RestClient,
    strategy: RwLock<Arc<AuthStrategy>>,
    store: Option<Arc<dyn ConfigStore>>,
}

impl fmt::Debug for GitHubService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubService")
            .field("client", &self.client)
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl GitHubService {
    /// Creates a service from a raw token, treated as a personal access token.
    pub fn new(token: impl Into<String>, config: GitHubConfig) -> GitHubResult<Self> {
        Self::with_auth_config(&AuthenticationConfig::pat(token), config)
    }

    /// Creates a service from structured credentials, bypassing the factory.
    pub fn with_auth_config(auth: &AuthenticationConfig, config: GitHubConfig) -> GitHubResult<Self> {
        let client = RestClient::new(config)?;
        let strategy = AuthStrategy::from_config(client.clone(), auth);
        Ok(Self::from_strategy(client, strategy))
    }

    /// Creates a service around an already built strategy.
    pub fn from_strategy(client: RestClient, strategy: AuthStrategy) -> Self {
        Self {
            client,
            strategy: RwLock::new(Arc::new(strategy)),
            store: None,
        }
    }

    /// Creates a service from the factory's persisted configuration.
    ///
    /// Renewed GitHub App credentials are written back to the factory's store.
    pub async fn from_factory(factory: &AuthStrategyFactory) -> GitHubResult<Self> {
        let strategy = factory.current_strategy().await?;
        Ok(Self::from_strategy(factory.client().clone(), strategy).with_store(factory.store()))
    }

    /// Persists renewed credentials to `store`.
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The underlying transport.
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// The configuration.
    pub fn config(&self) -> &GitHubConfig {
        self.client.config()
    }

    /// The active strategy.
    pub async fn strategy(&self) -> Arc<AuthStrategy> {
        Arc::clone(&*self.strategy.read().await)
    }

    /// Repository cloning operations.
    pub fn cloner(&self) -> RepositoryCloner<'_> {
        RepositoryCloner::new(self)
    }

    // Authentication

    /// Bearer token of the active strategy.
    pub async fn get_token(&self) -> GitHubResult<SecretString> {
        self.strategy().await.get_token().await
    }

    /// Returns true when the credential validates. Never fails.
    #[instrument(skip(self))]
    pub async fn validate_token(&self) -> bool {
        self.strategy().await.validate_auth(None).await.is_valid
    }

    /// Validates the credential against a repository owner.
    #[instrument(skip(self))]
    pub async fn validate_token_and_user(&self, owner: &str) -> AuthenticationResult {
        self.strategy().await.validate_auth(non_empty(owner)).await
    }

    /// Checks permissions, reporting `repos`, `admin` and `code` in that
    /// order before returning the aggregate result.
    #[instrument(skip(self, on_progress))]
    pub async fn verify_token_permissions<F>(&self, owner: &str, mut on_progress: F) -> PermissionResult
    where
        F: FnMut(PermissionStage, bool),
    {
        let result = self.strategy().await.check_permissions(non_empty(owner)).await;
        for stage in PermissionStage::ORDER {
            on_progress(stage, stage.granted(&result.permissions));
        }
        result
    }

    /// Returns true for a `ghp_` token. No network I/O.
    pub async fn is_classic_token(&self) -> bool {
        self.token_type().await == Some(TokenType::Classic)
    }

    /// Returns true for a `github_pat_` token. No network I/O.
    pub async fn is_fine_grained_token(&self) -> bool {
        self.token_type().await == Some(TokenType::FineGrained)
    }

    /// Active credential scheme.
    pub async fn authentication_type(&self) -> AuthMethodKind {
        self.strategy().await.kind()
    }

    /// Active strategy state.
    pub async fn auth_metadata(&self) -> AuthMetadata {
        self.strategy().await.metadata().await
    }

    /// Returns true when the token should be renewed before use.
    pub async fn needs_renewal(&self) -> bool {
        self.strategy().await.needs_renewal().await
    }

    /// Renews the token. GitHub App credentials are persisted when a store
    /// is attached.
    #[instrument(skip(self))]
    pub async fn refresh_auth(&self) -> GitHubResult<()> {
        let strategy = self.strategy.write().await;
        strategy.refresh_token().await?;

        if let (AuthStrategy::GitHubApp(app), Some(store)) = (&**strategy, &self.store) {
            persist_installation(
                store.as_ref(),
                app.installation_id().await,
                app.installation_token().await,
            )
            .await?;
            info!("Persisted renewed GitHub App credentials");
        }
        Ok(())
    }

    /// The authenticated user.
    pub async fn get_user_info(&self) -> GitHubResult<User> {
        self.strategy().await.get_user_info().await
    }

    /// Signs out: forgets the in-memory credentials of the active strategy
    /// and removes saved credentials from the attached store.
    #[instrument(skip(self))]
    pub async fn clear_auth(&self) -> GitHubResult<()> {
        self.strategy().await.clear_auth().await;
        if let Some(store) = &self.store {
            clear_persisted(store.as_ref()).await?;
        }
        info!("Cleared authentication");
        Ok(())
    }

    // Cloning

    /// Copies every file of `source` at `git_ref` into `destination`.
    /// See [`RepositoryCloner::clone_repo_contents`].
    pub async fn clone_repo_contents<F>(
        &self,
        source: &RepoRef,
        destination: &RepoRef,
        git_ref: &str,
        on_progress: F,
    ) -> GitHubResult<CloneReport>
    where
        F: FnMut(u8),
    {
        self.cloner()
            .clone_repo_contents(source, destination, git_ref, on_progress)
            .await
    }

    /// Creates a seeded public scratch repository and returns its name.
    /// See [`RepositoryCloner::create_temporary_public_repo`].
    pub async fn create_temporary_public_repo(
        &self,
        owner: &str,
        source_repo: &str,
        branch: &str,
    ) -> GitHubResult<String> {
        self.cloner()
            .create_temporary_public_repo(owner, source_repo, branch)
            .await
    }

    // Shared helpers

    pub(crate) async fn token(&self) -> GitHubResult<SecretString> {
        self.get_token().await
    }

    /// Token for `/user/*` endpoints, which GitHub refuses for installation
    /// tokens.
    pub(crate) async fn user_scoped_token(&self) -> GitHubResult<SecretString> {
        self.strategy().await.user_token().await
    }

    async fn token_type(&self) -> Option<TokenType> {
        self.get_token()
            .await
            .ok()
            .map(|token| TokenType::classify(token.expose_secret()))
    }

    /// Follows `Link` pagination, building each page's request from its number.
    pub(crate) async fn collect_pages<T, F>(
        &self,
        token: &SecretString,
        mut request: F,
    ) -> GitHubResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnMut() -> ApiRequest,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let params = PaginationParams::new().page(page).per_page(MAX_PER_PAGE);
            let current = self
                .client
                .send_page::<T>(token, request().paginate(&params))
                .await?;
            let next = current.links.next_page();
            items.extend(current.items);

            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// `/repos/{owner}/{repo}` with both segments percent-encoded.
pub(crate) fn repo_path(owner: &str, repo: &str) -> String {
    format!(
        "/repos/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(repo)
    )
}

fn non_empty(owner: &str) -> Option<&str> {
    let owner = owner.trim();
    (!owner.is_empty()).then_some(owner)
}
