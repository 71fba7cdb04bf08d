use super::{
    fetch_user, invalid_from_error, list_repository_permissions, AuthMetadata, AuthMethodKind,
    AuthenticationResult, PermissionResult, Permissions, TokenType,
};
use crate::client::{encode_repo_path, RestClient};
use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use crate::types::User;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;

/// Personal access token strategy.
///
/// A PAT never expires from the engine's point of view, so renewal is a no-op.
#[derive(Debug)]
pub struct PatStrategy {
    client: RestClient,
    token: RwLock<Option<SecretString>>,
}

impl PatStrategy {
    /// Creates a strategy around an optional token.
    pub fn new(client: RestClient, token: Option<SecretString>) -> Self {
        Self {
            client,
            token: RwLock::new(token),
        }
    }

    /// Family of the configured token.
    pub async fn token_type(&self) -> Option<TokenType> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| TokenType::classify(t.expose_secret()))
    }

    /// Returns the token, failing with `NotConfigured` when absent.
    pub async fn get_token(&self) -> GitHubResult<SecretString> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| GitHubError::not_configured("No personal access token configured"))
    }

    /// Returns true when a token is present.
    pub async fn is_configured(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Validates the token against `/user`.
    ///
    /// Tokens of unknown format are rejected without a network call. When
    /// `repo_owner` differs from the token's login, the owner must be an
    /// organization.
    pub async fn validate_auth(&self, repo_owner: Option<&str>) -> AuthenticationResult {
        let token = match self.get_token().await {
            Ok(token) => token,
            Err(e) => return AuthenticationResult::invalid(e.message()),
        };

        if !TokenType::classify(token.expose_secret()).is_personal_access_token() {
            return AuthenticationResult::invalid(invalid_format().message());
        }

        let (user, scopes) = match fetch_user(&self.client, &token).await {
            Ok(found) => found,
            Err(e) => return invalid_from_error(&e),
        };

        match repo_owner {
            Some(owner) if !owner.eq_ignore_ascii_case(&user.login) => {
                match self.owner_is_organization(&token, owner).await {
                    Ok(true) => AuthenticationResult::valid(user, scopes),
                    Ok(false) => AuthenticationResult::invalid(format!(
                        "Token belongs to '{}', not '{}'",
                        user.login, owner
                    )),
                    Err(e) if e.kind() == GitHubErrorKind::NotFound => {
                        AuthenticationResult::invalid(format!("Owner '{}' not found", owner))
                    }
                    Err(e) => invalid_from_error(&e),
                }
            }
            _ => AuthenticationResult::valid(user, scopes),
        }
    }

    /// Checks the three permission axes.
    ///
    /// Classic tokens are judged by their OAuth scopes; fine-grained tokens by
    /// what their repository listing exposes.
    pub async fn check_permissions(&self, repo_owner: Option<&str>) -> PermissionResult {
        let token = match self.get_token().await {
            Ok(token) => token,
            Err(e) => return PermissionResult::failed(e.message()),
        };

        match TokenType::classify(token.expose_secret()) {
            TokenType::Classic => match fetch_user(&self.client, &token).await {
                Ok((_, scopes)) => {
                    let scopes = scopes.unwrap_or_default();
                    debug!(scopes = ?scopes, "Classic token scopes");
                    PermissionResult::from_permissions(Permissions::from_scopes(&scopes))
                }
                Err(e) => PermissionResult::failed(format!("Permission check failed: {}", e)),
            },
            TokenType::FineGrained => PermissionResult::from_permissions(
                list_repository_permissions(&self.client, &token, repo_owner).await,
            ),
            _ => PermissionResult::failed(invalid_format().message()),
        }
    }

    /// Returns the current token unchanged.
    pub async fn refresh_token(&self) -> GitHubResult<SecretString> {
        self.get_token().await
    }

    /// Forgets the token.
    pub async fn clear_auth(&self) {
        *self.token.write().await = None;
    }

    /// Fetches the authenticated user.
    pub async fn get_user_info(&self) -> GitHubResult<User> {
        let token = self.get_token().await?;
        fetch_user(&self.client, &token).await.map(|(user, _)| user)
    }

    /// Describes the strategy.
    pub async fn metadata(&self) -> AuthMetadata {
        let token_type = self.token_type().await;
        AuthMetadata {
            method: AuthMethodKind::Pat,
            token_type,
            installation_id: None,
            expires_at: None,
            configured: token_type.is_some(),
        }
    }

    async fn owner_is_organization(&self, token: &SecretString, owner: &str) -> GitHubResult<bool> {
        let path = format!("/users/{}", encode_repo_path(owner));
        let account: User = self.client.get(token, &path).await?;
        Ok(account.is_organization())
    }
}

fn invalid_format() -> GitHubError {
    GitHubError::new(
        GitHubErrorKind::InvalidTokenFormat,
        "Invalid token format: expected a classic (ghp_) or fine-grained (github_pat_) personal access token",
    )
}
