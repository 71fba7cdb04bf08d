use super::{
    fetch_user, invalid_from_error, list_repository_permissions, AuthMetadata, AuthMethodKind,
    AuthenticationResult, PermissionResult, TokenType,
};
use crate::client::{ApiRequest, RestClient};
use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use crate::observability::TracingHooks;
use crate::types::{Installation, InstallationList, InstallationToken, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Installation tokens are renewed this long before they expire.
pub const RENEWAL_BUFFER_MINUTES: i64 = 5;

/// JWT claims for GitHub App authentication.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    /// Issued at (Unix timestamp).
    iat: i64,
    /// Expiration (Unix timestamp).
    exp: i64,
    /// Issuer (App ID).
    iss: String,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    installation_id: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + Duration::minutes(RENEWAL_BUFFER_MINUTES)
    }
}

/// GitHub App strategy.
///
/// Holds the user-to-server token and, once exchanged, a short-lived
/// installation token. API calls use the installation token while it is fresh
/// and fall back to the user token otherwise.
#[derive(Debug)]
pub struct GitHubAppStrategy {
    client: RestClient,
    user_token: RwLock<Option<SecretString>>,
    installation_id: RwLock<Option<u64>>,
    installation_token: RwLock<Option<CachedToken>>,
}

impl GitHubAppStrategy {
    /// Creates a strategy around an optional user-to-server token.
    pub fn new(client: RestClient, user_token: Option<SecretString>) -> Self {
        Self {
            client,
            user_token: RwLock::new(user_token),
            installation_id: RwLock::new(None),
            installation_token: RwLock::new(None),
        }
    }

    /// Pins the installation to exchange against.
    pub fn with_installation_id(mut self, installation_id: Option<u64>) -> Self {
        self.installation_id = RwLock::new(installation_id);
        self
    }

    /// Seeds a previously persisted installation token.
    pub fn with_installation_token(mut self, token: SecretString, expires_at: DateTime<Utc>) -> Self {
        self.installation_token = RwLock::new(Some(CachedToken { token, expires_at }));
        self
    }

    /// Installation id, configured or discovered.
    pub async fn installation_id(&self) -> Option<u64> {
        *self.installation_id.read().await
    }

    /// The cached installation token and its expiry, fresh or not.
    pub async fn installation_token(&self) -> Option<(SecretString, DateTime<Utc>)> {
        self.installation_token
            .read()
            .await
            .as_ref()
            .map(|cached| (cached.token.clone(), cached.expires_at))
    }

    /// Returns the fresh installation token, else the user token.
    pub async fn get_token(&self) -> GitHubResult<SecretString> {
        let user_token = self.user_token().await?;
        if let Some(cached) = self.installation_token.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }
        Ok(user_token)
    }

    /// Returns true when a user token is present.
    pub async fn is_configured(&self) -> bool {
        self.user_token.read().await.is_some()
    }

    /// Validates the user token and, when `repo_owner` is given, that the App
    /// is installed on that account.
    pub async fn validate_auth(&self, repo_owner: Option<&str>) -> AuthenticationResult {
        let user_token = match self.user_token().await {
            Ok(token) => token,
            Err(e) => return AuthenticationResult::invalid(e.message()),
        };

        let (user, _) = match fetch_user(&self.client, &user_token).await {
            Ok(found) => found,
            Err(e) => return invalid_from_error(&e),
        };

        let Some(owner) = repo_owner else {
            return AuthenticationResult::valid(user, None);
        };

        match self.list_installations(&user_token).await {
            Ok(installations) => {
                let installed = installations.iter().any(|installation| {
                    installation
                        .account
                        .as_ref()
                        .map_or(false, |account| account.login.eq_ignore_ascii_case(owner))
                });
                if installed {
                    AuthenticationResult::valid(user, None)
                } else {
                    AuthenticationResult::invalid(format!(
                        "GitHub App is not installed for '{}'",
                        owner
                    ))
                }
            }
            Err(e) => invalid_from_error(&e),
        }
    }

    /// Checks the three permission axes through the user token's repository
    /// listing, which only includes repositories the App can reach.
    pub async fn check_permissions(&self, repo_owner: Option<&str>) -> PermissionResult {
        match self.user_token().await {
            Ok(token) => PermissionResult::from_permissions(
                list_repository_permissions(&self.client, &token, repo_owner).await,
            ),
            Err(e) => PermissionResult::failed(e.message()),
        }
    }

    /// True when no installation token is held or it expires within the
    /// renewal buffer.
    pub async fn needs_renewal(&self) -> bool {
        self.installation_token
            .read()
            .await
            .as_ref()
            .map_or(true, |cached| !cached.is_fresh())
    }

    /// Exchanges for a new installation token and caches it.
    ///
    /// With App credentials configured the exchange signs a JWT and calls
    /// GitHub directly; otherwise the configured backend performs it on the
    /// user's behalf.
    pub async fn refresh_token(&self) -> GitHubResult<SecretString> {
        let user_token = self.user_token().await?;
        let installation_id = self.resolve_installation_id(&user_token).await?;
        let minted = self.exchange(&user_token, installation_id).await?;

        TracingHooks::on_auth_token_refresh(installation_id, minted.expires_at);

        let token = SecretString::new(minted.token);
        *self.installation_token.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at: minted.expires_at,
        });
        Ok(token)
    }

    /// Forgets every token and the installation id.
    pub async fn clear_auth(&self) {
        *self.user_token.write().await = None;
        *self.installation_id.write().await = None;
        *self.installation_token.write().await = None;
    }

    /// Fetches the user behind the user-to-server token.
    pub async fn get_user_info(&self) -> GitHubResult<User> {
        let token = self.user_token().await?;
        fetch_user(&self.client, &token).await.map(|(user, _)| user)
    }

    /// Describes the strategy.
    pub async fn metadata(&self) -> AuthMetadata {
        let configured = self.is_configured().await;
        let cached = self.installation_token.read().await.clone();
        let token_type = match &cached {
            Some(token) if token.is_fresh() => Some(TokenType::Installation),
            _ if configured => Some(TokenType::UserToServer),
            _ => None,
        };

        AuthMetadata {
            method: AuthMethodKind::GithubApp,
            token_type,
            installation_id: self.installation_id().await,
            expires_at: cached.map(|token| token.expires_at),
            configured,
        }
    }

    /// The user-to-server token, regardless of any installation token.
    pub async fn user_token(&self) -> GitHubResult<SecretString> {
        self.user_token
            .read()
            .await
            .clone()
            .ok_or_else(|| GitHubError::not_configured("No GitHub App user token configured"))
    }

    async fn list_installations(&self, user_token: &SecretString) -> GitHubResult<Vec<Installation>> {
        let list: InstallationList = self
            .client
            .send(user_token, ApiRequest::get("/user/installations").query("per_page", 100))
            .await?;
        Ok(list.installations)
    }

    async fn resolve_installation_id(&self, user_token: &SecretString) -> GitHubResult<u64> {
        if let Some(id) = self.installation_id().await {
            return Ok(id);
        }

        let installations = self.list_installations(user_token).await?;
        let first = installations.first().ok_or_else(|| {
            GitHubError::not_configured("No GitHub App installation found for this user")
        })?;
        debug!(installation_id = first.id, "Discovered GitHub App installation");

        *self.installation_id.write().await = Some(first.id);
        Ok(first.id)
    }

    async fn exchange(
        &self,
        user_token: &SecretString,
        installation_id: u64,
    ) -> GitHubResult<InstallationToken> {
        let app = &self.client.config().app;

        let result = if let (Some(app_id), Some(private_key)) = (app.app_id, &app.private_key) {
            let jwt = SecretString::new(generate_jwt(app_id, private_key)?);
            let path = format!("/app/installations/{}/access_tokens", installation_id);
            self.client.send(&jwt, ApiRequest::post(path)).await
        } else if let Some(url) = &app.token_exchange_url {
            let request = ApiRequest::post(url.clone()).json(&ExchangeRequest { installation_id })?;
            self.client.send(user_token, request).await
        } else {
            return Err(GitHubError::not_configured(
                "GitHub App token exchange requires App credentials or a token exchange URL",
            ));
        };

        result.map_err(|e| {
            warn!(installation_id, error = %e, "Installation token exchange failed");
            match e.kind() {
                GitHubErrorKind::TransportFailure | GitHubErrorKind::RateLimited => e,
                _ => {
                    let message = format!("Installation token exchange failed: {}", e.message());
                    let status = e.status_code();
                    let mut error =
                        GitHubError::new(GitHubErrorKind::TokenExchangeFailure, message).with_cause(e);
                    if let Some(status) = status {
                        error = error.with_status(status);
                    }
                    error
                }
            }
        })
    }
}

/// Signs an App JWT: issued 60 seconds in the past for clock drift, valid
/// for 9 minutes (GitHub allows at most 10).
pub(crate) fn generate_jwt(app_id: u64, private_key: &SecretString) -> GitHubResult<String> {
    let now = Utc::now();
    let claims = JwtClaims {
        iat: (now - Duration::seconds(60)).timestamp(),
        exp: (now + Duration::minutes(9)).timestamp(),
        iss: app_id.to_string(),
    };

    let key = EncodingKey::from_rsa_pem(private_key.expose_secret().as_bytes()).map_err(|e| {
        GitHubError::configuration(format!("Failed to parse GitHub App private key: {}", e))
    })?;

    encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
        GitHubError::new(
            GitHubErrorKind::TokenExchangeFailure,
            format!("Failed to generate JWT: {}", e),
        )
    })
}
