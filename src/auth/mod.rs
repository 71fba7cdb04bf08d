//! Authentication strategies for the GitHub API.
//!
//! Two credential schemes sit behind one capability contract:
//!
//! - [`PatStrategy`]: a classic (`ghp_`) or fine-grained (`github_pat_`)
//!   personal access token. Never needs renewal.
//! - [`GitHubAppStrategy`]: a user-to-server token that is exchanged for a
//!   short-lived installation token.
//!
//! [`AuthStrategy`] is the closed set of both; callers dispatch through it.

mod app;
mod factory;
mod pat;

pub use app::GitHubAppStrategy;
pub use factory::AuthStrategyFactory;
pub(crate) use factory::{clear_persisted, persist_installation};
pub use pat::PatStrategy;

use crate::client::{ApiRequest, RestClient};
use crate::errors::{GitHubError, GitHubResult};
use crate::pagination::{PaginationParams, MAX_PER_PAGE};
use crate::types::{Repository, User};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Prefix of classic personal access tokens.
pub const CLASSIC_TOKEN_PREFIX: &str = "ghp_";
/// Prefix of fine-grained personal access tokens.
pub const FINE_GRAINED_TOKEN_PREFIX: &str = "github_pat_";
/// Prefix of GitHub App installation tokens.
pub const INSTALLATION_TOKEN_PREFIX: &str = "ghs_";
/// Prefix of GitHub App user-to-server tokens.
pub const USER_TO_SERVER_TOKEN_PREFIX: &str = "ghu_";

/// Which credential scheme is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethodKind {
    /// Personal access token.
    Pat,
    /// GitHub App.
    GithubApp,
}

impl AuthMethodKind {
    /// Persisted value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pat => "pat",
            Self::GithubApp => "github_app",
        }
    }

    /// Parses a persisted value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pat" => Some(Self::Pat),
            "github_app" => Some(Self::GithubApp),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token family, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// `ghp_` personal access token.
    Classic,
    /// `github_pat_` personal access token.
    FineGrained,
    /// `ghs_` installation token.
    Installation,
    /// `ghu_` user-to-server token.
    UserToServer,
    /// Anything else.
    Unknown,
}

impl TokenType {
    /// Classifies a token by prefix. No network I/O.
    pub fn classify(token: &str) -> Self {
        if token.starts_with(CLASSIC_TOKEN_PREFIX) {
            Self::Classic
        } else if token.starts_with(FINE_GRAINED_TOKEN_PREFIX) {
            Self::FineGrained
        } else if token.starts_with(INSTALLATION_TOKEN_PREFIX) {
            Self::Installation
        } else if token.starts_with(USER_TO_SERVER_TOKEN_PREFIX) {
            Self::UserToServer
        } else {
            Self::Unknown
        }
    }

    /// Returns true for either personal access token family.
    pub fn is_personal_access_token(&self) -> bool {
        matches!(self, Self::Classic | Self::FineGrained)
    }
}

/// Credentials supplied by the user.
///
/// For [`AuthMethodKind::GithubApp`], `token` is the user-to-server token.
#[derive(Debug, Clone)]
pub struct AuthenticationConfig {
    /// Credential scheme.
    pub method: AuthMethodKind,
    /// Bearer token.
    pub token: Option<SecretString>,
    /// GitHub App installation id.
    pub installation_id: Option<u64>,
}

impl AuthenticationConfig {
    /// Personal access token credentials.
    pub fn pat(token: impl Into<String>) -> Self {
        Self {
            method: AuthMethodKind::Pat,
            token: Some(SecretString::new(token.into())),
            installation_id: None,
        }
    }

    /// GitHub App credentials.
    pub fn github_app(user_token: Option<String>, installation_id: Option<u64>) -> Self {
        Self {
            method: AuthMethodKind::GithubApp,
            token: user_token.map(SecretString::new),
            installation_id,
        }
    }
}

/// Outcome of a token validation.
///
/// `is_valid` implies `user_info` is present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthenticationResult {
    /// Whether the credential authenticated.
    pub is_valid: bool,
    /// The authenticated user.
    pub user_info: Option<User>,
    /// OAuth scopes (classic tokens only).
    pub scopes: Option<Vec<String>>,
    /// Failure reason.
    pub error: Option<String>,
}

impl AuthenticationResult {
    /// Successful validation.
    pub fn valid(user: User, scopes: Option<Vec<String>>) -> Self {
        Self {
            is_valid: true,
            user_info: Some(user),
            scopes,
            error: None,
        }
    }

    /// Failed validation.
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            user_info: None,
            scopes: None,
            error: Some(error.into()),
        }
    }
}

/// The three permission axes the sync engine needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Permissions {
    /// Repository visibility.
    pub all_repos: bool,
    /// Administrative access (create/delete repositories).
    pub admin: bool,
    /// Content write.
    pub contents: bool,
}

impl Permissions {
    /// Derives the axes from classic token scopes. `repo` grants all three.
    pub fn from_scopes(scopes: &[String]) -> Self {
        let repo = scopes.iter().any(|s| s == "repo");
        Self {
            all_repos: repo,
            admin: repo,
            contents: repo,
        }
    }

    /// Returns true when every axis is granted.
    pub fn all(&self) -> bool {
        self.all_repos && self.admin && self.contents
    }

    /// Names of the axes that are not granted.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.all_repos {
            missing.push("repository access");
        }
        if !self.admin {
            missing.push("administration");
        }
        if !self.contents {
            missing.push("contents write");
        }
        missing
    }
}

/// Outcome of a permission check.
///
/// `is_valid` requires all three axes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionResult {
    /// Whether every axis is granted.
    pub is_valid: bool,
    /// Per-axis outcome.
    pub permissions: Permissions,
    /// Description of the failing axes.
    pub error: Option<String>,
}

impl PermissionResult {
    /// Builds the aggregate result from checked axes.
    pub fn from_permissions(permissions: Permissions) -> Self {
        let missing = permissions.missing();
        Self {
            is_valid: missing.is_empty(),
            permissions,
            error: (!missing.is_empty())
                .then(|| format!("Token is missing required permissions: {}", missing.join(", "))),
        }
    }

    /// A check that could not run at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            permissions: Permissions::default(),
            error: Some(error.into()),
        }
    }
}

/// Permission check stages, reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStage {
    /// Repository visibility.
    Repos,
    /// Administrative access.
    Admin,
    /// Content write.
    Code,
}

impl PermissionStage {
    /// All stages in reporting order.
    pub const ORDER: [PermissionStage; 3] = [Self::Repos, Self::Admin, Self::Code];

    /// Stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repos => "repos",
            Self::Admin => "admin",
            Self::Code => "code",
        }
    }

    /// Whether this stage's axis is granted.
    pub fn granted(&self, permissions: &Permissions) -> bool {
        match self {
            Self::Repos => permissions.all_repos,
            Self::Admin => permissions.admin,
            Self::Code => permissions.contents,
        }
    }
}

/// Descriptive state of a strategy.
#[derive(Debug, Clone, Serialize)]
pub struct AuthMetadata {
    /// Credential scheme.
    pub method: AuthMethodKind,
    /// Family of the token `get_token` currently returns.
    pub token_type: Option<TokenType>,
    /// GitHub App installation id.
    pub installation_id: Option<u64>,
    /// Installation token expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether a credential is present.
    pub configured: bool,
}

/// The active authentication strategy.
#[derive(Debug)]
pub enum AuthStrategy {
    /// Personal access token.
    Pat(PatStrategy),
    /// GitHub App.
    GitHubApp(GitHubAppStrategy),
}

impl AuthStrategy {
    /// Builds a strategy directly from user-supplied credentials.
    pub fn from_config(client: RestClient, config: &AuthenticationConfig) -> Self {
        match config.method {
            AuthMethodKind::Pat => Self::Pat(PatStrategy::new(client, config.token.clone())),
            AuthMethodKind::GithubApp => Self::GitHubApp(
                GitHubAppStrategy::new(client, config.token.clone())
                    .with_installation_id(config.installation_id),
            ),
        }
    }

    /// Credential scheme.
    pub fn kind(&self) -> AuthMethodKind {
        match self {
            Self::Pat(_) => AuthMethodKind::Pat,
            Self::GitHubApp(_) => AuthMethodKind::GithubApp,
        }
    }

    /// Bearer token for API calls. Fails with `NotConfigured` when absent.
    pub async fn get_token(&self) -> GitHubResult<SecretString> {
        match self {
            Self::Pat(s) => s.get_token().await,
            Self::GitHubApp(s) => s.get_token().await,
        }
    }

    /// Token acting as the signed-in user, for `/user/*` endpoints that
    /// reject installation tokens. Same as [`get_token`](Self::get_token)
    /// for PATs.
    pub async fn user_token(&self) -> GitHubResult<SecretString> {
        match self {
            Self::Pat(s) => s.get_token().await,
            Self::GitHubApp(s) => s.user_token().await,
        }
    }

    /// Returns true when a credential is present.
    pub async fn is_configured(&self) -> bool {
        match self {
            Self::Pat(s) => s.is_configured().await,
            Self::GitHubApp(s) => s.is_configured().await,
        }
    }

    /// Validates the credential, optionally against a repository owner.
    pub async fn validate_auth(&self, repo_owner: Option<&str>) -> AuthenticationResult {
        match self {
            Self::Pat(s) => s.validate_auth(repo_owner).await,
            Self::GitHubApp(s) => s.validate_auth(repo_owner).await,
        }
    }

    /// Checks repository visibility, administration and content write.
    pub async fn check_permissions(&self, repo_owner: Option<&str>) -> PermissionResult {
        match self {
            Self::Pat(s) => s.check_permissions(repo_owner).await,
            Self::GitHubApp(s) => s.check_permissions(repo_owner).await,
        }
    }

    /// Returns true when the token should be renewed before use.
    pub async fn needs_renewal(&self) -> bool {
        match self {
            Self::Pat(_) => false,
            Self::GitHubApp(s) => s.needs_renewal().await,
        }
    }

    /// Renews the token and returns it.
    pub async fn refresh_token(&self) -> GitHubResult<SecretString> {
        match self {
            Self::Pat(s) => s.refresh_token().await,
            Self::GitHubApp(s) => s.refresh_token().await,
        }
    }

    /// Forgets every credential held in memory.
    pub async fn clear_auth(&self) {
        match self {
            Self::Pat(s) => s.clear_auth().await,
            Self::GitHubApp(s) => s.clear_auth().await,
        }
    }

    /// Fetches the authenticated user.
    pub async fn get_user_info(&self) -> GitHubResult<User> {
        match self {
            Self::Pat(s) => s.get_user_info().await,
            Self::GitHubApp(s) => s.get_user_info().await,
        }
    }

    /// Describes the strategy state.
    pub async fn metadata(&self) -> AuthMetadata {
        match self {
            Self::Pat(s) => s.metadata().await,
            Self::GitHubApp(s) => s.metadata().await,
        }
    }
}

/// Parses the `X-OAuth-Scopes` header. `None` when the header is absent.
pub(crate) fn parse_scopes(headers: &HeaderMap) -> Option<Vec<String>> {
    headers
        .get("x-oauth-scopes")
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
}

/// Fetches `/user` and the scopes header.
pub(crate) async fn fetch_user(
    client: &RestClient,
    token: &SecretString,
) -> GitHubResult<(User, Option<Vec<String>>)> {
    let (user, headers) = client
        .send_with_headers::<User>(token, ApiRequest::get("/user"))
        .await?;
    Ok((user, parse_scopes(&headers)))
}

/// Checks permission axes for tokens without OAuth scopes.
///
/// Listing the user's own and organization repositories grants visibility; a
/// listed repository (belonging to `owner` when given) with admin or push
/// permission grants the corresponding axis. Pages are followed until both
/// axes are granted or the listing ends.
pub(crate) async fn list_repository_permissions(
    client: &RestClient,
    token: &SecretString,
    owner: Option<&str>,
) -> Permissions {
    let mut permissions = Permissions::default();
    let mut page = 1;

    loop {
        let params = PaginationParams::new().page(page).per_page(MAX_PER_PAGE);
        let request = ApiRequest::get("/user/repos")
            .query("affiliation", "owner,organization_member")
            .paginate(&params);

        let listing = match client.send_page::<Repository>(token, request).await {
            Ok(listing) => listing,
            Err(e) => {
                debug!(page, error = %e, "Repository listing failed");
                return permissions;
            }
        };
        permissions.all_repos = true;

        let owned = listing
            .items
            .iter()
            .filter(|repo| match owner {
                Some(owner) => repo
                    .owner
                    .as_ref()
                    .map_or(false, |o| o.login.eq_ignore_ascii_case(owner)),
                None => true,
            })
            .filter_map(|repo| repo.permissions);
        for granted in owned {
            permissions.admin |= granted.admin;
            permissions.contents |= granted.push;
        }

        if permissions.admin && permissions.contents {
            return permissions;
        }
        match listing.links.next_page() {
            Some(next) if next > page => page = next,
            _ => return permissions,
        }
    }
}

/// Turns a failed `/user` call into a validation result.
pub(crate) fn invalid_from_error(error: &GitHubError) -> AuthenticationResult {
    use crate::errors::GitHubErrorKind;
    match error.kind() {
        GitHubErrorKind::AuthenticationFailure => {
            AuthenticationResult::invalid("Invalid or expired token")
        }
        GitHubErrorKind::NotConfigured => AuthenticationResult::invalid(error.message()),
        _ => AuthenticationResult::invalid(format!("Token validation failed: {}", error)),
    }
}
