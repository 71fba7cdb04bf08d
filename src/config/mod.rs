//! Configuration types for the sync engine.

use crate::errors::{GitHubError, GitHubErrorKind};
use secrecy::SecretString;
use std::time::Duration;

/// Default GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Media type sent in the `Accept` header of every request.
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-github-sync/0.1.0";

/// Owner of the repository that receives user feedback.
pub const DEFAULT_FEEDBACK_OWNER: &str = "integrations";

/// Repository that receives user feedback.
pub const DEFAULT_FEEDBACK_REPO: &str = "github-sync";

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per host.
    pub max_idle_per_host: usize,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// The fixed repository feedback issues are filed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRepository {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl Default for FeedbackRepository {
    fn default() -> Self {
        Self {
            owner: DEFAULT_FEEDBACK_OWNER.to_string(),
            repo: DEFAULT_FEEDBACK_REPO.to_string(),
        }
    }
}

/// GitHub App settings used to mint installation tokens.
///
/// Either `app_id` + `private_key` (JWT exchange against GitHub) or
/// `token_exchange_url` (a backend that holds the App key) must be set for
/// installation tokens to be renewed.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// GitHub App ID.
    pub app_id: Option<u64>,
    /// Private key (PEM format).
    pub private_key: Option<SecretString>,
    /// Backend endpoint that exchanges a user token for an installation token.
    pub token_exchange_url: Option<String>,
}

impl AppConfig {
    /// Returns true when JWT-based exchange is possible.
    pub fn has_app_credentials(&self) -> bool {
        self.app_id.is_some() && self.private_key.is_some()
    }
}

/// Repository clone tuning.
#[derive(Debug, Clone)]
pub struct CloneConfig {
    /// Maximum blob fetches in flight.
    pub fetch_concurrency: usize,
    /// Pause between consecutive pushes.
    pub push_delay: Duration,
    /// Path of the file seeded into temporary repositories.
    pub placeholder_path: String,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 4,
            push_delay: Duration::from_millis(100),
            placeholder_path: "README.md".to_string(),
        }
    }
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL.
    pub base_url: String,
    /// `Accept` header value.
    pub accept: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Connection pool configuration.
    pub pool: PoolConfig,
    /// Feedback target.
    pub feedback: FeedbackRepository,
    /// GitHub App settings.
    pub app: AppConfig,
    /// Clone settings.
    pub clone: CloneConfig,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pool: PoolConfig::default(),
            feedback: FeedbackRepository::default(),
            app: AppConfig::default(),
            clone: CloneConfig::default(),
        }
    }
}

impl GitHubConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> GitHubConfigBuilder {
        GitHubConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), GitHubError> {
        if self.base_url.is_empty() {
            return Err(GitHubError::configuration("Base URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GitHubError::configuration(
                "Base URL must start with http:// or https://",
            ));
        }

        if self.user_agent.is_empty() {
            return Err(GitHubError::configuration("User-Agent is required by GitHub API"));
        }

        if self.clone.fetch_concurrency == 0 {
            return Err(GitHubError::configuration(
                "Clone fetch concurrency must be at least 1",
            ));
        }

        if self.feedback.owner.is_empty() || self.feedback.repo.is_empty() {
            return Err(GitHubError::configuration("Feedback repository must be set"));
        }

        if let Some(ref exchange) = self.app.token_exchange_url {
            url::Url::parse(exchange).map_err(|e| {
                GitHubError::new(
                    GitHubErrorKind::InvalidConfiguration,
                    format!("Invalid token exchange URL: {}", e),
                )
            })?;
        }

        Ok(())
    }
}

/// Builder for GitHubConfig.
#[derive(Debug, Default)]
pub struct GitHubConfigBuilder {
    base_url: Option<String>,
    accept: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    pool: Option<PoolConfig>,
    feedback: Option<FeedbackRepository>,
    app: Option<AppConfig>,
    clone: Option<CloneConfig>,
}

impl GitHubConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the `Accept` header value.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the connection pool configuration.
    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Sets the feedback repository.
    pub fn feedback_repository(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.feedback = Some(FeedbackRepository {
            owner: owner.into(),
            repo: repo.into(),
        });
        self
    }

    /// Sets the GitHub App settings.
    pub fn app(mut self, config: AppConfig) -> Self {
        self.app = Some(config);
        self
    }

    /// Sets GitHub App credentials for JWT-based token exchange.
    pub fn app_credentials(mut self, app_id: u64, private_key: impl Into<String>) -> Self {
        let mut app = self.app.take().unwrap_or_default();
        app.app_id = Some(app_id);
        app.private_key = Some(SecretString::new(private_key.into()));
        self.app = Some(app);
        self
    }

    /// Sets the backend token exchange endpoint.
    pub fn token_exchange_url(mut self, url: impl Into<String>) -> Self {
        let mut app = self.app.take().unwrap_or_default();
        app.token_exchange_url = Some(url.into());
        self.app = Some(app);
        self
    }

    /// Sets the clone configuration.
    pub fn clone_config(mut self, config: CloneConfig) -> Self {
        self.clone = Some(config);
        self
    }

    /// Sets the pause between consecutive clone pushes.
    pub fn push_delay(mut self, delay: Duration) -> Self {
        let mut clone = self.clone.take().unwrap_or_default();
        clone.push_delay = delay;
        self.clone = Some(clone);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<GitHubConfig, GitHubError> {
        let config = GitHubConfig {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            accept: self.accept.unwrap_or_else(|| DEFAULT_ACCEPT.to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            pool: self.pool.unwrap_or_default(),
            feedback: self.feedback.unwrap_or_default(),
            app: self.app.unwrap_or_default(),
            clone: self.clone.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
