//! Error types and HTTP failure classification.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::fmt;
use thiserror::Error;

/// Result type alias for GitHub sync operations.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Error kinds for categorizing GitHub failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitHubErrorKind {
    // Configuration errors
    /// No credential is configured for the active strategy.
    NotConfigured,
    /// Token does not match a known token format.
    InvalidTokenFormat,
    /// Invalid client configuration.
    InvalidConfiguration,

    // Remote failures
    /// Credentials were rejected (401).
    AuthenticationFailure,
    /// Credentials lack access to the resource (403).
    PermissionFailure,
    /// Resource not found (404).
    NotFound,
    /// Resource conflict, such as a stale blob sha (409).
    Conflict,
    /// Request validation failed (400/422).
    ValidationFailure,
    /// Primary or secondary rate limit exceeded.
    RateLimited,
    /// Connection, DNS, TLS or timeout failure.
    TransportFailure,
    /// GitHub returned a 5xx status.
    ServerFailure,
    /// Installation token exchange failed.
    TokenExchangeFailure,

    // Response errors
    /// Failed to deserialize a response body.
    Deserialization,
    /// A success status other than the one the operation requires.
    UnexpectedResponse,

    /// Unknown error.
    Unknown,
}

impl fmt::Display for GitHubErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not_configured"),
            Self::InvalidTokenFormat => write!(f, "invalid_token_format"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::AuthenticationFailure => write!(f, "authentication_failure"),
            Self::PermissionFailure => write!(f, "permission_failure"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::ValidationFailure => write!(f, "validation_failure"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::TransportFailure => write!(f, "transport_failure"),
            Self::ServerFailure => write!(f, "server_failure"),
            Self::TokenExchangeFailure => write!(f, "token_exchange_failure"),
            Self::Deserialization => write!(f, "deserialization"),
            Self::UnexpectedResponse => write!(f, "unexpected_response"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Rate limit information extracted from response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Maximum requests allowed.
    pub limit: u32,
    /// Remaining requests in current window.
    pub remaining: u32,
    /// Time when the rate limit resets.
    pub reset_at: DateTime<Utc>,
    /// Retry-After header value in seconds (if present).
    pub retry_after: Option<u64>,
    /// Resource category.
    pub resource: Option<String>,
}

impl RateLimitInfo {
    /// Parses the `x-ratelimit-*` and `retry-after` headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_value(headers, "x-ratelimit-limit")?;
        let remaining = header_value(headers, "x-ratelimit-remaining")?;
        let reset_timestamp: i64 = header_value(headers, "x-ratelimit-reset")?;
        let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

        Some(Self {
            limit,
            remaining,
            reset_at,
            retry_after: header_value(headers, "retry-after"),
            resource: headers
                .get("x-ratelimit-resource")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        })
    }

    /// Returns true when the current window is used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// GitHub error with detailed information.
#[derive(Error, Debug)]
pub struct GitHubError {
    kind: GitHubErrorKind,
    message: String,
    status_code: Option<u16>,
    request_id: Option<String>,
    documentation_url: Option<String>,
    rate_limit: Option<RateLimitInfo>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for GitHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        if let Some(ref id) = self.request_id {
            write!(f, " [request_id: {}]", id)?;
        }
        Ok(())
    }
}

impl GitHubError {
    /// Creates a new error.
    pub fn new(kind: GitHubErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            request_id: None,
            documentation_url: None,
            rate_limit: None,
            cause: None,
        }
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the GitHub request ID.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Sets the documentation URL.
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Sets the rate limit info.
    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> GitHubErrorKind {
        self.kind
    }

    /// Gets the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Gets the request ID.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Gets the documentation URL.
    pub fn documentation_url(&self) -> Option<&str> {
        self.documentation_url.as_deref()
    }

    /// Gets the rate limit info.
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    /// Returns the retry-after duration in seconds.
    ///
    /// An explicit `Retry-After` always counts. The window reset time only
    /// counts for rate-limit errors or an exhausted window, since GitHub sends
    /// the reset header on every response.
    pub fn retry_after(&self) -> Option<u64> {
        let rl = self.rate_limit.as_ref()?;
        if let Some(secs) = rl.retry_after {
            return Some(secs);
        }
        if self.kind != GitHubErrorKind::RateLimited && !rl.is_exhausted() {
            return None;
        }
        let now = Utc::now();
        (rl.reset_at > now).then(|| (rl.reset_at - now).num_seconds() as u64)
    }

    /// Returns true if a caller-side retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            GitHubErrorKind::RateLimited
                | GitHubErrorKind::TransportFailure
                | GitHubErrorKind::ServerFailure
        )
    }

    /// Creates an error from an HTTP status code and GitHub error response.
    pub fn from_response(
        status: u16,
        message: String,
        documentation_url: Option<String>,
        request_id: Option<String>,
        rate_limit: Option<RateLimitInfo>,
    ) -> Self {
        let kind = ErrorClassifier::classify_status(status, &message, rate_limit.as_ref());
        let mut error = Self::new(kind, message).with_status(status);

        if let Some(url) = documentation_url {
            error = error.with_documentation_url(url);
        }
        if let Some(id) = request_id {
            error = error.with_request_id(id);
        }
        if let Some(info) = rate_limit {
            error = error.with_rate_limit(info);
        }

        error
    }

    /// Creates an error from a failed transport call.
    pub fn transport(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("Request timed out: {}", error)
        } else if error.is_connect() {
            format!("Connection failed: {}", error)
        } else {
            format!("Request failed: {}", error)
        };
        Self::new(ErrorClassifier::classify_transport(&error), message).with_cause(error)
    }

    // Convenience constructors

    /// Creates a not-configured error.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::NotConfigured, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::InvalidConfiguration, message)
    }

    /// Creates a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(GitHubErrorKind::Deserialization, message)
    }
}

/// Maps HTTP statuses and transport failures onto [`GitHubErrorKind`].
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classifies a non-success HTTP status.
    ///
    /// A 403 is a rate limit when the rate-limit headers show an exhausted window
    /// or GitHub's message names a (secondary) rate limit.
    pub fn classify_status(
        status: u16,
        message: &str,
        rate_limit: Option<&RateLimitInfo>,
    ) -> GitHubErrorKind {
        match status {
            401 => GitHubErrorKind::AuthenticationFailure,
            403 => {
                let exhausted = rate_limit.map_or(false, RateLimitInfo::is_exhausted);
                if exhausted || message.to_ascii_lowercase().contains("rate limit") {
                    GitHubErrorKind::RateLimited
                } else {
                    GitHubErrorKind::PermissionFailure
                }
            }
            404 => GitHubErrorKind::NotFound,
            409 => GitHubErrorKind::Conflict,
            400 | 422 => GitHubErrorKind::ValidationFailure,
            429 => GitHubErrorKind::RateLimited,
            500..=599 => GitHubErrorKind::ServerFailure,
            _ => GitHubErrorKind::Unknown,
        }
    }

    /// Classifies a transport-level failure.
    pub fn classify_transport(error: &reqwest::Error) -> GitHubErrorKind {
        if error.is_decode() {
            GitHubErrorKind::Deserialization
        } else {
            GitHubErrorKind::TransportFailure
        }
    }
}
