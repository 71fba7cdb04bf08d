//! Structured logging hooks.

use crate::errors::RateLimitInfo;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tracing hooks for GitHub API and sync operations.
pub struct TracingHooks;

impl TracingHooks {
    /// Logs the start of an API request.
    pub fn on_request_start(method: &str, url: &str) {
        debug!(method = %method, url = %url, "GitHub API request started");
    }

    /// Logs the completion of an API request.
    pub fn on_request_complete(method: &str, url: &str, status: u16, duration: Duration) {
        debug!(
            method = %method,
            url = %url,
            status = status,
            duration_ms = duration.as_millis() as u64,
            "GitHub API request completed"
        );
    }

    /// Logs a request error.
    pub fn on_request_error(method: &str, url: &str, error: &str) {
        error!(method = %method, url = %url, error = %error, "GitHub API request failed");
    }

    /// Logs rate limit exceeded.
    pub fn on_rate_limit_exceeded(info: &RateLimitInfo) {
        warn!(
            limit = info.limit,
            remaining = info.remaining,
            reset_at = %info.reset_at,
            resource = info.resource.as_deref().unwrap_or("core"),
            "Rate limit exceeded"
        );
    }

    /// Logs an installation token renewal.
    pub fn on_auth_token_refresh(installation_id: u64, expires_at: DateTime<Utc>) {
        info!(
            installation_id = installation_id,
            expires_at = %expires_at,
            "GitHub App installation token refreshed"
        );
    }

    /// Logs an existence check that collapsed a failure into `false`.
    pub fn on_existence_check_collapsed(resource: &str, error: &str) {
        debug!(resource = %resource, error = %error, "Existence check failed, reporting absent");
    }

    /// Logs clone progress.
    pub fn on_clone_progress(percent: u8, path: &str) {
        debug!(percent = percent, path = %path, "Clone progress");
    }

    /// Logs a truncated recursive tree listing.
    pub fn on_truncated_tree(owner: &str, repo: &str, git_ref: &str, entries: usize) {
        warn!(
            owner = %owner,
            repo = %repo,
            git_ref = %git_ref,
            entries = entries,
            "Recursive tree listing was truncated by GitHub, clone will be partial"
        );
    }
}
