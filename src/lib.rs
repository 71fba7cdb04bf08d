//! # GitHub Sync Engine
//!
//! The GitHub side of a browser-to-repository sync tool:
//! - Personal access token and GitHub App authentication behind one strategy
//! - Token validation and permission probing with ordered progress reporting
//! - Repository, branch, commit, file content and issue operations
//! - Tree-walk repository cloning with progress reporting
//! - Feedback filing against a fixed maintenance repository
//! - An opt-in retry decorator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_github_sync::{GitHubConfig, GitHubService, PushFileRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = GitHubService::new("ghp_xxxxxxxxxxxx", GitHubConfig::default())?;
//!
//!     if !service.validate_token().await {
//!         return Err("token rejected".into());
//!     }
//!
//!     service.ensure_repo_exists("octocat", "my-project", true).await?;
//!     let file = PushFileRequest::new("index.html", "<h1>Hello</h1>", "Sync from browser");
//!     service.upsert_file("octocat", "my-project", file).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Authentication
pub mod auth;
pub mod store;

// HTTP client and transport
pub mod client;

// Pagination handling
pub mod pagination;

// Service facade
pub mod service;

// Cloning
pub mod clone;

// Resilience patterns
pub mod resilience;

// Observability
pub mod observability;

// Re-exports for convenience
pub use auth::{
    AuthMetadata, AuthMethodKind, AuthStrategy, AuthStrategyFactory, AuthenticationConfig,
    AuthenticationResult, GitHubAppStrategy, PatStrategy, PermissionResult, PermissionStage,
    Permissions, TokenType,
};
pub use client::{ApiRequest, RestClient};
pub use clone::{CloneReport, CloneWarning, RepoRef, RepositoryCloner};
pub use config::{GitHubConfig, GitHubConfigBuilder};
pub use errors::{GitHubError, GitHubErrorKind, GitHubResult};
pub use pagination::{Page, PaginationLinks};
pub use resilience::{RetryExecutor, RetryPolicy};
pub use service::{
    CreateIssueRequest, CreateRepoRequest, GitHubService, PushFileRequest, PushSummary,
    UpdateIssueRequest, UpsertResult,
};
pub use store::{ConfigStore, MemoryConfigStore};
pub use types::*;
