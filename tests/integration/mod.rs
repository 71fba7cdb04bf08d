//! Integration tests using WireMock
//!
//! These tests drive the service through a mock GitHub API and verify the
//! complete request/response cycle: authentication headers, pagination,
//! error classification and the multi-request flows (ensure, upsert, clone).

pub mod clone;
pub mod contents;
pub mod issues;
pub mod repositories;

use integrations_github_sync::{GitHubConfig, GitHubService};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// Token used by PAT-backed test services.
pub const TEST_TOKEN: &str = "ghp_testtoken";

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Configuration pointing at the mock server, without clone push delays.
pub fn test_config(server: &MockServer) -> GitHubConfig {
    GitHubConfig::builder()
        .base_url(server.uri())
        .push_delay(Duration::ZERO)
        .build()
        .expect("valid test config")
}

/// PAT-backed service pointing at the mock server.
pub fn pat_service(server: &MockServer) -> GitHubService {
    GitHubService::new(TEST_TOKEN, test_config(server)).expect("service")
}

/// Helper to create an authenticated mock
pub fn mock_with_auth(method_matcher: &str, path_matcher: &str) -> MockBuilder {
    Mock::given(method(method_matcher))
        .and(path(path_matcher))
        .and(header("Authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
}

/// Helper to create GitHub-style error responses
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "message": message,
        "documentation_url": "https://docs.github.com/rest"
    }))
}

/// Helper to create success response templates
pub fn success_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Minimal repository payload.
pub fn repository_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "owner": {"login": owner, "id": 1},
        "private": false,
        "default_branch": "main"
    })
}

/// Minimal contents write payload.
pub fn file_commit_json(path: &str, sha: &str) -> Value {
    json!({
        "content": {"name": path, "path": path, "sha": sha},
        "commit": {"sha": format!("commit-{}", sha), "message": "sync"}
    })
}
