//! Integration tests for repository, branch and commit operations

use super::*;
use integrations_github_sync::GitHubErrorKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn commits(count: usize) -> serde_json::Value {
    json!((0..count).map(|i| json!({"sha": format!("sha{}", i)})).collect::<Vec<_>>())
}

#[tokio::test]
async fn test_repo_exists_on_200() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r")
        .respond_with(success_response(repository_json("u", "r")))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(service.repo_exists("u", "r").await);
    assert!(service.repo_exists("u", "r").await);
}

#[tokio::test]
async fn test_repo_exists_false_on_404() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(!service.repo_exists("u", "r").await);
}

#[tokio::test]
async fn test_repo_exists_false_on_server_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r"))
        .respond_with(error_response(503, "Service Unavailable"))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(!service.repo_exists("u", "r").await);
}

#[tokio::test]
async fn test_repo_exists_false_on_network_error() {
    let config = GitHubConfig::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    let service = GitHubService::new(TEST_TOKEN, config).unwrap();

    assert!(!service.repo_exists("u", "r").await);
    assert!(!service.get_repo_info("u", "r").await.exists);
}

#[tokio::test]
async fn test_get_repo_info() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r")
        .respond_with(success_response(repository_json("u", "r")))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let info = service.get_repo_info("u", "r").await;
    assert!(info.exists);
    assert_eq!(info.owner.as_deref(), Some("u"));
    assert_eq!(info.default_branch.as_deref(), Some("main"));

    let missing = service.get_repo_info("u", "absent").await;
    assert!(!missing.exists);
    assert_eq!(missing.name, "absent");
    assert!(missing.default_branch.is_none());
}

#[tokio::test]
async fn test_ensure_repo_exists_never_creates_existing() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r")
        .respond_with(success_response(repository_json("u", "r")))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(repository_json("u", "r")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let created = service.ensure_repo_exists("u", "r", true).await.unwrap();
    assert!(!created);
}

#[tokio::test]
async fn test_ensure_repo_exists_creates_missing() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;
    mock_with_auth("POST", "/user/repos")
        .and(body_json(json!({"name": "r", "private": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(repository_json("u", "r")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let created = service.ensure_repo_exists("u", "r", true).await.unwrap();
    assert!(created);
}

#[tokio::test]
async fn test_create_repo_validation_failure() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(error_response(422, "Repository creation failed."))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let err = service.create_repo("taken", false, None).await.unwrap_err();
    assert_eq!(err.kind(), GitHubErrorKind::ValidationFailure);
    assert_eq!(err.status_code(), Some(422));
}

#[tokio::test]
async fn test_is_repo_empty_on_conflict() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r")
        .respond_with(success_response(repository_json("u", "r")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/u/r/git/trees/main"))
        .respond_with(error_response(409, "Git Repository is empty."))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(service.is_repo_empty("u", "r").await);
}

#[tokio::test]
async fn test_is_repo_empty_false_with_files() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r")
        .respond_with(success_response(repository_json("u", "r")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/u/r/git/trees/main"))
        .respond_with(success_response(json!({
            "sha": "root",
            "tree": [{"path": "README.md", "mode": "100644", "type": "blob", "sha": "b1"}],
            "truncated": false
        })))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(!service.is_repo_empty("u", "r").await);
}

#[tokio::test]
async fn test_is_repo_empty_false_when_unreadable() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert!(!service.is_repo_empty("u", "r").await);
}

#[tokio::test]
async fn test_commit_count_sums_pages() {
    let mock_server = setup_mock_server().await;
    let next = format!(
        "<{}/repos/u/r/commits?sha=main&per_page=100&page=2>; rel=\"next\", <{}/repos/u/r/commits?sha=main&per_page=100&page=2>; rel=\"last\"",
        mock_server.uri(),
        mock_server.uri()
    );

    mock_with_auth("GET", "/repos/u/r/commits")
        .and(query_param("sha", "main"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "100"))
        .respond_with(success_response(commits(100)).insert_header("Link", next.as_str()))
        .expect(1)
        .mount(&mock_server)
        .await;
    mock_with_auth("GET", "/repos/u/r/commits")
        .and(query_param("sha", "main"))
        .and(query_param("page", "2"))
        .respond_with(success_response(commits(42)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert_eq!(service.get_commit_count("u", "r", "main").await.unwrap(), 142);
}

#[tokio::test]
async fn test_commit_count_of_empty_repository_is_zero() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r/commits"))
        .respond_with(error_response(409, "Git Repository is empty."))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    assert_eq!(service.get_commit_count("u", "r", "main").await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_branches_and_head_sha() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r/branches")
        .respond_with(success_response(json!([
            {"name": "main", "commit": {"sha": "aaa"}, "protected": true},
            {"name": "gh-pages", "commit": {"sha": "bbb"}}
        ])))
        .mount(&mock_server)
        .await;
    mock_with_auth("GET", "/repos/u/r/branches/gh-pages")
        .respond_with(success_response(json!({"name": "gh-pages", "commit": {"sha": "bbb"}})))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let branches = service.list_branches("u", "r").await.unwrap();
    let names: Vec<_> = branches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["main", "gh-pages"]);
    assert!(branches[0].protected);

    assert_eq!(
        service.get_branch_head_sha("u", "r", "gh-pages").await.unwrap(),
        "bbb"
    );
}

#[tokio::test]
async fn test_list_repos() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/user/repos")
        .respond_with(success_response(json!([
            repository_json("u", "site"),
            repository_json("u", "docs")
        ])))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let repos = service.list_repos().await.unwrap();
    assert_eq!(repos.len(), 2);
    assert_eq!(repos[1].full_name, "u/docs");
}

#[tokio::test]
async fn test_delete_repo_requires_204() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("DELETE", "/repos/u/gone")
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    mock_with_auth("DELETE", "/repos/u/odd")
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/u/locked"))
        .respond_with(error_response(403, "Must have admin rights to Repository."))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    service.delete_repo("u", "gone").await.unwrap();

    let err = service.delete_repo("u", "odd").await.unwrap_err();
    assert_eq!(err.kind(), GitHubErrorKind::UnexpectedResponse);

    let err = service.delete_repo("u", "locked").await.unwrap_err();
    assert_eq!(err.kind(), GitHubErrorKind::PermissionFailure);
}

#[tokio::test]
async fn test_rate_limited_forbidden() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r/branches"))
        .respond_with(
            error_response(403, "API rate limit exceeded")
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1900000000"),
        )
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let err = service.list_branches("u", "r").await.unwrap_err();
    assert_eq!(err.kind(), GitHubErrorKind::RateLimited);
    assert_eq!(err.rate_limit().map(|r| r.remaining), Some(0));
    assert!(err.is_retryable());
}
