//! Integration tests for repository cloning

use super::*;
use integrations_github_sync::{CloneWarning, RepoRef};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, ResponseTemplate};

fn blob_json(sha: &str, encoded: &str) -> Value {
    json!({"sha": sha, "content": encoded, "encoding": "base64"})
}

async fn mount_destination_writes(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/repos/me/copy/contents/.+$"))
        .respond_with(error_response(404, "Not Found"))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/repos/me/copy/contents/.+$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(file_commit_json("file", "2")))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_clone_reports_linear_progress() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/octocat/site/git/trees/main")
        .and(query_param("recursive", "1"))
        .respond_with(success_response(json!({
            "sha": "root",
            "truncated": false,
            "tree": [
                {"path": "index.html", "mode": "100644", "type": "blob", "sha": "b1"},
                {"path": "css", "mode": "040000", "type": "tree", "sha": "t1"},
                {"path": "css/site.css", "mode": "100644", "type": "blob", "sha": "b2"},
                {"path": "js/app.js", "mode": "100644", "type": "blob", "sha": "b3"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    for (sha, encoded) in [("b1", "PGgxPkhpPC9oMT4="), ("b2", "Ym9keXt9"), ("b3", "YWxlcnQoMSk=")] {
        mock_with_auth("GET", &format!("/repos/octocat/site/git/blobs/{}", sha))
            .respond_with(success_response(blob_json(sha, encoded)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    mount_destination_writes(&mock_server, 3).await;

    let service = pat_service(&mock_server);
    let mut progress = Vec::new();
    let report = service
        .clone_repo_contents(
            &RepoRef::new("octocat", "site"),
            &RepoRef::new("me", "copy"),
            "main",
            |percent| progress.push(percent),
        )
        .await
        .unwrap();

    assert_eq!(progress, vec![10, 40, 70, 100]);
    assert_eq!(report.files_copied, 3);
    assert!(!report.is_partial());

    let requests = mock_server.received_requests().await.unwrap();
    let index_put = requests
        .iter()
        .find(|r| r.method.to_string() == "PUT" && r.url.path().ends_with("/index.html"))
        .expect("index.html written");
    let body: Value = serde_json::from_slice(&index_put.body).unwrap();
    assert_eq!(body["content"], "PGgxPkhpPC9oMT4=");
    assert!(body.get("sha").is_none());
}

#[tokio::test]
async fn test_clone_of_truncated_empty_tree() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/octocat/huge/git/trees/main")
        .respond_with(success_response(json!({
            "sha": "root",
            "truncated": true,
            "tree": [
                {"path": "vendor", "mode": "040000", "type": "tree", "sha": "t1"}
            ]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let mut progress = Vec::new();
    let report = service
        .clone_repo_contents(
            &RepoRef::new("octocat", "huge"),
            &RepoRef::new("me", "copy"),
            "main",
            |percent| progress.push(percent),
        )
        .await
        .unwrap();

    assert_eq!(progress, vec![10, 100]);
    assert_eq!(report.files_copied, 0);
    assert_eq!(report.warnings, vec![CloneWarning::TruncatedTree { entries: 1 }]);
    assert!(report.is_partial());
}

#[tokio::test]
async fn test_clone_fails_on_missing_source() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/octocat/gone/git/trees/main"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let mut progress = Vec::new();
    let result = service
        .clone_repo_contents(
            &RepoRef::new("octocat", "gone"),
            &RepoRef::new("me", "copy"),
            "main",
            |percent| progress.push(percent),
        )
        .await;

    assert!(result.is_err());
    assert!(progress.is_empty());
}

#[tokio::test]
async fn test_create_temporary_public_repo() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/user/repos")
        .respond_with(
            ResponseTemplate::new(201).set_body_json(repository_json("octocat", "temp-site")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(
            r"^/repos/octocat/temp-site-\d{14}-[0-9a-f]{6}/contents/README\.md$",
        ))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(file_commit_json("README.md", "r1")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let name = service
        .create_temporary_public_repo("octocat", "site", "gh-pages")
        .await
        .unwrap();
    assert!(name.starts_with("temp-site-"));

    let requests = mock_server.received_requests().await.unwrap();
    let create: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(create["name"], name.as_str());
    assert_eq!(create["private"], false);

    let seed: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(seed["branch"], "gh-pages");
}
