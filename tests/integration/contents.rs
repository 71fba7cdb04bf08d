//! Integration tests for file content writes

use super::*;
use integrations_github_sync::{ChangeStatus, FileChange, GitHubErrorKind, PushFileRequest};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn content_json(path: &str, sha: &str, body: &str) -> Value {
    json!({
        "name": path,
        "path": path,
        "sha": sha,
        "size": body.len(),
        "content": base64_lines(body),
        "encoding": "base64"
    })
}

fn base64_lines(body: &str) -> String {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(body);
    format!("{}\n", encoded)
}

#[tokio::test]
async fn test_get_file_content_at_ref() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r/contents/docs/index.html")
        .and(query_param("ref", "gh-pages"))
        .respond_with(success_response(content_json("docs/index.html", "abc", "<h1>Hi</h1>")))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let file = service
        .get_file_content("u", "r", "docs/index.html", Some("gh-pages"))
        .await
        .unwrap();
    assert_eq!(file.sha, "abc");
    assert_eq!(file.decoded_content().unwrap().unwrap(), b"<h1>Hi</h1>".to_vec());
}

#[tokio::test]
async fn test_push_file_create_omits_sha() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("PUT", "/repos/u/r/contents/index.html")
        .respond_with(ResponseTemplate::new(201).set_body_json(file_commit_json("index.html", "new")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let request = PushFileRequest::new("index.html", "hi", "Add index").branch("main");
    let response = service.push_file("u", "r", &request).await.unwrap();
    assert_eq!(response.commit.sha, "commit-new");

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({"message": "Add index", "content": "aGk=", "branch": "main"})
    );
}

#[tokio::test]
async fn test_push_file_stale_sha_is_conflict() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("PUT"))
        .and(path("/repos/u/r/contents/index.html"))
        .respond_with(error_response(409, "index.html does not match old-sha"))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let request = PushFileRequest::new("index.html", "hi", "Update").sha("old-sha");
    let err = service.push_file("u", "r", &request).await.unwrap_err();

    assert_eq!(err.kind(), GitHubErrorKind::Conflict);
    assert_eq!(err.status_code(), Some(409));
    assert!(err.message().contains("stale"));
}

#[tokio::test]
async fn test_push_file_missing_sha_is_conflict() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("PUT"))
        .and(path("/repos/u/r/contents/index.html"))
        .respond_with(error_response(422, "Invalid request.\n\n\"sha\" wasn't supplied."))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let request = PushFileRequest::new("index.html", "hi", "Update");
    let err = service.push_file("u", "r", &request).await.unwrap_err();

    assert_eq!(err.kind(), GitHubErrorKind::Conflict);
    assert_eq!(err.status_code(), Some(422));
    assert!(err.message().contains("already exists"));
}

#[tokio::test]
async fn test_upsert_uses_current_sha() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r/contents/style.css")
        .respond_with(success_response(content_json("style.css", "cur", "body{}")))
        .mount(&mock_server)
        .await;
    mock_with_auth("PUT", "/repos/u/r/contents/style.css")
        .respond_with(success_response(file_commit_json("style.css", "next")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let outcome = service
        .upsert_file("u", "r", PushFileRequest::new("style.css", "p{}", "Update style"))
        .await
        .unwrap();
    assert!(!outcome.created);

    let requests = mock_server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.to_string() == "PUT")
        .expect("PUT request");
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body["sha"], "cur");
}

#[tokio::test]
async fn test_push_changes_summary() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r/contents/new.html"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;
    mock_with_auth("GET", "/repos/u/r/contents/index.html")
        .and(query_param("ref", "main"))
        .respond_with(success_response(content_json("index.html", "idx", "old")))
        .mount(&mock_server)
        .await;
    mock_with_auth("GET", "/repos/u/r/contents/old.css")
        .respond_with(success_response(content_json("old.css", "css", "p{}")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/u/r/contents/gone.js"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;

    mock_with_auth("PUT", "/repos/u/r/contents/new.html")
        .respond_with(ResponseTemplate::new(201).set_body_json(file_commit_json("new.html", "n1")))
        .expect(1)
        .mount(&mock_server)
        .await;
    mock_with_auth("PUT", "/repos/u/r/contents/index.html")
        .respond_with(success_response(file_commit_json("index.html", "i2")))
        .expect(1)
        .mount(&mock_server)
        .await;
    mock_with_auth("DELETE", "/repos/u/r/contents/old.css")
        .respond_with(success_response(json!({
            "content": null,
            "commit": {"sha": "commit-del"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/u/r/contents/gone.js"))
        .respond_with(error_response(404, "Not Found"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let changes = vec![
        FileChange::new("new.html", "<p>new</p>", ChangeStatus::Added),
        FileChange::new("index.html", "<p>edit</p>", ChangeStatus::Modified),
        FileChange::new("old.css", "", ChangeStatus::Deleted),
        FileChange::new("gone.js", "", ChangeStatus::Deleted),
        FileChange::new("same.txt", "same", ChangeStatus::Unchanged),
    ];

    let service = pat_service(&mock_server);
    let summary = service
        .push_changes("u", "r", "main", &changes, "Sync from browser")
        .await
        .unwrap();

    assert_eq!(summary.created, vec!["new.html".to_string()]);
    assert_eq!(summary.updated, vec!["index.html".to_string()]);
    assert_eq!(summary.deleted, vec!["old.css".to_string()]);
    assert_eq!(summary.skipped, vec!["gone.js".to_string(), "same.txt".to_string()]);
    assert_eq!(summary.commits(), 3);

    let requests = mock_server.received_requests().await.unwrap();
    let bodies: Vec<(String, Value)> = requests
        .iter()
        .filter(|r| r.method.to_string() != "GET")
        .map(|r| {
            (
                r.url.path().to_string(),
                serde_json::from_slice(&r.body).unwrap(),
            )
        })
        .collect();

    let (_, create) = &bodies[0];
    assert!(create.get("sha").is_none());
    assert_eq!(create["branch"], "main");

    let (_, update) = &bodies[1];
    assert_eq!(update["sha"], "idx");

    let (delete_path, delete) = &bodies[2];
    assert_eq!(delete_path, "/repos/u/r/contents/old.css");
    assert_eq!(delete["sha"], "css");
    assert_eq!(delete["message"], "Sync from browser");
}

#[tokio::test]
async fn test_push_changes_stops_at_first_failure() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/repos/u/r/contents/a.html"))
        .respond_with(error_response(404, "Not Found"))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/u/r/contents/a.html"))
        .respond_with(error_response(500, "Server Error"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/u/r/contents/b.html"))
        .respond_with(error_response(404, "Not Found"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let changes = vec![
        FileChange::new("a.html", "a", ChangeStatus::Added),
        FileChange::new("b.html", "b", ChangeStatus::Added),
    ];

    let service = pat_service(&mock_server);
    let err = service
        .push_changes("u", "r", "main", &changes, "Sync")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), GitHubErrorKind::ServerFailure);
}
