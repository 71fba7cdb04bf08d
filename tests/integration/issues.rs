//! Integration tests for issues, comments and feedback

use super::*;
use integrations_github_sync::{
    CreateIssueRequest, Feedback, FeedbackCategory, IssueState, IssueStateFilter,
    UpdateIssueRequest,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, header, header_exists, query_param};
use wiremock::ResponseTemplate;

fn issue_json(number: u64, title: &str) -> Value {
    json!({
        "id": number * 10,
        "number": number,
        "title": title,
        "state": "open",
        "labels": [],
        "comments": 0
    })
}

#[tokio::test]
async fn test_create_issue() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/repos/u/r/issues")
        .and(body_json(json!({"title": "Broken link", "body": "On the home page", "labels": ["bug"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(3, "Broken link")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let request = CreateIssueRequest::new("Broken link")
        .body("On the home page")
        .labels(["bug"]);
    let issue = service.create_issue("u", "r", &request).await.unwrap();

    assert_eq!(issue.number, 3);
    assert_eq!(issue.state, IssueState::Open);
}

#[tokio::test]
async fn test_get_issues_force_refresh_filters_pull_requests() {
    let mock_server = setup_mock_server().await;

    let mut pull = issue_json(2, "Add dark mode");
    pull["pull_request"] = json!({"url": "https://api.github.com/repos/u/r/pulls/2"});

    mock_with_auth("GET", "/repos/u/r/issues")
        .and(query_param("state", "open"))
        .and(header_exists("cache-control"))
        .and(header("pragma", "no-cache"))
        .respond_with(success_response(json!([issue_json(1, "Bug"), pull])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let issues = service
        .get_issues("u", "r", IssueStateFilter::Open, true)
        .await
        .unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 1);

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].url.query_pairs().any(|(key, _)| key == "_t"));
}

#[tokio::test]
async fn test_get_issues_without_refresh_has_no_cache_buster() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("GET", "/repos/u/r/issues")
        .and(query_param("state", "all"))
        .respond_with(success_response(json!([issue_json(1, "Bug")])))
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let issues = service
        .get_issues("u", "r", IssueStateFilter::All, false)
        .await
        .unwrap();
    assert_eq!(issues.len(), 1);

    let requests = mock_server.received_requests().await.unwrap();
    assert!(!requests[0].url.query_pairs().any(|(key, _)| key == "_t"));
    assert!(requests[0].headers.get(&wiremock::http::HeaderName::from("pragma")).is_none());
}

#[tokio::test]
async fn test_update_issue_closes() {
    let mock_server = setup_mock_server().await;

    let mut closed = issue_json(3, "Broken link");
    closed["state"] = json!("closed");

    mock_with_auth("PATCH", "/repos/u/r/issues/3")
        .and(body_json(json!({"state": "closed"})))
        .respond_with(success_response(closed))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let request = UpdateIssueRequest {
        state: Some(IssueState::Closed),
        ..Default::default()
    };
    let issue = service.update_issue("u", "r", 3, &request).await.unwrap();
    assert_eq!(issue.state, IssueState::Closed);
}

#[tokio::test]
async fn test_add_issue_comment() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/repos/u/r/issues/3/comments")
        .and(body_json(json!({"body": "Fixed in the latest sync"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 99,
            "body": "Fixed in the latest sync"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = pat_service(&mock_server);
    let comment = service
        .add_issue_comment("u", "r", 3, "Fixed in the latest sync")
        .await
        .unwrap();
    assert_eq!(comment.id, 99);
}

#[tokio::test]
async fn test_submit_feedback_targets_configured_repository() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/repos/acme/feedback/issues")
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(12, "[Question] How")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = GitHubConfig::builder()
        .base_url(mock_server.uri())
        .feedback_repository("acme", "feedback")
        .build()
        .unwrap();
    let service = GitHubService::new(TEST_TOKEN, config).unwrap();

    let mut metadata = BTreeMap::new();
    metadata.insert("browser".to_string(), "Firefox 130".to_string());
    let feedback = Feedback {
        category: FeedbackCategory::Question,
        message: "How do I sync a private repository?".to_string(),
        email: None,
        metadata,
    };

    let issue = service.submit_feedback(&feedback).await.unwrap();
    assert_eq!(issue.number, 12);

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["title"], "[Question] How do I sync a private repository?");
    assert_eq!(body["labels"], json!(["question", "user-feedback"]));
    assert!(body["body"]
        .as_str()
        .unwrap()
        .contains("| browser | Firefox 130 |"));
}
