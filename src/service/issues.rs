//! Issue, comment and feedback operations.

use super::{repo_path, GitHubService};
use crate::client::ApiRequest;
use crate::errors::GitHubResult;
use crate::types::{Comment, Feedback, Issue, IssueState, IssueStateFilter};
use serde::Serialize;
use tracing::{info, instrument};

/// Feedback titles keep this many characters of the message.
const FEEDBACK_TITLE_CHARS: usize = 50;

/// Request to create an issue.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest {
    /// Issue title.
    pub title: String,
    /// Issue body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Labels.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl CreateIssueRequest {
    /// Creates a request with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            labels: Vec::new(),
        }
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the labels.
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Request to update an issue. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateIssueRequest {
    /// Issue title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Issue body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Issue state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    /// Replacement labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ListIssuesParams {
    state: &'static str,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

impl GitHubService {
    /// Lists issues, excluding pull requests.
    ///
    /// `force_refresh` defeats intermediate caches so a just-filed issue is
    /// visible immediately.
    #[instrument(skip(self))]
    pub async fn get_issues(
        &self,
        owner: &str,
        repo: &str,
        state: IssueStateFilter,
        force_refresh: bool,
    ) -> GitHubResult<Vec<Issue>> {
        let token = self.token().await?;
        let path = format!("{}/issues", repo_path(owner, repo));
        let params = ListIssuesParams {
            state: state.as_str(),
        };
        let base = ApiRequest::get(path).params(&params)?;

        let issues: Vec<Issue> = self
            .collect_pages(&token, || {
                if force_refresh {
                    base.clone().force_refresh()
                } else {
                    base.clone()
                }
            })
            .await?;

        Ok(issues
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect())
    }

    /// Gets one issue.
    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> GitHubResult<Issue> {
        let token = self.token().await?;
        let path = format!("{}/issues/{}", repo_path(owner, repo), number);
        self.client.get(&token, &path).await
    }

    /// Creates an issue.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateIssueRequest,
    ) -> GitHubResult<Issue> {
        let token = self.token().await?;
        let path = format!("{}/issues", repo_path(owner, repo));
        let issue: Issue = self.client.post(&token, &path, request).await?;
        info!(number = issue.number, "Created issue");
        Ok(issue)
    }

    /// Updates an issue.
    pub async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        request: &UpdateIssueRequest,
    ) -> GitHubResult<Issue> {
        let token = self.token().await?;
        let path = format!("{}/issues/{}", repo_path(owner, repo), number);
        self.client.patch(&token, &path, request).await
    }

    /// Adds a comment to an issue.
    pub async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> GitHubResult<Comment> {
        let token = self.token().await?;
        let path = format!("{}/issues/{}/comments", repo_path(owner, repo), number);
        self.client.post(&token, &path, &CommentBody { body }).await
    }

    /// Lists every comment on an issue.
    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> GitHubResult<Vec<Comment>> {
        let token = self.token().await?;
        let path = format!("{}/issues/{}/comments", repo_path(owner, repo), number);
        self.collect_pages(&token, || ApiRequest::get(path.as_str()))
            .await
    }

    /// Files feedback as an issue on the configured feedback repository.
    #[instrument(skip(self, feedback), fields(category = ?feedback.category))]
    pub async fn submit_feedback(&self, feedback: &Feedback) -> GitHubResult<Issue> {
        let target = self.config().feedback.clone();
        let request = feedback_issue(feedback);
        self.create_issue(&target.owner, &target.repo, &request).await
    }
}

fn feedback_issue(feedback: &Feedback) -> CreateIssueRequest {
    let summary: String = feedback
        .message
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(FEEDBACK_TITLE_CHARS)
        .collect();
    let title = format!("[{}] {}", feedback.category.title(), summary.trim());

    let mut body = format!(
        "## {}\n\n{}\n",
        feedback.category.title(),
        feedback.message.trim()
    );
    if let Some(email) = feedback.email.as_deref().filter(|e| !e.trim().is_empty()) {
        body.push_str(&format!("\n**Contact:** {}\n", email.trim()));
    }
    if !feedback.metadata.is_empty() {
        body.push_str("\n### Environment\n\n| Key | Value |\n| --- | --- |\n");
        for (key, value) in &feedback.metadata {
            body.push_str(&format!("| {} | {} |\n", key, value));
        }
    }

    CreateIssueRequest::new(title)
        .body(body)
        .labels([feedback.category.label(), "user-feedback"])
}
