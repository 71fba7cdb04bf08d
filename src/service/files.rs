//! File content operations on the contents endpoint.

use super::{repo_path, GitHubService};
use crate::client::{encode_repo_path, ApiRequest};
use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use crate::types::{encode_base64, ChangeStatus, ContentFile, FileChange, FileCommitResponse};
use serde::Serialize;
use tracing::{debug, instrument};

/// A file write.
///
/// Without `sha` the write creates the file; with it, the write updates the
/// blob with that sha and fails with `Conflict` when it is stale.
#[derive(Debug, Clone)]
pub struct PushFileRequest {
    /// Path relative to the repository root.
    pub path: String,
    /// Raw file content.
    pub content: Vec<u8>,
    /// Commit message.
    pub message: String,
    /// Target branch; the default branch when unset.
    pub branch: Option<String>,
    /// Current blob sha.
    pub sha: Option<String>,
}

impl PushFileRequest {
    /// Creates a write of `content` to `path`.
    pub fn new(
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            message: message.into(),
            branch: None,
            sha: None,
        }
    }

    /// Sets the target branch.
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the current blob sha.
    pub fn sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }
}

#[derive(Serialize)]
struct WriteContentsBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteContentsBody<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

/// Outcome of an upsert.
#[derive(Debug, Clone)]
pub struct UpsertResult {
    /// The commit response.
    pub commit: FileCommitResponse,
    /// True when the file did not exist before.
    pub created: bool,
}

/// Per-file outcome of [`GitHubService::push_changes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    /// Paths written for the first time.
    pub created: Vec<String>,
    /// Paths overwritten.
    pub updated: Vec<String>,
    /// Paths removed.
    pub deleted: Vec<String>,
    /// Unchanged paths, and deletions of paths already absent.
    pub skipped: Vec<String>,
}

impl PushSummary {
    /// Number of commits the push produced.
    pub fn commits(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

impl GitHubService {
    /// Reads a file, optionally at a branch, tag or sha.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> GitHubResult<ContentFile> {
        let token = self.token().await?;
        let mut request = ApiRequest::get(contents_path(owner, repo, path));
        if let Some(git_ref) = git_ref {
            request = request.query("ref", git_ref);
        }
        self.client.send(&token, request).await
    }

    /// Creates or updates a file.
    ///
    /// 409 and 422 responses surface as `Conflict`: the supplied sha is stale,
    /// or the file exists and no sha was supplied.
    #[instrument(skip(self, file), fields(path = %file.path))]
    pub async fn push_file(
        &self,
        owner: &str,
        repo: &str,
        file: &PushFileRequest,
    ) -> GitHubResult<FileCommitResponse> {
        let token = self.token().await?;
        let body = WriteContentsBody {
            message: &file.message,
            content: encode_base64(&file.content),
            sha: file.sha.as_deref(),
            branch: file.branch.as_deref(),
        };
        let request = ApiRequest::put(contents_path(owner, repo, &file.path)).json(&body)?;

        self.client.send(&token, request).await.map_err(|e| match e.kind() {
            GitHubErrorKind::Conflict | GitHubErrorKind::ValidationFailure => {
                let message = match &file.sha {
                    Some(sha) => format!(
                        "{} changed on the remote, sha {} is stale: {}",
                        file.path,
                        sha,
                        e.message()
                    ),
                    None => format!(
                        "{} already exists, its current sha is required: {}",
                        file.path,
                        e.message()
                    ),
                };
                let status = e.status_code();
                let mut conflict = GitHubError::new(GitHubErrorKind::Conflict, message).with_cause(e);
                if let Some(status) = status {
                    conflict = conflict.with_status(status);
                }
                conflict
            }
            _ => e,
        })
    }

    /// Writes a file, looking up its current sha first.
    pub async fn upsert_file(
        &self,
        owner: &str,
        repo: &str,
        mut file: PushFileRequest,
    ) -> GitHubResult<UpsertResult> {
        let existing = match self
            .get_file_content(owner, repo, &file.path, file.branch.as_deref())
            .await
        {
            Ok(existing) => Some(existing.sha),
            Err(e) if e.kind() == GitHubErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        let created = existing.is_none();
        file.sha = existing;
        let commit = self.push_file(owner, repo, &file).await?;
        Ok(UpsertResult { commit, created })
    }

    /// Deletes a file at the given blob sha.
    #[instrument(skip(self, sha, message))]
    pub async fn delete_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
        branch: Option<&str>,
    ) -> GitHubResult<FileCommitResponse> {
        let token = self.token().await?;
        let body = DeleteContentsBody {
            message,
            sha,
            branch,
        };
        let request = ApiRequest::delete(contents_path(owner, repo, path)).json(&body)?;
        self.client.send(&token, request).await
    }

    /// Applies change tuples one file at a time.
    ///
    /// Added and modified files are upserted, deleted files are removed at
    /// their current sha, unchanged files are skipped. The first failure
    /// aborts the push.
    #[instrument(skip(self, changes, message), fields(change_count = changes.len()))]
    pub async fn push_changes(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        changes: &[FileChange],
        message: &str,
    ) -> GitHubResult<PushSummary> {
        let mut summary = PushSummary::default();

        for change in changes {
            match change.status {
                ChangeStatus::Unchanged => summary.skipped.push(change.path.clone()),
                ChangeStatus::Added | ChangeStatus::Modified => {
                    let file = PushFileRequest::new(
                        change.path.as_str(),
                        change.content.as_bytes(),
                        message,
                    )
                    .branch(branch);
                    let outcome = self.upsert_file(owner, repo, file).await?;
                    if outcome.created {
                        summary.created.push(change.path.clone());
                    } else {
                        summary.updated.push(change.path.clone());
                    }
                }
                ChangeStatus::Deleted => {
                    match self
                        .get_file_content(owner, repo, &change.path, Some(branch))
                        .await
                    {
                        Ok(existing) => {
                            self.delete_file(
                                owner,
                                repo,
                                &change.path,
                                &existing.sha,
                                message,
                                Some(branch),
                            )
                            .await?;
                            summary.deleted.push(change.path.clone());
                        }
                        Err(e) if e.kind() == GitHubErrorKind::NotFound => {
                            debug!(path = %change.path, "File already absent");
                            summary.skipped.push(change.path.clone());
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(summary)
    }
}

fn contents_path(owner: &str, repo: &str, path: &str) -> String {
    format!("{}/contents/{}", repo_path(owner, repo), encode_repo_path(path))
}
