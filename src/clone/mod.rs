//! Tree-walk repository cloning over the REST API.
//!
//! A clone fetches the recursive tree of the source in one call, downloads
//! every blob and writes each file to the destination at the same path.
//! Progress is reported as a percentage: 10 once the tree is known, then
//! linearly up to exactly 100 after the last confirmed write.

use crate::client::ApiRequest;
use crate::errors::GitHubResult;
use crate::observability::TracingHooks;
use crate::service::{repo_path, GitHubService, PushFileRequest};
use crate::types::{Blob, Tree, TreeEntry};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use tokio::time::sleep;
use tracing::{info, instrument};
use uuid::Uuid;

/// Progress reported once the tree has been fetched.
pub const TREE_FETCHED_PROGRESS: u8 = 10;

/// Length of the random suffix of temporary repository names.
const SUFFIX_LEN: usize = 6;

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepoRef {
    /// Owner login.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl RepoRef {
    /// Creates a reference.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A condition that made a clone incomplete without failing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloneWarning {
    /// GitHub truncated the recursive tree listing; files beyond the listed
    /// entries were not copied.
    TruncatedTree {
        /// Entries GitHub did return.
        entries: usize,
    },
}

impl fmt::Display for CloneWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedTree { entries } => write!(
                f,
                "source tree was truncated after {} entries, the clone is partial",
                entries
            ),
        }
    }
}

/// Outcome of a clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloneReport {
    /// Files written to the destination.
    pub files_copied: usize,
    /// Warnings.
    pub warnings: Vec<CloneWarning>,
}

impl CloneReport {
    /// Returns true when the source tree listing was truncated.
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, CloneWarning::TruncatedTree { .. }))
    }
}

/// Repository cloning operations.
pub struct RepositoryCloner<'a> {
    service: &'a GitHubService,
}

impl<'a> RepositoryCloner<'a> {
    /// Creates a new cloner.
    pub fn new(service: &'a GitHubService) -> Self {
        Self { service }
    }

    /// Copies every file of `source` at `git_ref` into the default branch of
    /// `destination`.
    ///
    /// Blob downloads run with bounded concurrency but writes are strictly
    /// sequential, separated by the configured push delay. Files that already
    /// exist in the destination are overwritten. `on_progress` receives
    /// non-decreasing values starting at 10 and ending at exactly 100.
    #[instrument(skip(self, source, destination, on_progress), fields(source = %source, destination = %destination))]
    pub async fn clone_repo_contents<F>(
        &self,
        source: &RepoRef,
        destination: &RepoRef,
        git_ref: &str,
        mut on_progress: F,
    ) -> GitHubResult<CloneReport>
    where
        F: FnMut(u8),
    {
        let settings = self.service.config().clone.clone();
        let token = self.service.token().await?;
        let client = self.service.client();

        let tree_path = format!(
            "{}/git/trees/{}",
            repo_path(&source.owner, &source.repo),
            urlencoding::encode(git_ref)
        );
        let tree: Tree = client
            .send(&token, ApiRequest::get(tree_path).query("recursive", 1))
            .await?;

        let mut report = CloneReport::default();
        if tree.truncated {
            TracingHooks::on_truncated_tree(&source.owner, &source.repo, git_ref, tree.tree.len());
            report.warnings.push(CloneWarning::TruncatedTree {
                entries: tree.tree.len(),
            });
        }

        let blobs: Vec<TreeEntry> = tree.tree.into_iter().filter(TreeEntry::is_blob).collect();
        let total = blobs.len();
        on_progress(TREE_FETCHED_PROGRESS);

        let files: Vec<(TreeEntry, Vec<u8>)> = stream::iter(blobs)
            .map(|entry| {
                let token = &token;
                async move {
                    let path = format!(
                        "{}/git/blobs/{}",
                        repo_path(&source.owner, &source.repo),
                        entry.sha
                    );
                    let blob: Blob = client.get(token, &path).await?;
                    let content = blob.decode()?;
                    Ok::<_, crate::errors::GitHubError>((entry, content))
                }
            })
            .buffered(settings.fetch_concurrency.max(1))
            .try_collect()
            .await?;

        for (index, (entry, content)) in files.into_iter().enumerate() {
            if index > 0 && !settings.push_delay.is_zero() {
                sleep(settings.push_delay).await;
            }

            let message = format!("Copy {} from {}", entry.path, source);
            self.service
                .upsert_file(
                    &destination.owner,
                    &destination.repo,
                    PushFileRequest::new(entry.path.as_str(), content, message),
                )
                .await?;

            report.files_copied += 1;
            let percent = progress_after(index + 1, total);
            TracingHooks::on_clone_progress(percent, &entry.path);
            on_progress(percent);
        }

        if total == 0 {
            on_progress(100);
        }

        info!(files = report.files_copied, partial = report.is_partial(), "Clone finished");
        Ok(report)
    }

    /// Creates a public repository named
    /// `temp-<source_repo>-<timestamp>-<suffix>`, seeds it with a placeholder
    /// file on `branch` and returns the generated name.
    #[instrument(skip(self))]
    pub async fn create_temporary_public_repo(
        &self,
        owner: &str,
        source_repo: &str,
        branch: &str,
    ) -> GitHubResult<String> {
        let name = temporary_repo_name(source_repo);
        let description = format!("Temporary copy of {}", source_repo);
        self.service
            .create_repo(&name, false, Some(&description))
            .await?;

        let placeholder = self.service.config().clone.placeholder_path.clone();
        let content = format!("# {}\n\nTemporary repository created from {}.\n", name, source_repo);
        self.service
            .push_file(
                owner,
                &name,
                &PushFileRequest::new(placeholder, content, "Initialize temporary repository")
                    .branch(branch),
            )
            .await?;

        info!(repo = %name, "Created temporary repository");
        Ok(name)
    }
}

/// Percentage after `done` of `total` files: 10 plus a linear share of 90.
fn progress_after(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    let span = usize::from(100 - TREE_FETCHED_PROGRESS);
    TREE_FETCHED_PROGRESS + (span * done / total) as u8
}

fn temporary_repo_name(source_repo: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect();
    format!(
        "temp-{}-{}-{}",
        source_repo,
        Utc::now().format("%Y%m%d%H%M%S"),
        suffix
    )
}
