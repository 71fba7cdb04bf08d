//! Repository, branch and commit operations.

use super::{repo_path, GitHubService};
use crate::client::ApiRequest;
use crate::errors::{GitHubError, GitHubErrorKind, GitHubResult};
use crate::observability::TracingHooks;
use crate::types::{Branch, CommitSummary, Repository, RepositoryDescriptor, Tree};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Branch assumed when GitHub does not report one.
const FALLBACK_BRANCH: &str = "main";

/// Request body for creating a repository.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepoRequest {
    /// Repository name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the repository is private.
    pub private: bool,
}

impl CreateRepoRequest {
    /// Creates a request for a public repository.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            private: false,
        }
    }

    /// Sets visibility.
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl GitHubService {
    /// Returns true when the repository can be read.
    ///
    /// Every failure, including authentication, rate limiting and transport
    /// errors, reports `false`.
    #[instrument(skip(self))]
    pub async fn repo_exists(&self, owner: &str, repo: &str) -> bool {
        self.fetch_repo(owner, repo).await.is_some()
    }

    /// Describes the repository, or returns a descriptor with only the name
    /// and `exists == false` when it cannot be read.
    pub async fn get_repo_info(&self, owner: &str, repo: &str) -> RepositoryDescriptor {
        self.fetch_repo(owner, repo)
            .await
            .map(RepositoryDescriptor::from)
            .unwrap_or_else(|| RepositoryDescriptor::missing(repo))
    }

    /// Creates a repository for the authenticated user.
    #[instrument(skip(self, description))]
    pub async fn create_repo(
        &self,
        name: &str,
        is_private: bool,
        description: Option<&str>,
    ) -> GitHubResult<Repository> {
        let mut request = CreateRepoRequest::new(name).private(is_private);
        if let Some(description) = description {
            request = request.description(description);
        }

        let token = self.user_scoped_token().await?;
        let repo: Repository = self.client.post(&token, "/user/repos", &request).await?;
        info!(repo = %repo.full_name, private = repo.private, "Created repository");
        Ok(repo)
    }

    /// Creates the repository only when it cannot be read. Returns true when
    /// it was created; an existing repository keeps its visibility.
    #[instrument(skip(self))]
    pub async fn ensure_repo_exists(
        &self,
        owner: &str,
        repo: &str,
        is_private: bool,
    ) -> GitHubResult<bool> {
        if self.repo_exists(owner, repo).await {
            debug!("Repository already exists");
            return Ok(false);
        }

        self.create_repo(repo, is_private, None).await?;
        Ok(true)
    }

    /// Returns true when the default branch has no tree.
    ///
    /// GitHub answers an empty repository's tree request with 404 or 409;
    /// every other failure reports `false`.
    #[instrument(skip(self))]
    pub async fn is_repo_empty(&self, owner: &str, repo: &str) -> bool {
        let Some(info) = self.fetch_repo(owner, repo).await else {
            return false;
        };
        let token = match self.token().await {
            Ok(token) => token,
            Err(_) => return false,
        };

        let branch = info
            .default_branch
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string());
        let path = format!(
            "{}/git/trees/{}",
            repo_path(owner, repo),
            urlencoding::encode(&branch)
        );

        match self.client.get::<Tree>(&token, &path).await {
            Ok(tree) => tree.tree.is_empty(),
            Err(e) if matches!(e.kind(), GitHubErrorKind::NotFound | GitHubErrorKind::Conflict) => {
                true
            }
            Err(e) => {
                TracingHooks::on_existence_check_collapsed(&format!("{}/{} tree", owner, repo), &e.to_string());
                false
            }
        }
    }

    /// Lists every repository of the authenticated user.
    pub async fn list_repos(&self) -> GitHubResult<Vec<Repository>> {
        let token = self.user_scoped_token().await?;
        self.collect_pages(&token, || ApiRequest::get("/user/repos").query("sort", "updated"))
            .await
    }

    /// Lists every branch of a repository.
    pub async fn list_branches(&self, owner: &str, repo: &str) -> GitHubResult<Vec<Branch>> {
        let token = self.token().await?;
        let path = format!("{}/branches", repo_path(owner, repo));
        self.collect_pages(&token, || ApiRequest::get(path.as_str()))
            .await
    }

    /// Default branch of a repository.
    pub async fn get_default_branch(&self, owner: &str, repo: &str) -> GitHubResult<String> {
        let token = self.token().await?;
        let info: Repository = self.client.get(&token, &repo_path(owner, repo)).await?;
        Ok(info
            .default_branch
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string()))
    }

    /// Head commit sha of a branch.
    pub async fn get_branch_head_sha(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> GitHubResult<String> {
        let token = self.token().await?;
        let path = format!(
            "{}/branches/{}",
            repo_path(owner, repo),
            urlencoding::encode(branch)
        );
        let branch: Branch = self.client.get(&token, &path).await?;
        Ok(branch.commit.sha)
    }

    /// Counts the commits reachable from `branch`, across every page.
    /// An empty repository has zero commits.
    #[instrument(skip(self))]
    pub async fn get_commit_count(&self, owner: &str, repo: &str, branch: &str) -> GitHubResult<u64> {
        let token = self.token().await?;
        let path = format!("{}/commits", repo_path(owner, repo));

        let commits = self
            .collect_pages::<CommitSummary, _>(&token, || {
                ApiRequest::get(path.as_str()).query("sha", branch)
            })
            .await;

        match commits {
            Ok(commits) => Ok(commits.len() as u64),
            Err(e) if e.kind() == GitHubErrorKind::Conflict => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Deletes a repository. Any success status other than 204 is an error.
    #[instrument(skip(self))]
    pub async fn delete_repo(&self, owner: &str, repo: &str) -> GitHubResult<()> {
        let token = self.token().await?;
        let status = self
            .client
            .send_status(&token, ApiRequest::delete(repo_path(owner, repo)))
            .await?;

        if status == StatusCode::NO_CONTENT {
            info!("Deleted repository");
            Ok(())
        } else {
            Err(GitHubError::new(
                GitHubErrorKind::UnexpectedResponse,
                format!("Repository deletion returned HTTP {}", status.as_u16()),
            )
            .with_status(status.as_u16()))
        }
    }

    async fn fetch_repo(&self, owner: &str, repo: &str) -> Option<Repository> {
        let resource = format!("{}/{}", owner, repo);
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => {
                TracingHooks::on_existence_check_collapsed(&resource, &e.to_string());
                return None;
            }
        };

        match self.client.get(&token, &repo_path(owner, repo)).await {
            Ok(repo) => Some(repo),
            Err(e) => {
                TracingHooks::on_existence_check_collapsed(&resource, &e.to_string());
                None
            }
        }
    }
}
