//! Core data types for the GitHub API surface the engine touches.

use crate::errors::{GitHubError, GitHubResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GitHub user (minimal representation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    #[serde(default)]
    pub id: u64,
    /// Username (login).
    pub login: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Public email.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile URL.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Account type (`User` or `Organization`).
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
}

impl User {
    /// Returns true for organization accounts.
    pub fn is_organization(&self) -> bool {
        self.account_type.as_deref() == Some("Organization")
    }
}

/// Permissions the authenticated user holds on a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPermissions {
    /// Administrative access.
    #[serde(default)]
    pub admin: bool,
    /// Write access.
    #[serde(default)]
    pub push: bool,
    /// Read access.
    #[serde(default)]
    pub pull: bool,
}

/// GitHub repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Repository ID.
    #[serde(default)]
    pub id: u64,
    /// Repository name.
    pub name: String,
    /// Full name (owner/repo).
    #[serde(default)]
    pub full_name: String,
    /// Owner information.
    #[serde(default)]
    pub owner: Option<User>,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
    /// Repository description.
    #[serde(default)]
    pub description: Option<String>,
    /// HTML URL.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Default branch.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Repository size in KB.
    #[serde(default)]
    pub size: u64,
    /// Caller's permissions (present on authenticated listings).
    #[serde(default)]
    pub permissions: Option<RepoPermissions>,
}

/// Existence-aware view of a repository.
///
/// When `exists` is false only `name` is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Owner login.
    pub owner: Option<String>,
    /// Repository name.
    pub name: String,
    /// Whether the repository could be read.
    pub exists: bool,
    /// Visibility.
    pub private: Option<bool>,
    /// Default branch.
    pub default_branch: Option<String>,
}

impl RepositoryDescriptor {
    /// Descriptor for a repository that could not be read.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            exists: false,
            private: None,
            default_branch: None,
        }
    }
}

impl From<Repository> for RepositoryDescriptor {
    fn from(repo: Repository) -> Self {
        Self {
            owner: repo.owner.map(|o| o.login),
            name: repo.name,
            exists: true,
            private: Some(repo.private),
            default_branch: repo.default_branch,
        }
    }
}

/// GitHub branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name.
    pub name: String,
    /// Head commit reference.
    pub commit: BranchCommit,
    /// Whether branch is protected.
    #[serde(default)]
    pub protected: bool,
}

/// Branch head commit reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCommit {
    /// Commit SHA.
    pub sha: String,
    /// Commit URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Entry of a commit listing; only the sha is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Commit SHA.
    pub sha: String,
}

/// Node kind in a recursive tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    /// File content.
    Blob,
    /// Directory.
    Tree,
    /// Submodule pointer.
    Commit,
}

/// One entry of a git tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// File mode.
    pub mode: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
    /// Object SHA.
    pub sha: String,
    /// Blob size in bytes (absent for trees).
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    /// Returns true for file entries.
    pub fn is_blob(&self) -> bool {
        self.kind == TreeEntryKind::Blob
    }
}

/// A git tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Tree SHA.
    pub sha: String,
    /// Entries.
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    /// Set by GitHub when the recursive listing exceeded its limits.
    #[serde(default)]
    pub truncated: bool,
}

/// A git blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    /// Blob SHA.
    pub sha: String,
    /// Encoded content.
    pub content: String,
    /// Content encoding (`base64` or `utf-8`).
    pub encoding: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

impl Blob {
    /// Decodes the blob into raw bytes.
    pub fn decode(&self) -> GitHubResult<Vec<u8>> {
        if self.encoding == "base64" {
            decode_base64(&self.content)
        } else {
            Ok(self.content.as_bytes().to_vec())
        }
    }
}

/// A file returned by the contents endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFile {
    /// File name.
    #[serde(default)]
    pub name: String,
    /// File path.
    pub path: String,
    /// Blob SHA.
    pub sha: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Encoded content (absent on commit responses).
    #[serde(default)]
    pub content: Option<String>,
    /// Content encoding.
    #[serde(default)]
    pub encoding: Option<String>,
    /// HTML URL.
    #[serde(default)]
    pub html_url: Option<String>,
}

impl ContentFile {
    /// Decodes the file body, if present.
    pub fn decoded_content(&self) -> GitHubResult<Option<Vec<u8>>> {
        match (self.content.as_deref(), self.encoding.as_deref()) {
            (Some(content), Some("base64")) => decode_base64(content).map(Some),
            (Some(content), _) => Ok(Some(content.as_bytes().to_vec())),
            (None, _) => Ok(None),
        }
    }
}

/// Response from contents write operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCommitResponse {
    /// The written file (null on delete).
    #[serde(default)]
    pub content: Option<ContentFile>,
    /// The created commit.
    pub commit: FileCommit,
}

/// Commit created by a contents write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCommit {
    /// Commit SHA.
    pub sha: String,
    /// Commit message.
    #[serde(default)]
    pub message: Option<String>,
    /// HTML URL.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Issue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Open.
    Open,
    /// Closed.
    Closed,
}

/// Issue state filter for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStateFilter {
    /// Only open issues.
    #[default]
    Open,
    /// Only closed issues.
    Closed,
    /// Every issue.
    All,
}

impl IssueStateFilter {
    /// Query parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// Issue label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Color hex code.
    #[serde(default)]
    pub color: Option<String>,
}

/// GitHub issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue ID.
    #[serde(default)]
    pub id: u64,
    /// Issue number.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Body.
    #[serde(default)]
    pub body: Option<String>,
    /// State.
    pub state: IssueState,
    /// Labels.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Author.
    #[serde(default)]
    pub user: Option<User>,
    /// Comment count.
    #[serde(default)]
    pub comments: u64,
    /// HTML URL.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Set when the item is a pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Returns true when the listing item is a pull request.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Issue comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Comment ID.
    pub id: u64,
    /// Body.
    pub body: String,
    /// Author.
    #[serde(default)]
    pub user: Option<User>,
    /// HTML URL.
    #[serde(default)]
    pub html_url: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A GitHub App installation visible to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    /// Installation ID.
    pub id: u64,
    /// Account the App is installed on.
    #[serde(default)]
    pub account: Option<User>,
    /// App ID.
    #[serde(default)]
    pub app_id: Option<u64>,
    /// Repository selection (`all` or `selected`).
    #[serde(default)]
    pub repository_selection: Option<String>,
}

/// Response of `GET /user/installations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationList {
    /// Total count.
    #[serde(default)]
    pub total_count: u64,
    /// Installations.
    #[serde(default)]
    pub installations: Vec<Installation>,
}

/// Installation-scoped access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationToken {
    /// Access token.
    pub token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

/// Change state of a file reported by the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// New file.
    Added,
    /// Changed file.
    Modified,
    /// Removed file.
    Deleted,
    /// Untouched file.
    Unchanged,
}

/// A `(path, content, status)` tuple from the change-detection collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    /// File content.
    pub content: String,
    /// Change status.
    pub status: ChangeStatus,
}

impl FileChange {
    /// Creates a change tuple.
    pub fn new(path: impl Into<String>, content: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            status,
        }
    }
}

/// Feedback category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    /// Bug report.
    Bug,
    /// Feature request.
    Feature,
    /// Question.
    Question,
    /// Anything else.
    Other,
}

impl FeedbackCategory {
    /// Label name applied to the filed issue.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "enhancement",
            Self::Question => "question",
            Self::Other => "feedback",
        }
    }

    /// Human-readable title prefix.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Bug => "Bug Report",
            Self::Feature => "Feature Request",
            Self::Question => "Question",
            Self::Other => "Feedback",
        }
    }
}

/// User feedback filed against the maintenance repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    /// Category.
    pub category: FeedbackCategory,
    /// Free-form message.
    pub message: String,
    /// Optional contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Environment metadata (browser, version, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Decodes GitHub base64, which wraps lines with `\n`.
pub(crate) fn decode_base64(content: &str) -> GitHubResult<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::deserialization(format!("Invalid base64 content: {}", e)))
}

/// Encodes raw bytes for the contents endpoint.
pub(crate) fn encode_base64(content: &[u8]) -> String {
    STANDARD.encode(content)
}
