//! SCM provider trait definitions
//!
//! This module defines the discovery contract every hosting backend implements
//! and the normalized repository model the contract produces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::CallContext;
use crate::errors::ScmError;

/// Supported SCM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScmProviderType {
    /// Azure DevOps Services / Server (Personal Access Token)
    #[serde(rename = "azure_devops")]
    AzureDevOps,
    /// GitHub / GitHub Enterprise (token)
    #[serde(rename = "github")]
    GitHub,
    /// GitLab / self-managed GitLab (private token)
    #[serde(rename = "gitlab")]
    GitLab,
    /// Gitea (token)
    #[serde(rename = "gitea")]
    Gitea,
    /// Bitbucket Cloud (username + app password)
    #[serde(rename = "bitbucket")]
    Bitbucket,
}

impl fmt::Display for ScmProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScmProviderType::AzureDevOps => write!(f, "azure_devops"),
            ScmProviderType::GitHub => write!(f, "github"),
            ScmProviderType::GitLab => write!(f, "gitlab"),
            ScmProviderType::Gitea => write!(f, "gitea"),
            ScmProviderType::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl FromStr for ScmProviderType {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure_devops" | "azuredevops" | "azure" | "ado" => Ok(ScmProviderType::AzureDevOps),
            "github" | "gh" => Ok(ScmProviderType::GitHub),
            "gitlab" | "gl" => Ok(ScmProviderType::GitLab),
            "gitea" => Ok(ScmProviderType::Gitea),
            "bitbucket" | "bitbucket_cloud" | "bb" => Ok(ScmProviderType::Bitbucket),
            _ => Err(ScmError::InvalidConfiguration(format!(
                "Unknown provider type: {}",
                s
            ))),
        }
    }
}

impl ScmProviderType {
    /// Returns the required credential fields for this provider type
    pub fn required_credentials(&self) -> Vec<&'static str> {
        match self {
            ScmProviderType::AzureDevOps => vec!["organization", "project", "access_token"],
            ScmProviderType::GitHub => vec!["organization", "token"],
            ScmProviderType::GitLab => vec!["group", "token"],
            ScmProviderType::Gitea => vec!["owner", "token"],
            ScmProviderType::Bitbucket => vec!["workspace", "username", "app_password"],
        }
    }
}

/// Which clone URL form to put in [`Repository::url`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    Https,
    Ssh,
}

impl fmt::Display for CloneProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloneProtocol::Https => write!(f, "https"),
            CloneProtocol::Ssh => write!(f, "ssh"),
        }
    }
}

impl FromStr for CloneProtocol {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "https" | "http" => Ok(CloneProtocol::Https),
            "ssh" => Ok(CloneProtocol::Ssh),
            _ => Err(ScmError::InvalidConfiguration(format!(
                "Unknown clone protocol: {}",
                s
            ))),
        }
    }
}

/// Backend-native repository identifier.
///
/// Opaque to callers. Each provider documents which variant it produces and
/// rejects the other with [`ScmError::InvalidRepositoryId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryId {
    Numeric(i64),
    Text(String),
}

impl RepositoryId {
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            RepositoryId::Numeric(id) => Some(*id),
            RepositoryId::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RepositoryId::Text(id) => Some(id),
            RepositoryId::Numeric(_) => None,
        }
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryId::Numeric(id) => write!(f, "{}", id),
            RepositoryId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// A normalized discovery result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    /// Owning organization, group, workspace or owner the provider is bound to
    pub organization: String,

    /// Repository name, unique within `organization`
    pub repository: String,

    /// Clone URL in the requested protocol
    pub url: String,

    /// Default branch for repository-level results, the specific branch otherwise
    pub branch: String,

    /// Commit id at the tip of `branch`; empty for repository-level results
    #[serde(default)]
    pub sha: String,

    /// Backend topics/tags
    #[serde(default)]
    pub labels: Vec<String>,

    /// Backend-native id, accepted verbatim by follow-up calls
    pub repository_id: RepositoryId,
}

impl Repository {
    /// Branch-level copy of this repository. Only `branch` and `sha` change.
    pub fn with_branch(&self, branch: impl Into<String>, sha: impl Into<String>) -> Repository {
        Repository {
            branch: branch.into(),
            sha: sha.into(),
            ..self.clone()
        }
    }
}

/// Core SCM provider trait
///
/// All hosting backends implement this trait so callers can enumerate
/// repositories, branches and paths without branching on the backend.
/// Implementations hold no mutable cross-call state and are safe to share
/// between concurrent calls.
#[async_trait]
pub trait ScmProvider: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> ScmProviderType;

    /// The organization this instance is bound to
    fn organization(&self) -> &str;

    /// List every repository visible to the credential in the bound scope
    async fn list_repos(
        &self,
        ctx: &CallContext,
        protocol: Option<CloneProtocol>,
    ) -> Result<Vec<Repository>, ScmError>;

    /// Expand a repository returned by `list_repos` into one entry per branch
    async fn get_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError>;

    /// Whether `path` exists at the tip of `repo.branch`.
    ///
    /// A missing path is `Ok(false)`; every other failure is an error.
    async fn repo_has_path(
        &self,
        ctx: &CallContext,
        repo: &Repository,
        path: &str,
    ) -> Result<bool, ScmError>;
}

/// Strip leading and trailing slashes. The repository root becomes `""`.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Translate the outcome of a content lookup into the path-existence result.
///
/// `is_missing_item` is the backend's not-found classifier; only failures it
/// accepts become `Ok(false)`.
pub(crate) fn path_lookup_result(
    lookup: Result<(), ScmError>,
    is_missing_item: impl FnOnce(&crate::errors::ApiFailure) -> bool,
) -> Result<bool, ScmError> {
    match lookup {
        Ok(()) => Ok(true),
        Err(err) => match err.api_failure() {
            Some(failure) if is_missing_item(failure) => Ok(false),
            _ => Err(err),
        },
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ScmError> {
    if value.trim().is_empty() {
        return Err(ScmError::InvalidConfiguration(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}
