//! GitLab SCM provider implementation
//!
//! Uses the GitLab REST API v4 with a `PRIVATE-TOKEN` header. Projects are
//! listed per group, optionally including subgroups.
//!
//! Path existence is answered from the repository tree API so that both files
//! and directories are found: the parent directory is listed and searched for
//! the exact path. GitLab reports a missing directory and a missing ref with
//! the same `404 Tree Not Found` message, so that answer is only trusted once
//! the branch itself resolves.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::credentials::GitLabCredentials;
use super::http::{self, ApiResponse};
use super::traits::{
    normalize_path, path_lookup_result, require_non_empty, CloneProtocol, Repository,
    RepositoryId, ScmProvider, ScmProviderType,
};
use crate::context::CallContext;
use crate::errors::{ApiFailure, ScmError};

const GITLAB_BASE: &str = "https://gitlab.com";
const API_PREFIX: &str = "/api/v4";
const PER_PAGE: usize = 100;
const TREE_NOT_FOUND: &str = "404 Tree Not Found";

/// GitLab provider bound to one group
pub struct GitLabProvider {
    client: Client,
    credentials: GitLabCredentials,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: i64,
    path: String,
    path_with_namespace: String,
    http_url_to_repo: String,
    ssh_url_to_repo: String,
    default_branch: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    tag_list: Vec<String>,
    #[serde(default)]
    empty_repo: bool,
}

#[derive(Debug, Deserialize)]
struct GitLabBranch {
    name: String,
    commit: GitLabCommitRef,
}

#[derive(Debug, Deserialize)]
struct GitLabCommitRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GitLabTreeEntry {
    path: String,
}

/// `message` is a string for most errors and an object for validation errors
#[derive(Debug, Deserialize)]
struct GitLabErrorResponse {
    message: Option<serde_json::Value>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GitLabProvider {
    /// Create a new GitLab provider with the given credentials
    pub fn new(credentials: GitLabCredentials) -> Result<Self, ScmError> {
        require_non_empty("token", &credentials.token)?;
        require_non_empty("group", &credentials.group)?;

        let instance = http::base_url(credentials.api_url.as_deref(), GITLAB_BASE)?;
        let base_url = if instance.ends_with(API_PREFIX) {
            instance
        } else {
            format!("{}{}", instance, API_PREFIX)
        };

        Ok(Self {
            client: http::build_client()?,
            credentials,
            base_url,
        })
    }

    fn project_url(&self, repo: &Repository, suffix: &str) -> Result<String, ScmError> {
        let id = repo.repository_id.as_numeric().ok_or_else(|| {
            ScmError::InvalidRepositoryId(format!(
                "GitLab project id must be numeric, got '{}'",
                repo.repository_id
            ))
        })?;
        Ok(format!("{}/projects/{}/{}", self.base_url, id, suffix))
    }

    /// Make an authenticated GET request to the GitLab API
    async fn api_get(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, ScmError> {
        debug!("GitLab API request: GET {}", url);

        let request = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.credentials.token)
            .query(query);

        http::execute(ctx, request, decode_failure).await
    }

    /// Fetch every page of a list endpoint
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ScmError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", PER_PAGE.to_string()));
            page_query.push(("page", page.to_string()));

            let response = self.api_get(ctx, url, &page_query).await?;
            let batch: Vec<T> = response.json(ScmProviderType::GitLab)?;
            let count = batch.len();
            items.extend(batch);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Name of a project relative to the bound group.
    ///
    /// GitLab matches group paths case-insensitively, so the prefix is too.
    /// A project outside the group keeps its full namespaced path.
    fn relative_name(&self, project: &GitLabProject) -> String {
        let group = self.credentials.group.trim_matches('/');
        let full_path = project.path_with_namespace.as_str();
        full_path
            .get(..group.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(group))
            .and_then(|_| full_path[group.len()..].strip_prefix('/'))
            .unwrap_or(full_path)
            .to_string()
    }

    fn convert_project(
        &self,
        project: GitLabProject,
        protocol: Option<CloneProtocol>,
    ) -> Option<Repository> {
        if project.empty_repo {
            debug!("Skipping empty GitLab project {}", project.path_with_namespace);
            return None;
        }
        let Some(default_branch) = project.default_branch.clone() else {
            debug!(
                "Skipping GitLab project {} without default branch",
                project.path_with_namespace
            );
            return None;
        };

        let repository = if self.credentials.include_subgroups {
            self.relative_name(&project)
        } else {
            project.path.clone()
        };
        let labels = if project.topics.is_empty() {
            project.tag_list
        } else {
            project.topics
        };
        let url = match protocol {
            Some(CloneProtocol::Ssh) => project.ssh_url_to_repo,
            Some(CloneProtocol::Https) | None => project.http_url_to_repo,
        };

        Some(Repository {
            organization: self.credentials.group.clone(),
            repository,
            url,
            branch: default_branch,
            sha: String::new(),
            labels,
            repository_id: RepositoryId::Numeric(project.id),
        })
    }

    /// Search the parent directory listing for `path` on `branch`
    async fn tree_contains(
        &self,
        ctx: &CallContext,
        repo: &Repository,
        path: &str,
    ) -> Result<(), ScmError> {
        let url = self.project_url(repo, "repository/tree")?;

        if path.is_empty() {
            let query = [("ref", repo.branch.clone()), ("per_page", "1".to_string())];
            let response = self.api_get(ctx, &url, &query).await?;
            let entries: Vec<GitLabTreeEntry> = response.json(ScmProviderType::GitLab)?;
            return if entries.is_empty() {
                Err(missing_tree())
            } else {
                Ok(())
            };
        }

        let parent = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let mut query = vec![("ref", repo.branch.clone())];
        if !parent.is_empty() {
            query.push(("path", parent.to_string()));
        }

        let entries: Vec<GitLabTreeEntry> = self.list_all(ctx, &url, &query).await?;
        if entries.iter().any(|entry| entry.path == path) {
            Ok(())
        } else {
            Err(missing_tree())
        }
    }

    /// Resolve the branch of `repo`; a failure here is a stale reference
    async fn confirm_branch(&self, ctx: &CallContext, repo: &Repository) -> Result<(), ScmError> {
        let url = self.project_url(
            repo,
            &format!(
                "repository/branches/{}",
                urlencoding::encode(&repo.branch)
            ),
        )?;
        self.api_get(ctx, &url, &[]).await.map(|_| ())
    }
}

/// A lookup that resolved but did not contain the requested entry
fn missing_tree() -> ScmError {
    ScmError::from(
        ApiFailure::new(ScmProviderType::GitLab, 404, TREE_NOT_FOUND)
            .with_code(Some(TREE_NOT_FOUND.to_string())),
    )
}

fn decode_failure(status: u16, body: &str) -> ApiFailure {
    let Ok(error) = serde_json::from_str::<GitLabErrorResponse>(body) else {
        return ApiFailure::new(ScmProviderType::GitLab, status, http::fallback_message(body));
    };

    let message_text = match &error.message {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let code = match &error.message {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        _ => error.error.clone(),
    };
    let message = message_text
        .or(error.error_description)
        .or(error.error)
        .unwrap_or_else(|| http::fallback_message(body));

    ApiFailure::new(ScmProviderType::GitLab, status, message).with_code(code)
}

fn is_missing_item(failure: &ApiFailure) -> bool {
    failure.status == 404 && failure.code_is(TREE_NOT_FOUND)
}

#[async_trait]
impl ScmProvider for GitLabProvider {
    fn provider_type(&self) -> ScmProviderType {
        ScmProviderType::GitLab
    }

    fn organization(&self) -> &str {
        &self.credentials.group
    }

    async fn list_repos(
        &self,
        ctx: &CallContext,
        protocol: Option<CloneProtocol>,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = format!(
            "{}/groups/{}/projects",
            self.base_url,
            urlencoding::encode(self.credentials.group.trim_matches('/'))
        );
        let query = [(
            "include_subgroups",
            self.credentials.include_subgroups.to_string(),
        )];
        let projects: Vec<GitLabProject> = self.list_all(ctx, &url, &query).await?;

        let repos: Vec<Repository> = projects
            .into_iter()
            .filter_map(|p| self.convert_project(p, protocol))
            .collect();

        info!(
            "Listed {} GitLab projects in {}",
            repos.len(),
            self.credentials.group
        );
        Ok(repos)
    }

    async fn get_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = self.project_url(repo, "repository/branches")?;
        let branches: Vec<GitLabBranch> = self.list_all(ctx, &url, &[]).await?;

        Ok(branches
            .into_iter()
            .map(|b| repo.with_branch(b.name, b.commit.id))
            .collect())
    }

    async fn repo_has_path(
        &self,
        ctx: &CallContext,
        repo: &Repository,
        path: &str,
    ) -> Result<bool, ScmError> {
        let path = normalize_path(path);
        let lookup = self.tree_contains(ctx, repo, path).await;

        if path_lookup_result(lookup, is_missing_item)? {
            return Ok(true);
        }
        self.confirm_branch(ctx, repo).await?;
        Ok(false)
    }
}
