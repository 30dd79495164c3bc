//! GitHub SCM provider implementation
//!
//! Uses the GitHub REST API (`/orgs/{org}/repos`, `/repos/{owner}/{repo}/...`)
//! with a bearer token. Works against GitHub Enterprise through `api_url`.
//!
//! Repositories are addressed by organization and name; the numeric GitHub id
//! is kept in [`RepositoryId::Numeric`]. A content lookup answers 404 both for
//! a missing path and for a missing branch or repository, so a 404 is only
//! reported as "path does not exist" after the branch itself resolves.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::credentials::GitHubCredentials;
use super::http::{self, ApiResponse};
use super::traits::{
    normalize_path, path_lookup_result, require_non_empty, CloneProtocol, Repository,
    RepositoryId, ScmProvider, ScmProviderType,
};
use crate::context::CallContext;
use crate::errors::{ApiFailure, ScmError};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;

/// GitHub provider bound to one organization
pub struct GitHubProvider {
    client: Client,
    credentials: GitHubCredentials,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: i64,
    name: String,
    clone_url: String,
    ssh_url: String,
    default_branch: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
    commit: GitHubCommitRef,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: Option<String>,
}

impl GitHubProvider {
    /// Create a new GitHub provider with the given credentials
    pub fn new(credentials: GitHubCredentials) -> Result<Self, ScmError> {
        require_non_empty("token", &credentials.token)?;
        require_non_empty("organization", &credentials.organization)?;

        let base_url = http::base_url(credentials.api_url.as_deref(), GITHUB_API_BASE)?;

        Ok(Self {
            client: http::build_client()?,
            credentials,
            base_url,
        })
    }

    fn repo_url(&self, repo: &Repository, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&repo.organization),
            urlencoding::encode(&repo.repository),
            suffix
        )
    }

    /// Make an authenticated GET request to the GitHub API
    async fn api_get(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, ScmError> {
        debug!("GitHub API request: GET {}", url);

        let request = self
            .client
            .get(url)
            .bearer_auth(&self.credentials.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .query(query);

        http::execute(ctx, request, decode_failure).await
    }

    /// Fetch every page of a list endpoint
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<Vec<T>, ScmError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let response = self.api_get(ctx, url, &query).await?;
            let batch: Vec<T> = response.json(ScmProviderType::GitHub)?;
            let count = batch.len();
            items.extend(batch);

            debug!("Received {} items on page {} from {}", count, page, url);

            // Break if we received fewer items than per_page (last page)
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Resolve the branch of `repo`; a failure here is a stale reference
    async fn confirm_branch(&self, ctx: &CallContext, repo: &Repository) -> Result<(), ScmError> {
        let url = self.repo_url(
            repo,
            &format!("branches/{}", http::encode_path(&repo.branch)),
        );
        self.api_get(ctx, &url, &[]).await.map(|_| ())
    }
}

fn decode_failure(status: u16, body: &str) -> ApiFailure {
    let message = serde_json::from_str::<GitHubErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| http::fallback_message(body));
    ApiFailure::new(ScmProviderType::GitHub, status, message)
}

/// The contents endpoint reports a missing path with a bare 404
fn is_missing_item(failure: &ApiFailure) -> bool {
    failure.status == 404
}

#[async_trait]
impl ScmProvider for GitHubProvider {
    fn provider_type(&self) -> ScmProviderType {
        ScmProviderType::GitHub
    }

    fn organization(&self) -> &str {
        &self.credentials.organization
    }

    async fn list_repos(
        &self,
        ctx: &CallContext,
        protocol: Option<CloneProtocol>,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = format!(
            "{}/orgs/{}/repos",
            self.base_url,
            urlencoding::encode(&self.credentials.organization)
        );
        let github_repos: Vec<GitHubRepo> = self.list_all(ctx, &url).await?;

        let repos: Vec<Repository> = github_repos
            .into_iter()
            .filter_map(|r| {
                let Some(default_branch) = r.default_branch else {
                    debug!("Skipping GitHub repository {} without default branch", r.name);
                    return None;
                };
                let url = match protocol {
                    Some(CloneProtocol::Https) => r.clone_url,
                    Some(CloneProtocol::Ssh) | None => r.ssh_url,
                };
                Some(Repository {
                    organization: self.credentials.organization.clone(),
                    repository: r.name,
                    url,
                    branch: default_branch,
                    sha: String::new(),
                    labels: r.topics,
                    repository_id: RepositoryId::Numeric(r.id),
                })
            })
            .collect();

        info!(
            "Listed {} GitHub repositories in {}",
            repos.len(),
            self.credentials.organization
        );
        Ok(repos)
    }

    async fn get_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = self.repo_url(repo, "branches");
        let branches: Vec<GitHubBranch> = self.list_all(ctx, &url).await?;

        Ok(branches
            .into_iter()
            .map(|b| repo.with_branch(b.name, b.commit.sha))
            .collect())
    }

    async fn repo_has_path(
        &self,
        ctx: &CallContext,
        repo: &Repository,
        path: &str,
    ) -> Result<bool, ScmError> {
        let path = normalize_path(path);
        let url = if path.is_empty() {
            self.repo_url(repo, "contents")
        } else {
            self.repo_url(repo, &format!("contents/{}", http::encode_path(path)))
        };

        let lookup = self
            .api_get(ctx, &url, &[("ref", repo.branch.clone())])
            .await
            .map(|_| ());

        if path_lookup_result(lookup, is_missing_item)? {
            return Ok(true);
        }
        self.confirm_branch(ctx, repo).await?;
        Ok(false)
    }
}
