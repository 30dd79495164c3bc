//! Gitea SCM provider implementation
//!
//! Uses the Gitea API v1 with `Authorization: token ...`. Topics are not part
//! of the repository listing and are fetched per repository.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::credentials::GiteaCredentials;
use super::http::{self, ApiResponse};
use super::traits::{
    normalize_path, path_lookup_result, require_non_empty, CloneProtocol, Repository,
    RepositoryId, ScmProvider, ScmProviderType,
};
use crate::context::CallContext;
use crate::errors::{ApiFailure, ScmError};

const GITEA_BASE: &str = "https://gitea.com";
const API_PREFIX: &str = "/api/v1";
const PAGE_LIMIT: usize = 50;

/// Gitea provider bound to one owner
pub struct GiteaProvider {
    client: Client,
    credentials: GiteaCredentials,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GiteaRepo {
    id: i64,
    name: String,
    clone_url: String,
    ssh_url: String,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    empty: bool,
}

#[derive(Debug, Deserialize)]
struct GiteaTopics {
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GiteaBranch {
    name: String,
    commit: GiteaCommitRef,
}

#[derive(Debug, Deserialize)]
struct GiteaCommitRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GiteaErrorResponse {
    message: Option<String>,
}

impl GiteaProvider {
    pub fn new(credentials: GiteaCredentials) -> Result<Self, ScmError> {
        require_non_empty("token", &credentials.token)?;
        require_non_empty("owner", &credentials.owner)?;

        let instance = http::base_url(credentials.api_url.as_deref(), GITEA_BASE)?;
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

    fn repo_url(&self, owner: &str, name: &str, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(name),
            suffix
        )
    }

    async fn api_get(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, ScmError> {
        debug!("Gitea API request: GET {}", url);

        let request = self
            .client
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.credentials.token),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);

        http::execute(ctx, request, decode_failure).await
    }

    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<Vec<T>, ScmError> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let query = [("page", page.to_string()), ("limit", PAGE_LIMIT.to_string())];
            let response = self.api_get(ctx, url, &query).await?;
            let batch: Vec<T> = response.json(ScmProviderType::Gitea)?;
            let count = batch.len();
            items.extend(batch);

            if count < PAGE_LIMIT {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    async fn topics(&self, ctx: &CallContext, name: &str) -> Result<Vec<String>, ScmError> {
        let url = self.repo_url(&self.credentials.owner, name, "topics");
        let response = self.api_get(ctx, &url, &[]).await?;
        let topics: GiteaTopics = response.json(ScmProviderType::Gitea)?;
        Ok(topics.topics)
    }

    async fn confirm_branch(&self, ctx: &CallContext, repo: &Repository) -> Result<(), ScmError> {
        let url = self.repo_url(
            &repo.organization,
            &repo.repository,
            &format!("branches/{}", http::encode_path(&repo.branch)),
        );
        self.api_get(ctx, &url, &[]).await.map(|_| ())
    }
}

fn decode_failure(status: u16, body: &str) -> ApiFailure {
    let message = serde_json::from_str::<GiteaErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| http::fallback_message(body));
    ApiFailure::new(ScmProviderType::Gitea, status, message)
}

fn is_missing_item(failure: &ApiFailure) -> bool {
    failure.status == 404
}

#[async_trait]
impl ScmProvider for GiteaProvider {
    fn provider_type(&self) -> ScmProviderType {
        ScmProviderType::Gitea
    }

    fn organization(&self) -> &str {
        &self.credentials.owner
    }

    async fn list_repos(
        &self,
        ctx: &CallContext,
        protocol: Option<CloneProtocol>,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = format!(
            "{}/orgs/{}/repos",
            self.base_url,
            urlencoding::encode(&self.credentials.owner)
        );
        let gitea_repos: Vec<GiteaRepo> = self.list_all(ctx, &url).await?;

        let mut repos = Vec::with_capacity(gitea_repos.len());
        for r in gitea_repos {
            if r.empty || r.default_branch.is_empty() {
                debug!("Skipping empty Gitea repository {}", r.name);
                continue;
            }

            let labels = self.topics(ctx, &r.name).await?;
            let url = match protocol {
                Some(CloneProtocol::Ssh) => r.ssh_url,
                Some(CloneProtocol::Https) | None => r.clone_url,
            };

            repos.push(Repository {
                organization: self.credentials.owner.clone(),
                repository: r.name,
                url,
                branch: r.default_branch,
                sha: String::new(),
                labels,
                repository_id: RepositoryId::Numeric(r.id),
            });
        }

        info!(
            "Listed {} Gitea repositories in {}",
            repos.len(),
            self.credentials.owner
        );
        Ok(repos)
    }

    async fn get_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = self.repo_url(&repo.organization, &repo.repository, "branches");
        let branches: Vec<GiteaBranch> = self.list_all(ctx, &url).await?;

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
        let suffix = if path.is_empty() {
            "contents".to_string()
        } else {
            format!("contents/{}", http::encode_path(path))
        };
        let url = self.repo_url(&repo.organization, &repo.repository, &suffix);

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
