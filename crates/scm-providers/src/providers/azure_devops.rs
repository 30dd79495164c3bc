//! Azure DevOps SCM provider implementation
//!
//! Talks to the Azure DevOps Git REST API (api-version 7.1) with a Personal
//! Access Token sent as basic auth with an empty user name.
//!
//! Repository ids are the repository GUID, stored as [`RepositoryId::Text`].
//! Path lookups classify a missing item by the `typeKey` of the error body:
//! only `GitItemNotFoundException` means "path does not exist". A missing
//! repository (`GitRepositoryNotFoundException`) or branch
//! (`GitUnresolvableToCommitException`) is a real error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::credentials::AzureDevOpsCredentials;
use super::http::{self, ApiResponse};
use super::traits::{
    normalize_path, path_lookup_result, require_non_empty, CloneProtocol, Repository,
    RepositoryId, ScmProvider, ScmProviderType,
};
use crate::context::CallContext;
use crate::errors::{ApiFailure, ScmError};

const AZURE_DEVOPS_BASE: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.1";
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";
const ITEM_NOT_FOUND: &str = "GitItemNotFoundException";
const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Azure DevOps provider bound to one organization and team project
pub struct AzureDevOpsProvider {
    client: Client,
    credentials: AzureDevOpsCredentials,
    base_url: String,
}

/// Azure DevOps API response structures
#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureRepository {
    id: Option<String>,
    name: Option<String>,
    remote_url: Option<String>,
    ssh_url: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct AzureBranchStats {
    name: String,
    commit: AzureCommitRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureCommitRef {
    commit_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureErrorResponse {
    message: Option<String>,
    type_key: Option<String>,
}

impl AzureDevOpsProvider {
    /// Create a new Azure DevOps provider with the given credentials
    pub fn new(credentials: AzureDevOpsCredentials) -> Result<Self, ScmError> {
        require_non_empty("access_token", &credentials.access_token)?;
        require_non_empty("organization", &credentials.organization)?;
        require_non_empty("project", &credentials.project)?;

        let default_base = format!(
            "{}/{}",
            AZURE_DEVOPS_BASE,
            urlencoding::encode(&credentials.organization)
        );
        let base_url = http::base_url(credentials.api_url.as_deref(), &default_base)?;

        Ok(Self {
            client: http::build_client()?,
            credentials,
            base_url,
        })
    }

    fn git_url(&self, path: &str) -> String {
        format!(
            "{}/{}/_apis/git/{}",
            self.base_url,
            urlencoding::encode(&self.credentials.project),
            path
        )
    }

    /// Make an authenticated GET request to the Azure DevOps API
    async fn api_get(
        &self,
        ctx: &CallContext,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, ScmError> {
        debug!("Azure DevOps API request: GET {}", url);

        let request = self
            .client
            .get(url)
            .basic_auth("", Some(&self.credentials.access_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("api-version", API_VERSION)])
            .query(query);

        http::execute(ctx, request, decode_failure).await
    }

    /// GET a list endpoint, following continuation tokens until exhausted
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<Vec<T>, ScmError> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = Vec::new();
            if let Some(token) = &continuation {
                query.push(("continuationToken", token.clone()));
            }

            let response = self.api_get(ctx, url, &query).await?;
            let page: ValueList<T> = response.json(ScmProviderType::AzureDevOps)?;
            items.extend(page.value);

            continuation = response
                .header(CONTINUATION_HEADER)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if continuation.is_none() {
                break;
            }
            debug!("Following Azure DevOps continuation token for {}", url);
        }

        Ok(items)
    }

    fn repository_guid(repo: &Repository) -> Result<&str, ScmError> {
        repo.repository_id.as_text().ok_or_else(|| {
            ScmError::InvalidRepositoryId(format!(
                "Azure DevOps expects a repository GUID, got {}",
                repo.repository_id
            ))
        })
    }

    fn convert_repository(
        &self,
        repo: AzureRepository,
        protocol: Option<CloneProtocol>,
    ) -> Option<Repository> {
        if repo.is_disabled {
            debug!("Skipping disabled Azure DevOps repository {:?}", repo.name);
            return None;
        }

        let url = match protocol {
            Some(CloneProtocol::Ssh) => repo.ssh_url,
            Some(CloneProtocol::Https) | None => repo.remote_url,
        };

        match (repo.id, repo.name, url, repo.default_branch) {
            (Some(id), Some(name), Some(url), Some(default_branch)) => Some(Repository {
                organization: self.credentials.organization.clone(),
                repository: name,
                url,
                branch: default_branch
                    .strip_prefix(BRANCH_REF_PREFIX)
                    .unwrap_or(&default_branch)
                    .to_string(),
                sha: String::new(),
                labels: Vec::new(),
                repository_id: RepositoryId::Text(id),
            }),
            (_, name, _, _) => {
                debug!(
                    "Skipping Azure DevOps repository {:?} with missing id, url or default branch",
                    name
                );
                None
            }
        }
    }
}

/// Decode an Azure DevOps error body; `typeKey` becomes the failure code
fn decode_failure(status: u16, body: &str) -> ApiFailure {
    match serde_json::from_str::<AzureErrorResponse>(body) {
        Ok(error) => ApiFailure::new(
            ScmProviderType::AzureDevOps,
            status,
            error.message.unwrap_or_else(|| http::fallback_message(body)),
        )
        .with_code(error.type_key),
        Err(_) => ApiFailure::new(
            ScmProviderType::AzureDevOps,
            status,
            http::fallback_message(body),
        ),
    }
}

fn is_missing_item(failure: &ApiFailure) -> bool {
    failure.code_is(ITEM_NOT_FOUND)
}

#[async_trait]
impl ScmProvider for AzureDevOpsProvider {
    fn provider_type(&self) -> ScmProviderType {
        ScmProviderType::AzureDevOps
    }

    fn organization(&self) -> &str {
        &self.credentials.organization
    }

    async fn list_repos(
        &self,
        ctx: &CallContext,
        protocol: Option<CloneProtocol>,
    ) -> Result<Vec<Repository>, ScmError> {
        let url = self.git_url("repositories");
        let azure_repos: Vec<AzureRepository> = self.list_all(ctx, &url).await?;
        let total = azure_repos.len();

        let repos: Vec<Repository> = azure_repos
            .into_iter()
            .filter_map(|repo| self.convert_repository(repo, protocol))
            .collect();

        info!(
            "Listed {} Azure DevOps repositories in {}/{} ({} skipped)",
            repos.len(),
            self.credentials.organization,
            self.credentials.project,
            total - repos.len()
        );
        Ok(repos)
    }

    async fn get_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError> {
        let id = Self::repository_guid(repo)?;
        let url = self.git_url(&format!(
            "repositories/{}/stats/branches",
            urlencoding::encode(id)
        ));

        let branches: Vec<AzureBranchStats> = self.list_all(ctx, &url).await?;
        debug!(
            "Found {} branches in Azure DevOps repository {}",
            branches.len(),
            repo.repository
        );

        Ok(branches
            .into_iter()
            .map(|b| repo.with_branch(b.name, b.commit.commit_id))
            .collect())
    }

    async fn repo_has_path(
        &self,
        ctx: &CallContext,
        repo: &Repository,
        path: &str,
    ) -> Result<bool, ScmError> {
        let id = Self::repository_guid(repo)?;
        let url = self.git_url(&format!("repositories/{}/items", urlencoding::encode(id)));
        let query = [
            ("path", format!("/{}", normalize_path(path))),
            ("versionDescriptor.version", repo.branch.clone()),
            ("versionDescriptor.versionType", "branch".to_string()),
        ];

        let lookup = self.api_get(ctx, &url, &query).await.map(|_| ());
        path_lookup_result(lookup, is_missing_item)
    }
}
