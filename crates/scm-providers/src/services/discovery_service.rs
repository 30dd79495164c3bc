//! Repository and branch discovery with filters
//!
//! Drives one provider through the generator pipeline: list repositories,
//! drop the ones no filter can match, expand the survivors into branches and
//! keep the branch entries that match at least one filter completely.
//!
//! Filters are OR'd with each other; the criteria inside one filter are AND'd.

use std::sync::Arc;

use futures::future::try_join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::context::CallContext;
use crate::errors::ScmError;
use crate::providers::{CloneProtocol, Repository, ScmProvider};

const DEFAULT_PATH_CHECK_CONCURRENCY: usize = 8;

/// One filter entry. Unset criteria always match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFilter {
    /// Regex matched against the repository name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_match: Option<String>,

    /// Regex matched against each label; one matching label is enough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_match: Option<String>,

    /// Regex matched against the branch name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_match: Option<String>,

    /// Paths that must all exist on the branch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_exist: Vec<String>,

    /// Paths that must all be absent from the branch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_do_not_exist: Vec<String>,
}

fn default_path_check_concurrency() -> usize {
    DEFAULT_PATH_CHECK_CONCURRENCY
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Expand every branch instead of only the default branch
    #[serde(default)]
    pub all_branches: bool,

    /// Clone URL form; the backend default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_protocol: Option<CloneProtocol>,

    #[serde(default)]
    pub filters: Vec<DiscoveryFilter>,

    /// Branch entries evaluated concurrently
    #[serde(default = "default_path_check_concurrency")]
    pub path_check_concurrency: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            all_branches: false,
            clone_protocol: None,
            filters: Vec::new(),
            path_check_concurrency: DEFAULT_PATH_CHECK_CONCURRENCY,
        }
    }
}

#[derive(Debug)]
struct CompiledFilter {
    repository_match: Option<Regex>,
    label_match: Option<Regex>,
    branch_match: Option<Regex>,
    paths_exist: Vec<String>,
    paths_do_not_exist: Vec<String>,
}

fn compile_regex(field: &str, pattern: Option<&str>) -> Result<Option<Regex>, ScmError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| {
                ScmError::InvalidConfiguration(format!("Invalid {} '{}': {}", field, p, e))
            })
        })
        .transpose()
}

impl CompiledFilter {
    fn compile(filter: &DiscoveryFilter) -> Result<Self, ScmError> {
        Ok(Self {
            repository_match: compile_regex(
                "repository_match",
                filter.repository_match.as_deref(),
            )?,
            label_match: compile_regex("label_match", filter.label_match.as_deref())?,
            branch_match: compile_regex("branch_match", filter.branch_match.as_deref())?,
            paths_exist: filter.paths_exist.clone(),
            paths_do_not_exist: filter.paths_do_not_exist.clone(),
        })
    }

    /// Criteria decidable from the repository listing alone
    fn matches_repository(&self, repo: &Repository) -> bool {
        if let Some(re) = &self.repository_match {
            if !re.is_match(&repo.repository) {
                return false;
            }
        }
        if let Some(re) = &self.label_match {
            if !repo.labels.iter().any(|label| re.is_match(label)) {
                return false;
            }
        }
        true
    }

    fn matches_branch(&self, repo: &Repository) -> bool {
        self.branch_match
            .as_ref()
            .map_or(true, |re| re.is_match(&repo.branch))
    }
}

/// Generator-facing discovery over one provider
pub struct DiscoveryService {
    provider: Arc<dyn ScmProvider>,
    options: DiscoveryOptions,
    filters: Vec<CompiledFilter>,
}

impl DiscoveryService {
    /// Compile the filters once. An invalid regex is a configuration error.
    pub fn new(
        provider: Arc<dyn ScmProvider>,
        options: DiscoveryOptions,
    ) -> Result<Self, ScmError> {
        let filters = options
            .filters
            .iter()
            .map(CompiledFilter::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            provider,
            options,
            filters,
        })
    }

    /// Run the whole pipeline. Any provider error aborts discovery.
    pub async fn discover(&self, ctx: &CallContext) -> Result<Vec<Repository>, ScmError> {
        let repos = self
            .provider
            .list_repos(ctx, self.options.clone_protocol)
            .await?;
        let listed = repos.len();

        let candidates: Vec<Repository> = repos
            .into_iter()
            .filter(|repo| self.prefilter(repo))
            .collect();

        debug!(
            "{} of {} repositories passed the repository filters",
            candidates.len(),
            listed
        );

        let mut entries = Vec::new();
        for repo in &candidates {
            entries.extend(self.expand_branches(ctx, repo).await?);
        }

        // Run checks concurrently with a limit; the first error drops the rest
        let semaphore = Semaphore::new(self.options.path_check_concurrency.max(1));
        let checks = entries.into_iter().map(|entry| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| ScmError::Cancelled)?;
                let keep = self.matches(ctx, &entry).await?;
                Ok::<_, ScmError>(keep.then_some(entry))
            }
        });
        let kept = try_join_all(checks).await?;

        let results: Vec<Repository> = kept.into_iter().flatten().collect();
        info!(
            "Discovered {} entries in {} ({} repositories listed)",
            results.len(),
            self.provider.organization(),
            listed
        );
        Ok(results)
    }

    /// Whether any filter could still match `repo`
    fn prefilter(&self, repo: &Repository) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches_repository(repo))
    }

    /// Branch entries for `repo`: all of them, or only the default branch.
    async fn expand_branches(
        &self,
        ctx: &CallContext,
        repo: &Repository,
    ) -> Result<Vec<Repository>, ScmError> {
        let branches = self.provider.get_branches(ctx, repo).await?;
        if self.options.all_branches {
            return Ok(branches);
        }

        let default_branch = branches
            .into_iter()
            .find(|b| b.branch == repo.branch)
            .unwrap_or_else(|| {
                debug!(
                    "Default branch {} of {} not in branch listing",
                    repo.branch, repo.repository
                );
                repo.clone()
            });
        Ok(vec![default_branch])
    }

    /// Whether at least one filter matches `entry` completely
    async fn matches(&self, ctx: &CallContext, entry: &Repository) -> Result<bool, ScmError> {
        if self.filters.is_empty() {
            return Ok(true);
        }

        for filter in &self.filters {
            if !filter.matches_repository(entry) || !filter.matches_branch(entry) {
                continue;
            }
            if self.paths_match(ctx, filter, entry).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn paths_match(
        &self,
        ctx: &CallContext,
        filter: &CompiledFilter,
        entry: &Repository,
    ) -> Result<bool, ScmError> {
        for path in &filter.paths_exist {
            if !self.provider.repo_has_path(ctx, entry, path).await? {
                debug!(
                    "{}@{} lacks required path {}",
                    entry.repository, entry.branch, path
                );
                return Ok(false);
            }
        }
        for path in &filter.paths_do_not_exist {
            if self.provider.repo_has_path(ctx, entry, path).await? {
                debug!(
                    "{}@{} has excluded path {}",
                    entry.repository, entry.branch, path
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}
