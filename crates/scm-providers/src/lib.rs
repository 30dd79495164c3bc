//! SCM repository discovery
//!
//! This crate discovers repositories and branches across source-control
//! hosting platforms behind one uniform contract, so that downstream
//! generators can enumerate and filter them without knowing which backend
//! answered.
//!
//! # Supported Providers
//!
//! - **Azure DevOps**: Services and Server, Personal Access Token
//! - **GitHub**: github.com and GitHub Enterprise
//! - **GitLab**: gitlab.com and self-managed, optionally including subgroups
//! - **Gitea**: any Gitea instance
//! - **Bitbucket**: Bitbucket Cloud with app passwords
//!
//! # Not-found semantics
//!
//! [`ScmProvider::repo_has_path`] returns `Ok(false)` only when the backend
//! confirms that the path itself is absent. A missing repository, a missing
//! branch, revoked credentials or a transport failure are errors, so a
//! `paths_do_not_exist` filter never matches on the strength of a broken
//! reference.
//!
//! # Usage
//!
//! ```ignore
//! use scm_providers::{CallContext, ScmProviderConfig, ScmProviderFactory};
//!
//! let provider = ScmProviderFactory::create_provider(config)?;
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(60));
//!
//! for repo in provider.list_repos(&ctx, None).await? {
//!     if provider.repo_has_path(&ctx, &repo, "Chart.yaml").await? {
//!         println!("{} has a chart", repo.repository);
//!     }
//! }
//! ```

pub mod context;
pub mod errors;
pub mod providers;
pub mod services;

// Re-export main types
pub use context::CallContext;
pub use errors::{ApiFailure, ScmError};
pub use providers::{
    normalize_path, AzureDevOpsCredentials, AzureDevOpsProvider, BitbucketCredentials,
    BitbucketProvider, CloneProtocol, GitHubCredentials, GitHubProvider, GitLabCredentials,
    GitLabProvider, GiteaCredentials, GiteaProvider, Repository, RepositoryId, ScmProvider,
    ScmProviderConfig, ScmProviderFactory, ScmProviderType,
};
pub use services::{DiscoveryFilter, DiscoveryOptions, DiscoveryService};
