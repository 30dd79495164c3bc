//! SCM provider implementations
//!
//! This module contains the provider trait definitions and one implementation
//! per hosting backend: Azure DevOps, GitHub, GitLab, Gitea and Bitbucket.

pub mod azure_devops;
pub mod bitbucket;
pub mod credentials;
pub mod factory;
pub mod gitea;
pub mod github;
pub mod gitlab;
pub(crate) mod http;
pub mod traits;

// Re-export commonly used types
pub use azure_devops::AzureDevOpsProvider;
pub use bitbucket::BitbucketProvider;
pub use credentials::{
    AzureDevOpsCredentials, BitbucketCredentials, GitHubCredentials, GitLabCredentials,
    GiteaCredentials, ScmProviderConfig,
};
pub use factory::ScmProviderFactory;
pub use gitea::GiteaProvider;
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use traits::{
    normalize_path, CloneProtocol, Repository, RepositoryId, ScmProvider, ScmProviderType,
};
