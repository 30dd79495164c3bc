use std::sync::Arc;

use super::azure_devops::AzureDevOpsProvider;
use super::bitbucket::BitbucketProvider;
use super::credentials::ScmProviderConfig;
use super::gitea::GiteaProvider;
use super::github::GitHubProvider;
use super::gitlab::GitLabProvider;
use super::traits::ScmProvider;
use crate::errors::ScmError;

/// Factory for creating provider instances
pub struct ScmProviderFactory;

impl ScmProviderFactory {
    /// Build the provider matching `config`. Credentials are validated here so
    /// a misconfigured provider never reaches the network.
    pub fn create_provider(config: ScmProviderConfig) -> Result<Arc<dyn ScmProvider>, ScmError> {
        let provider: Arc<dyn ScmProvider> = match config {
            ScmProviderConfig::AzureDevOps(credentials) => {
                Arc::new(AzureDevOpsProvider::new(credentials)?)
            }
            ScmProviderConfig::GitHub(credentials) => Arc::new(GitHubProvider::new(credentials)?),
            ScmProviderConfig::GitLab(credentials) => Arc::new(GitLabProvider::new(credentials)?),
            ScmProviderConfig::Gitea(credentials) => Arc::new(GiteaProvider::new(credentials)?),
            ScmProviderConfig::Bitbucket(credentials) => {
                Arc::new(BitbucketProvider::new(credentials)?)
            }
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::credentials::{GitHubCredentials, GitLabCredentials};
    use crate::providers::traits::ScmProviderType;

    #[test]
    fn test_create_provider_reports_type_and_organization() {
        let provider = ScmProviderFactory::create_provider(ScmProviderConfig::GitLab(
            GitLabCredentials {
                group: "acme/platform".to_string(),
                token: "glpat".to_string(),
                api_url: None,
                include_subgroups: true,
            },
        ))
        .unwrap();

        assert_eq!(provider.provider_type(), ScmProviderType::GitLab);
        assert_eq!(provider.organization(), "acme/platform");
    }

    #[test]
    fn test_create_provider_validates_credentials() {
        let result = ScmProviderFactory::create_provider(ScmProviderConfig::GitHub(
            GitHubCredentials {
                organization: String::new(),
                token: "ghp".to_string(),
                api_url: None,
            },
        ));
        assert!(matches!(result, Err(ScmError::InvalidConfiguration(_))));
    }
}
