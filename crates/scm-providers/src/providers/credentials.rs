//! SCM provider credentials
//!
//! One struct per backend, holding the credential and the addressing the
//! provider instance is bound to. `api_url` overrides the public endpoint for
//! self-hosted installations.
//!
//! Secrets default to empty so configuration files can leave them out and have
//! them supplied with [`ScmProviderConfig::set_secret`]; providers reject an
//! empty secret at construction.

use serde::{Deserialize, Serialize};

use super::traits::ScmProviderType;

/// Azure DevOps credentials
///
/// Uses a Personal Access Token with `Code (Read)` scope.
/// Create at: https://dev.azure.com/{organization}/_usersSettings/tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureDevOpsCredentials {
    /// Organization name (the first path segment of dev.azure.com URLs)
    pub organization: String,

    /// Team project the repositories live in
    pub project: String,

    /// Personal Access Token
    #[serde(default)]
    pub access_token: String,

    /// Optional: Azure DevOps Server collection URL (defaults to https://dev.azure.com/{organization})
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// GitHub credentials
///
/// Fine-grained or classic token with `repo` read access on the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCredentials {
    pub organization: String,

    #[serde(default)]
    pub token: String,

    /// Optional: GitHub Enterprise API URL (defaults to https://api.github.com)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// GitLab credentials
///
/// Personal, group or project access token with `read_api` scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabCredentials {
    /// Group full path (e.g. `acme` or `acme/platform`)
    pub group: String,

    #[serde(default)]
    pub token: String,

    /// Optional: self-managed GitLab URL (defaults to https://gitlab.com)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Also list projects of subgroups
    #[serde(default)]
    pub include_subgroups: bool,
}

/// Gitea credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaCredentials {
    /// Organization owning the repositories; user accounts are not listed
    pub owner: String,

    #[serde(default)]
    pub token: String,

    /// Optional: Gitea instance URL (defaults to https://gitea.com)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Bitbucket Cloud credentials
///
/// App password with `Repositories: Read` permission.
/// Create at: https://bitbucket.org/account/settings/app-passwords/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketCredentials {
    pub workspace: String,

    pub username: String,

    #[serde(default)]
    pub app_password: String,

    /// Optional: API URL (defaults to https://api.bitbucket.org/2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Configuration for a single provider instance, tagged by `provider`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ScmProviderConfig {
    #[serde(rename = "azure_devops")]
    AzureDevOps(AzureDevOpsCredentials),
    #[serde(rename = "github")]
    GitHub(GitHubCredentials),
    #[serde(rename = "gitlab")]
    GitLab(GitLabCredentials),
    #[serde(rename = "gitea")]
    Gitea(GiteaCredentials),
    #[serde(rename = "bitbucket")]
    Bitbucket(BitbucketCredentials),
}

impl ScmProviderConfig {
    pub fn provider_type(&self) -> ScmProviderType {
        match self {
            ScmProviderConfig::AzureDevOps(_) => ScmProviderType::AzureDevOps,
            ScmProviderConfig::GitHub(_) => ScmProviderType::GitHub,
            ScmProviderConfig::GitLab(_) => ScmProviderType::GitLab,
            ScmProviderConfig::Gitea(_) => ScmProviderType::Gitea,
            ScmProviderConfig::Bitbucket(_) => ScmProviderType::Bitbucket,
        }
    }

    /// Replace the secret part of the credential (token, PAT or app password)
    pub fn set_secret(&mut self, secret: String) {
        match self {
            ScmProviderConfig::AzureDevOps(c) => c.access_token = secret,
            ScmProviderConfig::GitHub(c) => c.token = secret,
            ScmProviderConfig::GitLab(c) => c.token = secret,
            ScmProviderConfig::Gitea(c) => c.token = secret,
            ScmProviderConfig::Bitbucket(c) => c.app_password = secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_tagged_by_provider() {
        let config: ScmProviderConfig = serde_json::from_value(serde_json::json!({
            "provider": "azure_devops",
            "organization": "contoso",
            "project": "platform",
            "access_token": "pat"
        }))
        .unwrap();

        assert_eq!(config.provider_type(), ScmProviderType::AzureDevOps);
        match config {
            ScmProviderConfig::AzureDevOps(c) => {
                assert_eq!(c.organization, "contoso");
                assert_eq!(c.project, "platform");
                assert!(c.api_url.is_none());
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_gitlab_subgroups_default_off() {
        let config: ScmProviderConfig = serde_json::from_value(serde_json::json!({
            "provider": "gitlab",
            "group": "acme",
            "token": "glpat"
        }))
        .unwrap();

        match config {
            ScmProviderConfig::GitLab(c) => assert!(!c.include_subgroups),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_set_secret() {
        let mut config = ScmProviderConfig::Bitbucket(BitbucketCredentials {
            workspace: "acme".to_string(),
            username: "bot".to_string(),
            app_password: String::new(),
            api_url: None,
        });
        config.set_secret("app-pass".to_string());

        match config {
            ScmProviderConfig::Bitbucket(c) => assert_eq!(c.app_password, "app-pass"),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_secret_may_be_omitted() {
        let config: ScmProviderConfig = serde_json::from_value(serde_json::json!({
            "provider": "github",
            "organization": "acme"
        }))
        .unwrap();

        match config {
            ScmProviderConfig::GitHub(c) => assert!(c.token.is_empty()),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result: Result<ScmProviderConfig, _> = serde_json::from_value(serde_json::json!({
            "provider": "svn",
            "token": "x"
        }));
        assert!(result.is_err());
    }
}
