//! Discovery configuration file
//!
//! ```yaml
//! scm:
//!   provider: gitlab
//!   group: acme
//!   include_subgroups: true
//! discovery:
//!   all_branches: false
//!   clone_protocol: ssh
//!   filters:
//!     - repository_match: "^svc-"
//!       paths_exist: [Chart.yaml]
//! ```
//!
//! The secret may be left out of the file and passed with `--token` or
//! `SCM_TOKEN` instead.

use std::path::Path;

use anyhow::Context;
use scm_providers::{DiscoveryOptions, ScmProviderConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Provider selection and credentials
    pub scm: ScmProviderConfig,

    #[serde(default)]
    pub discovery: DiscoveryOptions,
}

impl DiscoveryConfig {
    pub fn load(path: &Path, token: Option<String>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw, token)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(raw: &str, token: Option<String>) -> anyhow::Result<Self> {
        let mut config: DiscoveryConfig = serde_yaml::from_str(raw)?;
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            config.scm.set_secret(token);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scm_providers::{CloneProtocol, ScmProviderType};
    use std::io::Write;

    const GITLAB_CONFIG: &str = r#"
scm:
  provider: gitlab
  group: acme
  token: from-file
  include_subgroups: true
discovery:
  all_branches: true
  clone_protocol: ssh
  filters:
    - repository_match: "^svc-"
      paths_exist:
        - Chart.yaml
    - label_match: deploy
"#;

    #[test]
    fn test_parse_full_config() {
        let config = DiscoveryConfig::parse(GITLAB_CONFIG, None).unwrap();

        assert_eq!(config.scm.provider_type(), ScmProviderType::GitLab);
        assert!(config.discovery.all_branches);
        assert_eq!(config.discovery.clone_protocol, Some(CloneProtocol::Ssh));
        assert_eq!(config.discovery.filters.len(), 2);
        assert_eq!(
            config.discovery.filters[0].repository_match.as_deref(),
            Some("^svc-")
        );
        assert_eq!(
            config.discovery.filters[1].label_match.as_deref(),
            Some("deploy")
        );

        match config.scm {
            ScmProviderConfig::GitLab(c) => {
                assert!(c.include_subgroups);
                assert_eq!(c.token, "from-file");
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_token_override() {
        let config = DiscoveryConfig::parse(GITLAB_CONFIG, Some("from-env".to_string())).unwrap();
        match config.scm {
            ScmProviderConfig::GitLab(c) => assert_eq!(c.token, "from-env"),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_discovery_section_is_optional() {
        let raw = "scm:\n  provider: azure_devops\n  organization: contoso\n  project: platform\n";
        let config = DiscoveryConfig::parse(raw, Some("pat".to_string())).unwrap();

        assert_eq!(config.scm.provider_type(), ScmProviderType::AzureDevOps);
        assert!(!config.discovery.all_branches);
        assert!(config.discovery.filters.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GITLAB_CONFIG.as_bytes()).unwrap();

        let config = DiscoveryConfig::load(file.path(), None).unwrap();
        assert_eq!(config.scm.provider_type(), ScmProviderType::GitLab);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = DiscoveryConfig::load(&path, None).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let raw = "scm:\n  provider: svn\n  token: x\n";
        assert!(DiscoveryConfig::parse(raw, None).is_err());
    }
}
