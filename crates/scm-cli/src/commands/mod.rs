pub mod branches;
pub mod discover;
pub mod has_path;
pub mod output;
pub mod repos;

pub use branches::BranchesCommand;
pub use discover::DiscoverCommand;
pub use has_path::HasPathCommand;
pub use output::OutputFormat;
pub use repos::ReposCommand;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scm_providers::{
    CallContext, CloneProtocol, DiscoveryOptions, Repository, ScmProvider, ScmProviderFactory,
};
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;

/// Settings shared by every subcommand
pub struct CommandEnv {
    pub provider: Arc<dyn ScmProvider>,
    pub discovery: DiscoveryOptions,
    pub ctx: CallContext,
    pub output: OutputFormat,
}

impl CommandEnv {
    pub fn load(
        config_path: &Path,
        token: Option<String>,
        timeout_secs: Option<u64>,
        output: OutputFormat,
    ) -> anyhow::Result<Self> {
        let config = DiscoveryConfig::load(config_path, token)?;
        debug!(
            "Loaded {} configuration from {}",
            config.scm.provider_type(),
            config_path.display()
        );

        let provider = ScmProviderFactory::create_provider(config.scm)?;

        let mut ctx = CallContext::new();
        if let Some(secs) = timeout_secs {
            ctx = ctx.with_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            provider,
            discovery: config.discovery,
            ctx,
            output,
        })
    }

    /// Run `work` to completion on a fresh runtime. Ctrl-C cancels the
    /// command's [`CallContext`].
    pub fn block_on<F, T>(&self, work: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let rt = tokio::runtime::Runtime::new()?;
        let token = self.ctx.cancellation_token().clone();

        rt.block_on(async move {
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Received Ctrl+C, cancelling in-flight requests");
                    token.cancel();
                }
            });
            let result = work.await;
            watcher.abort();
            result
        })
    }

    /// Look up a repository by name in the provider listing
    pub async fn find_repository(
        &self,
        name: &str,
        protocol: Option<CloneProtocol>,
    ) -> anyhow::Result<Repository> {
        let repos = self.provider.list_repos(&self.ctx, protocol).await?;
        repos
            .into_iter()
            .find(|r| r.repository == name)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Repository '{}' not found in {}",
                    name,
                    self.provider.organization()
                )
            })
    }
}
