use clap::Args;
use scm_providers::DiscoveryService;
use tracing::info;

use super::output::print_repositories;
use super::CommandEnv;

#[derive(Args)]
pub struct DiscoverCommand {
    /// Expand every branch, not only the default branch
    #[arg(long)]
    pub all_branches: bool,

    /// Branch entries checked concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl DiscoverCommand {
    pub fn execute(self, env: &CommandEnv) -> anyhow::Result<()> {
        let mut options = env.discovery.clone();
        options.all_branches |= self.all_branches;
        if let Some(concurrency) = self.concurrency {
            options.path_check_concurrency = concurrency;
        }

        info!(
            "Discovering in {} with {} filter(s), all_branches={}",
            env.provider.organization(),
            options.filters.len(),
            options.all_branches
        );

        let service = DiscoveryService::new(env.provider.clone(), options)?;
        let results = env.block_on(async {
            Ok::<_, anyhow::Error>(service.discover(&env.ctx).await?)
        })?;

        print_repositories(env.output, &results)
    }
}
