use clap::Args;
use scm_providers::CloneProtocol;
use tracing::info;

use super::output::print_repositories;
use super::CommandEnv;

#[derive(Args)]
pub struct ReposCommand {
    /// Clone URL protocol (https, ssh); overrides the config file
    #[arg(long)]
    pub protocol: Option<CloneProtocol>,
}

impl ReposCommand {
    pub fn execute(self, env: &CommandEnv) -> anyhow::Result<()> {
        let protocol = self.protocol.or(env.discovery.clone_protocol);
        info!(
            "Listing {} repositories in {}",
            env.provider.provider_type(),
            env.provider.organization()
        );

        let repos = env.block_on(async {
            Ok::<_, anyhow::Error>(env.provider.list_repos(&env.ctx, protocol).await?)
        })?;

        print_repositories(env.output, &repos)
    }
}
