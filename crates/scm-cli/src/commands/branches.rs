use clap::Args;
use tracing::info;

use super::output::print_repositories;
use super::CommandEnv;

#[derive(Args)]
pub struct BranchesCommand {
    /// Repository name as reported by `repos`
    #[arg(long)]
    pub repository: String,
}

impl BranchesCommand {
    pub fn execute(self, env: &CommandEnv) -> anyhow::Result<()> {
        info!("Listing branches of {}", self.repository);

        let branches = env.block_on(async {
            let repo = env
                .find_repository(&self.repository, env.discovery.clone_protocol)
                .await?;
            Ok::<_, anyhow::Error>(env.provider.get_branches(&env.ctx, &repo).await?)
        })?;

        print_repositories(env.output, &branches)
    }
}
