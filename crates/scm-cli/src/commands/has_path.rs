use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use super::{CommandEnv, OutputFormat};

#[derive(Args)]
pub struct HasPathCommand {
    /// Repository name as reported by `repos`
    #[arg(long)]
    pub repository: String,

    /// File or directory path, relative to the repository root
    #[arg(long)]
    pub path: String,

    /// Branch to look on; the default branch when omitted
    #[arg(long)]
    pub branch: Option<String>,
}

#[derive(Serialize)]
struct PathCheck<'a> {
    repository: &'a str,
    branch: &'a str,
    path: &'a str,
    exists: bool,
}

impl HasPathCommand {
    pub fn execute(self, env: &CommandEnv) -> anyhow::Result<()> {
        let (branch, exists) = env.block_on(async {
            let repo = env
                .find_repository(&self.repository, env.discovery.clone_protocol)
                .await?;

            let repo = match &self.branch {
                Some(branch) if *branch != repo.branch => env
                    .provider
                    .get_branches(&env.ctx, &repo)
                    .await?
                    .into_iter()
                    .find(|b| &b.branch == branch)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "Branch '{}' not found in {}",
                            branch,
                            self.repository
                        )
                    })?,
                _ => repo,
            };

            info!(
                "Checking {} on {}@{}",
                self.path, repo.repository, repo.branch
            );
            let exists = env
                .provider
                .repo_has_path(&env.ctx, &repo, &self.path)
                .await?;
            Ok::<_, anyhow::Error>((repo.branch, exists))
        })?;

        match env.output {
            OutputFormat::Json => {
                let check = PathCheck {
                    repository: &self.repository,
                    branch: &branch,
                    path: &self.path,
                    exists,
                };
                println!("{}", serde_json::to_string_pretty(&check)?);
            }
            OutputFormat::Table => {
                let verdict = if exists {
                    "exists".bright_green()
                } else {
                    "missing".bright_red()
                };
                println!(
                    "{}@{}:{} {}",
                    self.repository,
                    branch,
                    self.path,
                    verdict
                );
            }
        }
        Ok(())
    }
}
