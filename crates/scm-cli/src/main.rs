//! scm-discover - repository and branch discovery across SCM hosting platforms
//!
//! Loads a provider configuration file and runs one discovery operation
//! against it: list repositories, list branches, check a path, or run the
//! filtered discovery pipeline.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{
    BranchesCommand, CommandEnv, DiscoverCommand, HasPathCommand, OutputFormat, ReposCommand,
};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Discovery configuration file (YAML)
    #[arg(
        long,
        short,
        default_value = "scm-discover.yaml",
        env = "SCM_CONFIG",
        global = true
    )]
    config: PathBuf,

    /// Credential secret (token, PAT or app password); overrides the config file
    #[arg(long, env = "SCM_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Abort backend calls after this many seconds
    #[arg(long, env = "SCM_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SCM_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "SCM_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories visible to the credential
    Repos(ReposCommand),
    /// List the branches of one repository
    Branches(BranchesCommand),
    /// Check whether a path exists on a branch
    HasPath(HasPathCommand),
    /// Run filtered discovery from the config file
    Discover(DiscoverCommand),
}

fn init_logging(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "scm_discover={level},\
             scm_providers={level},\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = log_level
        ))
    };

    // Logs go to stderr so stdout stays machine-readable
    let fmt_layer = match log_format {
        "full" => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format)?;

    let env = CommandEnv::load(&cli.config, cli.token, cli.timeout_secs, cli.output)?;

    match cli.command {
        Commands::Repos(cmd) => cmd.execute(&env),
        Commands::Branches(cmd) => cmd.execute(&env),
        Commands::HasPath(cmd) => cmd.execute(&env),
        Commands::Discover(cmd) => cmd.execute(&env),
    }
}
