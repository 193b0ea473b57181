mod config;
mod deploy_cmd;
mod deployments_cmd;
mod init_cmd;
mod lint_cmd;
mod run_cmd;
mod runs_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use datapipe_logging::{init_logger, LogOptions};

#[derive(Parser)]
#[command(name = "datapipe")]
#[command(about = "datapipe: run and schedule a sequence of scripts with retries")]
#[command(version)]
struct Cli {
    /// Config file (default: $DATAPIPE_CONFIG_DIR/datapipe.yaml or ~/.datapipe/datapipe.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and activate the scheduled deployment (default)
    Deploy,
    /// Run the pipeline once, now
    Run {
        /// Run the pipeline stored for this deployment instead of the configured one
        #[arg(long)]
        deployment: Option<String>,
    },
    /// Show recent pipeline runs
    Runs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Delete runs older than this many days before listing
        #[arg(long)]
        prune_days: Option<u32>,
    },
    /// List registered deployments and their next fire time
    Deployments,
    /// Check that every CI workflow file parses as YAML
    LintWorkflows {
        #[arg(long, default_value = lint_cmd::DEFAULT_WORKFLOWS_DIR)]
        dir: PathBuf,
    },
    /// Write a config file with the default pipeline
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config::resolve_config_path(cli.config);

    match cli.command.unwrap_or(Commands::Deploy) {
        Commands::Init => {
            init_logger(LogOptions::default())?;
            init_cmd::run(&config_path).await
        }
        Commands::LintWorkflows { dir } => {
            init_logger(LogOptions::default())?;
            lint_cmd::run(&dir)
        }
        Commands::Deploy => deploy_cmd::run(&config::load(&config_path).await?).await,
        Commands::Run { deployment } => {
            let cfg = config::load(&config_path).await?;
            run_cmd::run(&cfg, deployment.as_deref()).await
        }
        Commands::Runs { limit, prune_days } => {
            runs_cmd::run(&config::load(&config_path).await?, limit, prune_days)
        }
        Commands::Deployments => deployments_cmd::run(&config::load(&config_path).await?),
    }
}
