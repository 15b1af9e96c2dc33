use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod constraint;
mod domain;
mod error;
mod memory;
mod output;
mod plan;
mod proposal;
mod provider;
mod reasoning;
mod resolver;
mod runner;
mod safety;
mod state;
mod workflow;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("wellsync=debug")
    } else {
        EnvFilter::new("wellsync=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Replay(args) => cli::replay::execute(args).await,
        Commands::Schema(args) => cli::schema::execute(args),
    }
}
