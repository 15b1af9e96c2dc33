pub mod replay;
pub mod run;
pub mod schema;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "wellsync")]
#[command(
    author,
    version,
    about = "Coordinates sleep, nutrition, fitness and mental-wellness reasoners into one safe plan"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one planning session and write the plan report
    Run(RunArgs),

    /// Print every stored record of a session in append order
    Replay(ReplayArgs),

    /// Print JSON Schema for config validation
    Schema(SchemaArgs),
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "wellsync.yaml", env = "WELLSYNC_CONFIG")]
    pub config: PathBuf,

    /// User profile and recent data (YAML or JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Show the execution plan without reasoning calls
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone)]
pub struct ReplayArgs {
    /// Durable store directory
    #[arg(long, default_value = ".wellsync/store", env = "WELLSYNC_STORE")]
    pub store: PathBuf,

    /// Session to replay
    #[arg(value_name = "SESSION_ID")]
    pub session_id: Uuid,
}

#[derive(Parser, Clone)]
pub struct SchemaArgs {
    /// Write the schema to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
