//! lpk - reproducible serverless function packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use lpk_cli::{Cli, Commands, cmd};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for results
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => cmd::build::build(&args),
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Clean {
            project_root,
            staging_dir,
            dry_run,
        } => cmd::clean::clean(&project_root, staging_dir.as_deref(), dry_run),
    }
}
