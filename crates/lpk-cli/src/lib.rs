//! lpk - reproducible serverless function packages
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Builds deployment archives for a function from a project directory.
//! Two builds over the same sources produce byte-identical archives, so the
//! fingerprint printed by `lpk build` only changes when the code or its
//! dependencies do.
//!
//! # Layout
//!
//! ```text
//! <project>/
//! ├── lpk.toml            # optional configuration
//! ├── requirements.txt    # dependency manifest
//! └── dist/               # staging directory, never packaged
//!     ├── requirements.txt
//!     ├── requirements/   # installed dependencies
//!     ├── <name>-lambda.zip
//!     └── <name>-requirements.zip
//! ```

pub mod cmd;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lpk")]
#[command(author, version, about = "lpk - reproducible serverless function packages")]
pub struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the code archive (and layer archive) for a function
    Build(BuildArgs),
    /// Print the content fingerprint of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove the staging directory
    Clean {
        /// Project root
        #[arg(long, default_value = ".")]
        project_root: PathBuf,
        /// Staging directory (defaults to the configured one)
        #[arg(long)]
        staging_dir: Option<PathBuf>,
        /// Show what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Function name, used in archive file names
    pub name: String,

    /// Project root; patterns are relative to it
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Configuration file (default: <project-root>/lpk.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Put dependencies in a separate layer archive
    #[arg(long)]
    pub layer: bool,

    /// Install dependencies inside a container matching the runtime
    #[arg(long)]
    pub dockerize: bool,

    /// Include pattern (repeatable, replaces the configured list)
    #[arg(long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Exclude pattern (repeatable, replaces the configured list)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Requirement to leave out of the deployment (repeatable)
    #[arg(long = "no-deploy", value_name = "NAME")]
    pub no_deploy: Vec<String>,

    /// Dependency manifest, relative to the project root
    #[arg(long)]
    pub requirements: Option<PathBuf>,

    /// Function runtime (selects the build image tag)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Artifact name prefix (e.g. a stack or stage)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Package the install folder as-is instead of installing dependencies
    #[arg(long)]
    pub skip_install: bool,

    /// Print the outputs as JSON
    #[arg(long)]
    pub json: bool,
}
