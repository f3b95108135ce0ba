//! CLI argument definitions for Ordo.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "ordo",
    version,
    about = "Backtracking dependency resolver for Python packages",
    long_about = "Ordo resolves Python requirements against a local package index, \
                  backjumping out of conflicts and printing pins in installation order."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve requirements and print the pins in installation order
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Requirements to resolve (e.g., "requests>=2", "web[fast]")
    #[arg(required = true)]
    pub requirements: Vec<String>,

    /// Package index file (default: nearest ordo-index.toml)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Restrict a project's versions without requiring it
    #[arg(short, long = "constraint")]
    pub constraints: Vec<String>,

    /// Mark a release as installed (e.g., --installed lib==1.0)
    #[arg(long = "installed")]
    pub installed: Vec<String>,

    /// Upgrade strategy: eager, only-if-needed, to-satisfy-only
    #[arg(long)]
    pub upgrade_strategy: Option<String>,

    /// Give up after this many solver rounds
    #[arg(long)]
    pub max_resolution_rounds: Option<usize>,

    /// Pin the requested projects only
    #[arg(long)]
    pub no_deps: bool,

    /// Allow pre-releases
    #[arg(long)]
    pub pre: bool,

    /// Interpreter version for Requires-Python checks
    #[arg(long)]
    pub python_version: Option<String>,

    /// Ignore Requires-Python metadata
    #[arg(long)]
    pub ignore_requires_python: bool,

    /// Skip releases uploaded at or after this ISO 8601 date or datetime
    #[arg(long, visible_alias = "uploaded-prior-to")]
    pub exclude_newer_than: Option<String>,

    /// Config file (default: ~/.ordo/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}
