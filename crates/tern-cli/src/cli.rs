//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tern_core::{Scope, UnitId};

/// Tern - ordered, transactional SQL schema migrations
#[derive(Parser, Debug)]
#[command(name = "tern")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Named target from the config's `targets` section
    #[arg(short, long, global = true, env = "TERN_TARGET")]
    pub target: Option<String>,

    /// Override the database path (`:memory:` or a file)
    #[arg(long, global = true, env = "TERN_DATABASE")]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Up(UpArgs),

    /// Revert applied migrations (one by default)
    Down(DownArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Create a new migration
    New(NewArgs),
}

/// Arguments for the up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Apply at most N migrations
    #[arg(short = 'n', long, conflicts_with = "to")]
    pub count: Option<usize>,

    /// Apply pending migrations up to and including this id
    #[arg(long)]
    pub to: Option<UnitId>,

    /// Only consider migrations in this scope and below
    #[arg(short, long)]
    pub scope: Option<Scope>,
}

/// Arguments for the down command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Revert at most N migrations
    #[arg(short = 'n', long, conflicts_with_all = ["to", "all"])]
    pub count: Option<usize>,

    /// Revert applied migrations down to and including this id
    #[arg(long, conflicts_with = "all")]
    pub to: Option<UnitId>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,

    /// Only consider migrations in this scope and below
    #[arg(short, long)]
    pub scope: Option<Scope>,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show migrations in this scope and below
    #[arg(short, long)]
    pub scope: Option<Scope>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Output formats for listing commands
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// JSON array
    Json,
}

/// Arguments for the new command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Migration name; free text is turned into a slug
    pub name: String,

    /// Scope (subdirectory) to create the migration in
    #[arg(short, long)]
    pub scope: Option<Scope>,

    /// Write separate .up.sql and .down.sql files
    #[arg(long)]
    pub pair: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
