use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "pastedown")]
#[command(about = "Parse a pasted LLM reply into validated file operations and land them atomically")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a response and apply its operations to the workspace
    Apply(ApplyArgs),

    /// Show recovered operations and line counts without touching disk
    Preview(PreviewArgs),

    /// Initialize a pastedown.toml config file
    Init(InitArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Response text file to parse
    #[arg(short, long)]
    pub response_file: Option<PathBuf>,

    /// Read the response from the system clipboard instead
    #[arg(long)]
    pub from_clipboard: bool,

    /// Workspace root the operations apply to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Write changes to disk (default shows a preview only)
    #[arg(long)]
    pub yes: bool,

    /// Apply file chains one at a time instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Disable basename/suffix repair of stale patch paths
    #[arg(long)]
    pub no_fuzzy: bool,

    /// Emit a JSON report
    #[arg(long)]
    pub json: bool,

    /// Show per-operation detail
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct PreviewArgs {
    /// Response text file to parse
    #[arg(short, long)]
    pub response_file: Option<PathBuf>,

    /// Read the response from the system clipboard instead
    #[arg(long)]
    pub from_clipboard: bool,

    /// Workspace root the operations apply to
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Disable basename/suffix repair of stale patch paths
    #[arg(long)]
    pub no_fuzzy: bool,

    /// Emit a JSON report
    #[arg(long)]
    pub json: bool,

    /// Show per-operation detail
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to place the config file in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
