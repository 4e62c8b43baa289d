//! **pastedown** - Land LLM-suggested code changes from a pasted response
//!
//! Parses free-form model output into a validated set of file operations
//! (write/delete/rename across three patch dialects) and applies them to an
//! in-memory snapshot of the workspace, atomically from the caller's view.

/// Command-line interface with clap integration
pub mod cli;

/// Core engine - parsing, planning, and application pipeline
pub mod core {
    /// Boundary types: operation algebra, control metadata, snapshots
    pub mod schema;
    pub use schema::{
        ApplyError, ControlBlock, FileOperation, ParsedResponse, PatchDialect, SchemaError,
        Snapshot,
    };

    /// Response parsing: control-block extraction, fenced-block scanning,
    /// and operation classification
    pub mod response;
    pub use response::{extract_control, parse_response, scan_blocks};

    /// Operation planning: rename execution, path aliasing, fuzzy repair
    pub mod plan;
    pub use plan::{Plan, plan_operations};

    /// Per-file patch application with optional parallelism
    pub mod apply;
    pub use apply::{ApplyOptions, apply_operations, apply_with_options};

    /// Patch dialect engines: unified diff and search/replace blocks
    pub mod patch;
    pub use patch::{DiffError, apply_search_replace, apply_standard_diff};

    /// LCS-based per-file add/remove accounting
    pub mod lines;
    pub use lines::{LineDelta, line_changes};
}

/// Infrastructure - Configuration, I/O, and logging
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Tracing subscriber setup for the binary
    pub mod logging;

    /// Gitignore-aware workspace snapshot builder
    pub mod walk;
    pub use walk::snapshot_from_dir;

    /// Atomic snapshot write-back
    pub mod io;
    pub use io::{CommitReport, commit_snapshot};
}

// Strategic re-exports for clean external use
pub use cli::{AppContext, Cli, Commands};
pub use core::{
    ApplyError, ControlBlock, FileOperation, LineDelta, ParsedResponse, PatchDialect, Snapshot,
    apply_operations, line_changes, parse_response,
};
pub use infra::{Config, load_config};
