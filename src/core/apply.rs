//! Per-file patch application
//!
//! Consumes the planner's per-path op chains and produces the new
//! snapshot. Chains for independent files run in parallel when enabled;
//! the planner guarantees no two chains share a final path, and the
//! dialect engines are pure. On any error the input snapshot is
//! untouched and no partial result escapes to the caller.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{AppContext, ApplyArgs, PreviewArgs};
use crate::core::lines::{LineDelta, line_changes};
use crate::core::patch::{apply_search_replace, apply_standard_diff};
use crate::core::plan::plan_operations;
use crate::core::response::parse_response;
use crate::core::schema::{ApplyError, FileOperation, ParsedResponse, PatchDialect, Snapshot};
use crate::infra::config::load_config;
use crate::infra::io::commit_snapshot;
use crate::infra::walk::snapshot_from_dir;

/// Engine knobs, filled from config and CLI flags
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    pub fuzzy_repair: bool,
    pub parallel: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            fuzzy_repair: true,
            parallel: true,
        }
    }
}

/// Apply a parsed operation list to a snapshot, returning the new one.
/// The input snapshot is never mutated.
pub fn apply_operations(
    ops: &[FileOperation],
    originals: &Snapshot,
) -> Result<Snapshot, ApplyError> {
    apply_with_options(ops, originals, ApplyOptions::default())
}

pub fn apply_with_options(
    ops: &[FileOperation],
    originals: &Snapshot,
    options: ApplyOptions,
) -> Result<Snapshot, ApplyError> {
    let plan = plan_operations(ops, originals, options.fuzzy_repair)?;
    let mut snapshot = plan.snapshot;

    let chains: Vec<(String, Vec<FileOperation>, Option<String>)> = plan
        .groups
        .into_iter()
        .map(|(path, chain)| {
            let initial = snapshot.get(&path).cloned().flatten();
            (path, chain, initial)
        })
        .collect();

    let results: Vec<(String, Result<Option<String>, ApplyError>)> =
        if options.parallel && chains.len() > 1 {
            chains
                .into_par_iter()
                .map(|(path, chain, initial)| {
                    let outcome = apply_chain(&path, initial, &chain);
                    (path, outcome)
                })
                .collect()
        } else {
            chains
                .into_iter()
                .map(|(path, chain, initial)| {
                    let outcome = apply_chain(&path, initial, &chain);
                    (path, outcome)
                })
                .collect()
        };

    // Commit in group order; the first failing chain aborts the whole call
    for (path, outcome) in results {
        snapshot.insert(path, outcome?);
    }

    Ok(snapshot)
}

/// Run one file's op chain from its initial state to a final state.
fn apply_chain(
    path: &str,
    initial: Option<String>,
    chain: &[FileOperation],
) -> Result<Option<String>, ApplyError> {
    let mut current = initial;

    for op in chain {
        match op {
            FileOperation::Delete { .. } => {
                if current.is_none() {
                    return Err(ApplyError::CannotDeleteMissing {
                        path: path.to_string(),
                    });
                }
                current = None;
            }

            FileOperation::Write {
                content, dialect, ..
            } => match dialect {
                PatchDialect::Replace => current = Some(content.clone()),

                PatchDialect::StandardDiff => {
                    let base = current.as_deref().unwrap_or("");
                    let patched = apply_standard_diff(base, content).map_err(|e| {
                        ApplyError::PatchFailed {
                            path: path.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    current = Some(patched);
                }

                PatchDialect::SearchReplace => {
                    let Some(base) = current.as_deref() else {
                        return Err(ApplyError::SearchReplaceOnNewFile {
                            path: path.to_string(),
                        });
                    };
                    let patched = apply_search_replace(base, content).map_err(|e| {
                        ApplyError::PatchFailed {
                            path: path.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    current = Some(patched);
                }
            },

            FileOperation::Rename { .. } => {
                debug!(path, "rename reached an op chain; planner should have consumed it");
            }
        }
    }

    Ok(current)
}

/// One row of the per-operation report
#[derive(Debug, Serialize)]
struct OpReport {
    op: String,
    path: String,
    #[serde(flatten)]
    delta: LineDelta,
}

#[derive(Debug, Serialize)]
struct RunReport {
    project_id: String,
    uuid: String,
    applied: bool,
    operations: Vec<OpReport>,
}

/// Parse a response and land its operations on the workspace.
/// Safe default: without `--yes` this behaves as a preview.
pub fn apply_run(args: ApplyArgs, ctx: &AppContext) -> Result<()> {
    let raw = read_response_input(args.response_file.as_deref(), args.from_clipboard)?;
    let parsed = parse_response(&raw)
        .context("response contained no control block or no valid operations")?;

    let config = load_config()?;
    let options = ApplyOptions {
        fuzzy_repair: config.fuzzy_repair && !args.no_fuzzy,
        parallel: config.parallel && !args.sequential,
    };

    let originals = snapshot_from_dir(&args.root, &config.ignore_patterns)?;
    let updated = apply_with_options(&parsed.operations, &originals, options)?;

    let write_changes = args.yes && !ctx.dry_run;
    if !write_changes && !ctx.quiet {
        eprintln!("Safety mode: showing preview only. Use --yes to write changes.");
    }

    let report = build_report(&parsed, &originals, &updated, write_changes);

    if write_changes {
        let commit = commit_snapshot(&args.root, &originals, &updated)?;
        info!(
            written = commit.written.len(),
            removed = commit.removed.len(),
            "workspace updated"
        );
    }

    render_report(&report, args.json, args.verbose, ctx)
}

/// Parse a response and show what it would do, never touching disk.
pub fn preview_run(args: PreviewArgs, ctx: &AppContext) -> Result<()> {
    let raw = read_response_input(args.response_file.as_deref(), args.from_clipboard)?;
    let parsed = parse_response(&raw)
        .context("response contained no control block or no valid operations")?;

    let config = load_config()?;
    let options = ApplyOptions {
        fuzzy_repair: config.fuzzy_repair && !args.no_fuzzy,
        parallel: config.parallel,
    };

    let originals = snapshot_from_dir(&args.root, &config.ignore_patterns)?;
    let updated = apply_with_options(&parsed.operations, &originals, options)?;

    let report = build_report(&parsed, &originals, &updated, false);
    render_report(&report, args.json, args.verbose, ctx)
}

fn build_report(
    parsed: &ParsedResponse,
    originals: &Snapshot,
    updated: &Snapshot,
    applied: bool,
) -> RunReport {
    let operations = parsed
        .operations
        .iter()
        .map(|op| {
            let (kind, path) = match op {
                FileOperation::Write { path, .. } => ("write", path.clone()),
                FileOperation::Delete { path } => ("delete", path.clone()),
                FileOperation::Rename { from, to } => ("rename", format!("{from} -> {to}")),
            };
            OpReport {
                op: kind.to_string(),
                path,
                delta: line_changes(op, originals, updated),
            }
        })
        .collect();

    RunReport {
        project_id: parsed.control.project_id.clone(),
        uuid: parsed.control.uuid.clone(),
        applied,
        operations,
    }
}

fn render_report(report: &RunReport, json: bool, verbose: bool, ctx: &AppContext) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if ctx.quiet {
        return Ok(());
    }

    for op in &report.operations {
        let counts = format!("+{} -{}", op.delta.added, op.delta.removed);
        if ctx.no_color {
            println!("{:<7} {}  {}", op.op, op.path, counts);
        } else {
            println!(
                "{:<7} {}  {} {}",
                op.op.bold(),
                op.path,
                format!("+{}", op.delta.added).green(),
                format!("-{}", op.delta.removed).red()
            );
        }
    }

    let verb = if report.applied { "Applied" } else { "Would apply" };
    println!(
        "{} {} operation(s) for project {}",
        verb,
        report.operations.len(),
        report.project_id
    );
    if verbose {
        println!("uuid: {}", report.uuid);
    }

    Ok(())
}

fn read_response_input(file: Option<&Path>, from_clipboard: bool) -> Result<String> {
    if let Some(path) = file {
        return fs::read_to_string(path)
            .with_context(|| format!("failed to read response file: {}", path.display()));
    }
    if from_clipboard {
        return get_clipboard_content();
    }
    anyhow::bail!("must specify either --response-file or --from-clipboard")
}

/// Get content from the system clipboard
fn get_clipboard_content() -> Result<String> {
    use arboard::Clipboard;
    let mut clipboard = Clipboard::new().context("failed to access clipboard")?;
    clipboard
        .get_text()
        .context("failed to get text from clipboard")
}
