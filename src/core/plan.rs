//! Operation planning
//!
//! Turns a parsed operation list into per-file chains ready for
//! application: renames run first and feed a transitively closed
//! path-rewrite map, stale paths are optionally repaired by basename and
//! trailing-segment match, and the remaining operations are grouped by
//! their final path in arrival order.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::core::schema::{ApplyError, FileOperation, PatchDialect, Snapshot};

/// Planner output: the snapshot with renames already executed, and the
/// remaining operations grouped by final path.
#[derive(Debug)]
pub struct Plan {
    pub snapshot: Snapshot,
    pub groups: IndexMap<String, Vec<FileOperation>>,
}

/// Build the application plan. Renames execute here (and can fail);
/// everything else is routed but not yet applied.
pub fn plan_operations(
    ops: &[FileOperation],
    originals: &Snapshot,
    fuzzy_repair: bool,
) -> Result<Plan, ApplyError> {
    let mut snapshot = originals.clone();
    let mut rewrite: HashMap<String, String> = HashMap::new();

    // Renames first, sequentially, in arrival order
    for op in ops {
        let FileOperation::Rename { from, to } = op else {
            continue;
        };

        if !snapshot.contains_key(from) {
            return Err(ApplyError::CannotRenameMissing { from: from.clone() });
        }

        let previous = snapshot.insert(from.clone(), None).flatten();
        snapshot.insert(to.clone(), previous);

        // Keep the rewrite map transitively closed: anything that already
        // pointed at `from` now points at `to`.
        for target in rewrite.values_mut() {
            if target == from {
                *target = to.clone();
            }
        }
        rewrite.insert(from.clone(), to.clone());
    }

    // Route the rest through the rewrite map and group by final path
    let mut groups: IndexMap<String, Vec<FileOperation>> = IndexMap::new();
    for op in ops {
        let mut op = match op {
            FileOperation::Rename { .. } => continue,
            other => other.clone(),
        };

        let path = op_path_mut(&mut op);
        if let Some(renamed) = rewrite.get(path.as_str()) {
            *path = renamed.clone();
        }

        if fuzzy_repair && repair_eligible(&op) {
            let path = op_path_mut(&mut op);
            if !snapshot.contains_key(path.as_str())
                && let Some(candidate) = suffix_match(path, &snapshot)
            {
                debug!(stale = %path, adopted = %candidate, "repaired patch path");
                *path = candidate;
            }
        }

        let key = op_path_mut(&mut op).clone();
        groups.entry(key).or_default().push(op);
    }

    Ok(Plan { snapshot, groups })
}

fn op_path_mut(op: &mut FileOperation) -> &mut String {
    match op {
        FileOperation::Write { path, .. } | FileOperation::Delete { path } => path,
        FileOperation::Rename { .. } => unreachable!("renames are partitioned out"),
    }
}

/// Only deletes and non-replace writes qualify for repair: a replace on
/// a new path is a legitimate file creation.
fn repair_eligible(op: &FileOperation) -> bool {
    match op {
        FileOperation::Delete { .. } => true,
        FileOperation::Write { dialect, .. } => *dialect != PatchDialect::Replace,
        FileOperation::Rename { .. } => false,
    }
}

/// Find the unique snapshot key sharing the target's basename, breaking
/// multi-candidate ties by the number of matching trailing path segments.
/// A tie among the best candidates leaves the path unchanged so the
/// applier surfaces the original error. Separators normalise to `/` for
/// comparison only; paths otherwise stay byte-for-byte.
fn suffix_match(target: &str, snapshot: &Snapshot) -> Option<String> {
    let target_norm = target.replace('\\', "/");
    let target_base = basename(&target_norm);

    let candidates: Vec<&String> = snapshot
        .keys()
        .filter(|key| basename(&key.replace('\\', "/")) == target_base)
        .collect();

    match candidates.as_slice() {
        [] => None,
        [only] => Some((*only).clone()),
        many => {
            let target_segments: Vec<&str> = target_norm.split('/').collect();
            let mut best: Option<(&String, usize)> = None;
            let mut tied = false;

            for &key in many {
                let key_norm = key.replace('\\', "/");
                let score = key_norm
                    .split('/')
                    .rev()
                    .zip(target_segments.iter().rev())
                    .take_while(|(a, b)| a == *b)
                    .count();

                match best {
                    None => best = Some((key, score)),
                    Some((_, top)) if score > top => {
                        best = Some((key, score));
                        tied = false;
                    }
                    Some((_, top)) if score == top => tied = true,
                    _ => {}
                }
            }

            if tied {
                debug!(target, "ambiguous repair candidates, leaving path unchanged");
                None
            } else {
                best.map(|(key, _)| key.clone())
            }
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
