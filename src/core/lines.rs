//! Per-file line-change accounting
//!
//! Computes added/removed line counts for a single operation against
//! the before and after snapshots, driving UI counts and thresholds.
//! Lines split on `\n`, so a final trailing newline contributes one
//! trailing empty line.

use serde::Serialize;

use crate::core::schema::{FileOperation, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineDelta {
    pub added: usize,
    pub removed: usize,
    pub difference: usize,
}

impl LineDelta {
    fn new(added: usize, removed: usize) -> Self {
        Self {
            added,
            removed,
            difference: added + removed,
        }
    }
}

/// Count the line changes one operation produced.
pub fn line_changes(op: &FileOperation, originals: &Snapshot, news: &Snapshot) -> LineDelta {
    match op {
        FileOperation::Rename { .. } => LineDelta::default(),

        FileOperation::Delete { path } => {
            let removed = content_of(originals, path).map_or(0, |c| split_lines(c).len());
            LineDelta::new(0, removed)
        }

        FileOperation::Write { path, .. } => {
            let old = content_of(originals, path);
            let new = content_of(news, path);

            if old == new {
                return LineDelta::default();
            }

            let old_lines = old.map(split_lines).unwrap_or_default();
            let new_lines = new.map(split_lines).unwrap_or_default();

            if old_lines.is_empty() {
                return LineDelta::new(new_lines.len(), 0);
            }
            if new_lines.is_empty() {
                return LineDelta::new(0, old_lines.len());
            }

            let common = lcs_len(&old_lines, &new_lines);
            LineDelta::new(new_lines.len() - common, old_lines.len() - common)
        }
    }
}

fn content_of<'a>(snapshot: &'a Snapshot, path: &str) -> Option<&'a str> {
    snapshot.get(path).and_then(|state| state.as_deref())
}

fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        Vec::new()
    } else {
        content.split('\n').collect()
    }
}

/// LCS length over line arrays: two-row dynamic programming with the
/// shorter sequence on the inner axis. O(m*n) time, O(min(m,n)) space.
fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    let mut prev = vec![0usize; inner.len() + 1];
    let mut curr = vec![0usize; inner.len() + 1];

    for x in outer {
        for (j, y) in inner.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
        curr[0] = 0;
    }

    prev[inner.len()]
}
