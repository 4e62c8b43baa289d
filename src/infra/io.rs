//! Atomic snapshot write-back
//!
//! Commits the difference between two snapshots to disk: changed or new
//! entries are written through a same-directory temp file, entries that
//! became absent are removed. Unchanged files are left alone.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::schema::Snapshot;

/// What a commit actually touched
#[derive(Debug, Default)]
pub struct CommitReport {
    pub written: Vec<String>,
    pub removed: Vec<String>,
}

pub fn commit_snapshot(root: &Path, before: &Snapshot, after: &Snapshot) -> Result<CommitReport> {
    let mut report = CommitReport::default();

    for (rel, state) in after {
        let unchanged = before.get(rel) == Some(state);
        if unchanged {
            continue;
        }

        let target = root.join(rel);
        match state {
            Some(content) => {
                if let Some(parent) = target.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                write_atomic(&target, content.as_bytes())?;
                report.written.push(rel.clone());
            }
            None => {
                match fs::remove_file(&target) {
                    Ok(()) => report.removed.push(rel.clone()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(path = %target.display(), "delete target already gone");
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("removing {}", target.display()));
                    }
                }
            }
        }
    }

    Ok(report)
}

/// Atomic write with a same-directory temp file; falls back to a plain
/// copy when persist crosses filesystems.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let tmp = match tempfile::NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?,
    };

    let mut file = tmp.as_file();
    file.write_all(data)
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    file.sync_all()?;

    match tmp.persist(path) {
        Ok(_) => {}
        Err(e) => {
            fs::copy(e.file.path(), path)
                .with_context(|| format!("replacing {}", path.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(entries: &[(&str, Option<&str>)]) -> Snapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(String::from)))
            .collect()
    }

    #[test]
    fn commit_writes_creates_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("old.txt"), "stale").unwrap();
        fs::write(tmp.path().join("same.txt"), "same").unwrap();

        let before = snap(&[("old.txt", Some("stale")), ("same.txt", Some("same"))]);
        let after = snap(&[
            ("old.txt", None),
            ("same.txt", Some("same")),
            ("nested/new.txt", Some("fresh\n")),
        ]);

        let report = commit_snapshot(tmp.path(), &before, &after).unwrap();

        assert_eq!(report.removed, vec!["old.txt".to_string()]);
        assert_eq!(report.written, vec!["nested/new.txt".to_string()]);
        assert!(!tmp.path().join("old.txt").exists());
        assert_eq!(
            fs::read_to_string(tmp.path().join("nested/new.txt")).unwrap(),
            "fresh\n"
        );
    }

    #[test]
    fn commit_skips_unchanged_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let before = snap(&[("a.txt", Some("x"))]);
        let after = snap(&[("a.txt", Some("x"))]);

        let report = commit_snapshot(tmp.path(), &before, &after).unwrap();
        assert!(report.written.is_empty());
        // unchanged entries are never touched, even if missing on disk
        assert!(!tmp.path().join("a.txt").exists());
    }
}
