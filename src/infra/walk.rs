//! Gitignore-aware workspace snapshot builder
//!
//! Walks a root directory respecting .gitignore plus configured extra
//! globs, and loads UTF-8 files into a snapshot keyed by /-separated
//! relative paths. Non-UTF-8 (binary) files are skipped. Ordering is
//! deterministic for stable output and tests.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use rayon::prelude::*;
use tracing::debug;

use crate::core::schema::Snapshot;

pub fn snapshot_from_dir(
    root: &Path,
    extra_ignores: &[String],
) -> Result<Snapshot>
{
    let mut overrides = OverrideBuilder::new(root);

    for pattern in extra_ignores
    {
        // Overrides whitelist by default; a leading '!' excludes
        let negated = format!("!{pattern}");
        overrides
            .add(&negated)
            .with_context(|| format!("bad ignore pattern: {pattern}"))?;
    }

    let overrides = overrides
        .build()
        .context("failed to compile ignore patterns")?;

    let mut rel_paths: Vec<String> = Vec::new();

    for entry in WalkBuilder::new(root)
        .overrides(overrides)
        .hidden(false)
        .build()
    {
        let entry = match entry
        {
            Ok(e) => e,
            Err(err) =>
            {
                debug!(%err, "skipping unreadable entry");
                continue;
            }
        };

        if !entry
            .file_type()
            .is_some_and(|t| t.is_file())
        {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path());

        rel_paths.push(
            rel.to_string_lossy()
                .replace('\\', "/"),
        );
    }

    // Deterministic ordering regardless of walk order
    rel_paths.sort();

    // Parallel content load; binary files drop out as None
    let loaded: Vec<Option<(String, String)>> = rel_paths
        .par_iter()
        .map(|rel| {
            let bytes = fs::read(root.join(rel)).ok()?;
            let text = String::from_utf8(bytes).ok()?;
            Some((rel.clone(), text))
        })
        .collect();

    let mut snapshot = Snapshot::new();

    for (path, content) in loaded
        .into_iter()
        .flatten()
    {
        snapshot.insert(path, Some(content));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn snapshot_reads_files_and_skips_binary()
    {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/a.ts"), "const x = 1;\n").unwrap();
        fs::write(tmp.path().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();

        let snapshot = snapshot_from_dir(tmp.path(), &[]).unwrap();

        assert_eq!(
            snapshot["src/a.ts"].as_deref(),
            Some("const x = 1;\n")
        );
        assert!(!snapshot.contains_key("blob.bin"));
    }

    #[test]
    fn extra_ignores_prune_paths()
    {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("target")).unwrap();
        fs::write(tmp.path().join("target/out.txt"), "artifact").unwrap();
        fs::write(tmp.path().join("keep.txt"), "kept").unwrap();

        let snapshot = snapshot_from_dir(tmp.path(), &["target/".to_string()]).unwrap();

        assert!(snapshot.contains_key("keep.txt"));
        assert!(!snapshot.contains_key("target/out.txt"));
    }
}
