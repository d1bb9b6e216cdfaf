//! File helpers for the runner.
//! Reads the cached database and writes artefacts through a capability-based
//! handle on the build tree.

use anyhow::{Context, Result};
use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use std::io::Write;
use tracing::debug;

/// Open the build tree directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened.
pub fn open_tree(root: &Utf8Path) -> Result<Dir> {
    Dir::open_ambient_dir(root, ambient_authority())
        .with_context(|| format!("open build tree {root}"))
}

/// Read `name` from the tree if it exists as a regular file.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_if_present(tree: &Dir, name: &str) -> Result<Option<String>> {
    if !tree.is_file(name) {
        return Ok(None);
    }
    tree.read_to_string(name)
        .map(Some)
        .with_context(|| format!("read {name}"))
}

/// Create or truncate `name` in the tree and write `content` to it.
///
/// # Errors
///
/// Returns an error if creating, writing, flushing or syncing the file fails.
pub fn write_artifact(tree: &Dir, name: &str, content: &[u8]) -> Result<()> {
    let mut file = tree.create(name).with_context(|| format!("create {name}"))?;
    file.write_all(content)
        .with_context(|| format!("write {name}"))?;
    file.flush().with_context(|| format!("flush {name}"))?;
    file.sync_all().with_context(|| format!("sync {name}"))?;
    debug!("Wrote {name} ({} bytes)", content.len());
    Ok(())
}
