//! Pruning of old build artifacts from the output directory.

use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Keep the `keep` newest artifacts in `output_dir` and delete the rest.
///
/// Hidden entries are left alone; they are archives still being written.
/// Returns whether anything was removed.
pub fn prune_outputs(output_dir: &Path, keep: usize) -> Result<bool> {
    if !output_dir.is_dir() {
        return Ok(false);
    }

    let mut outputs: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("reading output directory '{}'", output_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|md| md.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        outputs.push((modified, name, entry.path()));
    }
    outputs.sort_by(|a, b| Reverse((&a.0, &a.1)).cmp(&Reverse((&b.0, &b.1))));

    let mut removed = false;
    for (_, _, path) in outputs.into_iter().skip(keep) {
        let is_dir = fs::symlink_metadata(&path)
            .map(|md| md.is_dir())
            .unwrap_or(false);
        if is_dir {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("removing expired artifact '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "pruned artifact");
        removed = true;
    }
    Ok(removed)
}
