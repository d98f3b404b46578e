//! Persistent wheel cache.
//!
//! Entries are keyed by file name and never overwritten. New entries are
//! copied to a hidden name first and renamed into place, so a concurrent
//! run reading the cache never sees a half-written wheel.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::report::{Category, Reporter};

#[derive(Debug, Clone)]
pub struct WheelCache {
    dir: PathBuf,
}

impl WheelCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Add the wheels in `data_dir` and the bootstrap archive to the cache.
    ///
    /// Returns how many entries were new.
    pub fn update(
        &self,
        data_dir: &Path,
        bootstrap_artifact: &Path,
        reporter: &dyn Reporter,
    ) -> Result<usize> {
        reporter.report(Category::Step, "Updating wheel cache");
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating wheel cache '{}'", self.dir.display()))?;

        let mut sources = wheels_in(data_dir)?;
        sources.push(bootstrap_artifact.to_path_buf());

        let mut added = 0;
        for source in sources {
            if self.place(&source)? {
                added += 1;
            }
        }
        tracing::debug!(cache = %self.dir.display(), added, "wheel cache updated");
        Ok(added)
    }

    fn place(&self, source: &Path) -> Result<bool> {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let target = self.dir.join(name);
        if target.exists() {
            return Ok(false);
        }

        let tmp = self
            .dir
            .join(format!(".{name}.{}.tmp", std::process::id()));
        fs::copy(source, &tmp).with_context(|| {
            format!("copying '{}' to '{}'", source.display(), tmp.display())
        })?;
        // Another run may have won the race while we copied.
        if target.exists() {
            let _ = fs::remove_file(&tmp);
            return Ok(false);
        }
        if let Err(err) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(err).with_context(|| {
                format!("renaming '{}' to '{}'", tmp.display(), target.display())
            });
        }
        Ok(true)
    }

    /// Remove every regular file from the cache. Returns how many went.
    pub fn clean(&self, reporter: &dyn Reporter) -> Result<usize> {
        if !self.dir.is_dir() {
            reporter.report(Category::Info, "Wheel cache is empty");
            return Ok(0);
        }
        reporter.report(
            Category::Step,
            &format!("Cleaning wheel cache in {}", self.dir.display()),
        );

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("reading '{}'", self.dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => tracing::warn!(path = %path.display(), %err, "could not remove cache entry"),
            }
        }
        reporter.report(Category::Info, &format!("Removed {removed} files"));
        Ok(removed)
    }
}

/// Non-hidden `*.whl` files directly in `dir`, sorted by name.
fn wheels_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut wheels = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading '{}'", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with('.') && name.ends_with(".whl") && path.is_file() {
            wheels.push(path);
        }
    }
    wheels.sort();
    Ok(wheels)
}
