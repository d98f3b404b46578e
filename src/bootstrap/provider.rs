//! Sources for the bootstrap distribution.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildContext;
use crate::process::Cmd;
use crate::report::{Category, Reporter};

/// Fetches a distribution archive matching a requirement into `dest`.
///
/// Returns the path of the fetched file, or `None` when nothing matching
/// could be found.
pub trait ArtifactProvider {
    fn fetch(
        &self,
        requirement: &str,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Option<PathBuf>>;
}

/// Downloads through the host interpreter's pip, honoring the configured
/// pip options (extra find-links sources, `--no-index`).
#[derive(Debug, Clone)]
pub struct PipProvider {
    python: PathBuf,
    options: Vec<String>,
    cwd: PathBuf,
}

impl PipProvider {
    pub fn new(python: PathBuf, options: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            python,
            options,
            cwd,
        }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(ctx.python.clone(), ctx.pip_options(), ctx.project.clone())
    }
}

impl ArtifactProvider for PipProvider {
    fn fetch(
        &self,
        requirement: &str,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Option<PathBuf>> {
        Cmd::new(&self.python)
            .args(["-m", "pip", "download", "--no-deps", "--dest"])
            .arg_path(dest)
            .args(&self.options)
            .arg(requirement)
            .current_dir(&self.cwd)
            .stream(reporter)?;
        pick_download(dest, project_name(requirement))
    }
}

/// Uses a local copy of the bootstrap archive.
#[derive(Debug, Clone)]
pub struct BundledProvider {
    archive: PathBuf,
}

impl BundledProvider {
    pub fn new(archive: PathBuf) -> Self {
        Self { archive }
    }
}

impl ArtifactProvider for BundledProvider {
    fn fetch(
        &self,
        _requirement: &str,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Option<PathBuf>> {
        if !self.archive.is_file() {
            return Ok(None);
        }
        let Some(name) = self.archive.file_name() else {
            return Ok(None);
        };
        let target = dest.join(name);
        reporter.report(
            Category::Info,
            &format!("Using bundled bootstrap {}", self.archive.display()),
        );
        fs::copy(&self.archive, &target).with_context(|| {
            format!(
                "copying bundled bootstrap '{}' to '{}'",
                self.archive.display(),
                target.display()
            )
        })?;
        Ok(Some(target))
    }
}

/// Project part of a requirement string (`virtualenv>=1.11` → `virtualenv`).
pub fn project_name(requirement: &str) -> &str {
    let end = requirement
        .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~' | '[' | ';' | ' '))
        .unwrap_or(requirement.len());
    &requirement[..end]
}

/// Pick the downloaded file for `project` out of a download directory.
///
/// Prefers a file named after the project; falls back to the first file in
/// name order.
pub fn pick_download(dir: &Path, project: &str) -> Result<Option<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("reading download directory '{}'", dir.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in '{}'", dir.display()))?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let wanted = normalize(project);
    let matching = files.iter().find(|path| {
        path.file_name()
            .map(|name| normalize(&name.to_string_lossy()).starts_with(&wanted))
            .unwrap_or(false)
    });
    Ok(matching.or_else(|| files.first()).cloned())
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace(['-', '.'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use tempfile::TempDir;

    #[test]
    fn project_name_strips_specifiers() {
        assert_eq!(project_name("virtualenv"), "virtualenv");
        assert_eq!(project_name("virtualenv==1.11.6"), "virtualenv");
        assert_eq!(project_name("virtualenv>=1.10,<2"), "virtualenv");
    }

    #[test]
    fn pick_download_prefers_named_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("aaa-0.1.tar.gz"), b"x").unwrap();
        fs::write(temp.path().join("virtualenv-1.11.6.tar.gz"), b"x").unwrap();

        let picked = pick_download(temp.path(), "virtualenv").unwrap().unwrap();
        assert_eq!(picked, temp.path().join("virtualenv-1.11.6.tar.gz"));
    }

    #[test]
    fn pick_download_empty_dir_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(pick_download(temp.path(), "virtualenv").unwrap().is_none());
    }

    #[test]
    fn bundled_provider_copies_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("virtualenv-1.11.6.tar.gz");
        fs::write(&archive, b"bundled").unwrap();
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let reporter = MemoryReporter::new();
        let fetched = BundledProvider::new(archive)
            .fetch("virtualenv", &dest, &reporter)
            .unwrap()
            .unwrap();
        assert_eq!(fetched, dest.join("virtualenv-1.11.6.tar.gz"));
        assert_eq!(fs::read(fetched).unwrap(), b"bundled");
    }

    #[test]
    fn bundled_provider_missing_archive_is_none() {
        let temp = TempDir::new().unwrap();
        let reporter = MemoryReporter::new();
        let fetched = BundledProvider::new(temp.path().join("missing.tar.gz"))
            .fetch("virtualenv", temp.path(), &reporter)
            .unwrap();
        assert!(fetched.is_none());
    }
}
