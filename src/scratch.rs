//! Scratchpad management.
//!
//! A run allocates private working directories on demand. They are released
//! together, newest first, when the run ends, whether it succeeded or not.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::report::{Category, Reporter};

#[derive(Debug)]
struct Scratchpad {
    tag: String,
    dir: TempDir,
}

/// Registry of the scratchpads created during one pipeline run.
#[derive(Debug, Default)]
pub struct Scratchpads {
    pads: Vec<Scratchpad>,
}

impl Scratchpads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, uniquely named directory tagged with its purpose.
    pub fn create(&mut self, tag: &str, reporter: &dyn Reporter) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("platter-")
            .suffix(&format!("-{tag}"))
            .tempdir()
            .with_context(|| format!("creating '{tag}' scratchpad"))?;
        let path = dir.path().to_path_buf();
        reporter.report(
            Category::Scratch,
            &format!("Created scratchpad in {}", path.display()),
        );
        self.pads.push(Scratchpad {
            tag: tag.to_string(),
            dir,
        });
        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    /// Remove every registered scratchpad, newest first.
    ///
    /// Failures are logged and skipped. Directories that were moved away
    /// (a staging tree renamed into the output directory) are dropped
    /// without complaint. Calling this again is a no-op.
    pub fn cleanup_all(&mut self, reporter: &dyn Reporter) {
        while let Some(pad) = self.pads.pop() {
            let path = pad.dir.path().to_path_buf();
            if !path.exists() {
                tracing::debug!(tag = %pad.tag, path = %path.display(), "scratchpad already gone");
                drop(pad);
                continue;
            }
            reporter.report(
                Category::Scratch,
                &format!("Cleaning up scratchpad in {}", path.display()),
            );
            if let Err(err) = pad.dir.close() {
                tracing::warn!(
                    tag = %pad.tag,
                    path = %path.display(),
                    error = %err,
                    "failed to remove scratchpad"
                );
            }
        }
    }
}

impl Drop for Scratchpads {
    fn drop(&mut self) {
        // TempDir removes itself on drop; pop so removal runs newest first.
        while let Some(pad) = self.pads.pop() {
            drop(pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use std::fs;

    #[test]
    fn cleanup_removes_everything_created() {
        let reporter = MemoryReporter::new();
        let mut pads = Scratchpads::new();
        let a = pads.create("venv", &reporter).unwrap();
        let b = pads.create("buildbase", &reporter).unwrap();
        fs::create_dir_all(b.join("data/nested")).unwrap();
        fs::write(b.join("data/nested/file.whl"), b"wheel").unwrap();

        assert!(a.is_dir() && b.is_dir());
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("-venv"));
        assert_eq!(pads.len(), 2);

        pads.cleanup_all(&reporter);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(pads.is_empty());
    }

    #[test]
    fn cleanup_runs_newest_first() {
        let reporter = MemoryReporter::new();
        let mut pads = Scratchpads::new();
        let first = pads.create("first", &reporter).unwrap();
        let second = pads.create("second", &reporter).unwrap();
        pads.cleanup_all(&reporter);

        let cleaned: Vec<String> = reporter
            .lines(Category::Scratch)
            .into_iter()
            .filter(|line| line.starts_with("Cleaning up"))
            .collect();
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned[0].ends_with(&second.display().to_string()));
        assert!(cleaned[1].ends_with(&first.display().to_string()));
    }

    #[test]
    fn cleanup_twice_is_a_no_op() {
        let reporter = MemoryReporter::new();
        let mut pads = Scratchpads::new();
        let path = pads.create("generic", &reporter).unwrap();
        pads.cleanup_all(&reporter);
        let reported = reporter.messages().len();

        pads.cleanup_all(&reporter);
        assert!(!path.exists());
        assert_eq!(reporter.messages().len(), reported);
    }

    #[test]
    fn moved_scratchpad_is_skipped() {
        let reporter = MemoryReporter::new();
        let mut pads = Scratchpads::new();
        let staging = pads.create("buildbase", &reporter).unwrap();
        let target = TempDir::new().unwrap();
        let moved = target.path().join("moved");
        fs::rename(&staging, &moved).unwrap();

        pads.cleanup_all(&reporter);
        assert!(moved.is_dir());
        assert!(pads.is_empty());
    }

    #[test]
    fn drop_releases_outstanding_scratchpads() {
        let reporter = MemoryReporter::new();
        let path = {
            let mut pads = Scratchpads::new();
            pads.create("abandoned", &reporter).unwrap()
        };
        assert!(!path.exists());
    }
}
