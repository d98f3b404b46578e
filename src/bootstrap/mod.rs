//! Runtime bootstrap resolution.
//!
//! The bootstrap is a virtualenv distribution: a standalone `virtualenv.py`
//! plus the support wheels it installs from. It is fetched through an
//! [`ArtifactProvider`], optionally checked against a pinned SHA-256, and
//! unpacked into a scratchpad.

pub mod extract;
pub mod provider;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use extract::DistKind;
pub use provider::{ArtifactProvider, BundledProvider, PipProvider};

use crate::artifact::digest::sha256_file;
use crate::config::BuildContext;
use crate::error::Error;
use crate::report::{Category, Reporter};
use crate::scratch::Scratchpads;

pub const BOOTSTRAP_PACKAGE: &str = "virtualenv";
pub const BOOTSTRAP_SCRIPT: &str = "virtualenv.py";
pub const SUPPORT_DIR: &str = "virtualenv_support";

/// Requirement string for `pkg` at an optional version.
///
/// A version starting with a comparison operator is appended as is,
/// anything else is pinned with `==`.
pub fn make_spec(pkg: &str, version: Option<&str>) -> String {
    match version {
        None => pkg.to_string(),
        Some(v) if v.starts_with(['<', '>', '=', '!', '~']) => format!("{pkg}{v}"),
        Some(v) => format!("{pkg}=={v}"),
    }
}

/// Provider configured for `ctx`: the bundled archive when one was given,
/// otherwise a download through the host interpreter's pip.
pub fn provider_for(ctx: &BuildContext) -> Box<dyn ArtifactProvider> {
    match &ctx.virtualenv_archive {
        Some(archive) => Box::new(BundledProvider::new(archive.clone())),
        None => Box::new(PipProvider::from_context(ctx)),
    }
}

/// An unpacked bootstrap distribution.
#[derive(Debug, Clone)]
pub struct ResolvedBootstrap {
    /// Directory holding `virtualenv.py`.
    pub root: PathBuf,
    /// The archive it was unpacked from.
    pub artifact: PathBuf,
}

impl ResolvedBootstrap {
    pub fn script(&self) -> PathBuf {
        self.root.join(BOOTSTRAP_SCRIPT)
    }

    /// Copy the bootstrap script and its support wheels into `data_dir`.
    pub fn place_into(&self, data_dir: &Path, reporter: &dyn Reporter) -> Result<()> {
        reporter.report(Category::Step, "Placing virtualenv dependencies");
        let script = self.script();
        fs::copy(&script, data_dir.join(BOOTSTRAP_SCRIPT)).with_context(|| {
            format!(
                "copying bootstrap script '{}' into '{}'",
                script.display(),
                data_dir.display()
            )
        })?;

        let support = self.root.join(SUPPORT_DIR);
        if !support.is_dir() {
            return Ok(());
        }
        let mut wheels = Vec::new();
        for entry in fs::read_dir(&support)
            .with_context(|| format!("reading '{}'", support.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("whl") {
                wheels.push(path);
            }
        }
        wheels.sort();
        for wheel in wheels {
            let Some(name) = wheel.file_name() else {
                continue;
            };
            let target = data_dir.join(name);
            fs::copy(&wheel, &target).with_context(|| {
                format!("copying '{}' to '{}'", wheel.display(), target.display())
            })?;
        }
        Ok(())
    }
}

pub struct BootstrapResolver<'a> {
    provider: &'a dyn ArtifactProvider,
    expected_sha256: Option<&'a str>,
    reporter: &'a dyn Reporter,
}

impl<'a> BootstrapResolver<'a> {
    pub fn new(
        provider: &'a dyn ArtifactProvider,
        expected_sha256: Option<&'a str>,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            provider,
            expected_sha256,
            reporter,
        }
    }

    pub fn resolve(
        &self,
        version: Option<&str>,
        scratch: &mut Scratchpads,
    ) -> Result<ResolvedBootstrap> {
        self.reporter.report(
            Category::Step,
            "Downloading and extracting virtualenv bootstrapper",
        );
        let requirement = make_spec(BOOTSTRAP_PACKAGE, version);
        let download_dir = scratch.create("bootstrap-download", self.reporter)?;

        let artifact = self
            .provider
            .fetch(&requirement, &download_dir, self.reporter)?
            .ok_or_else(|| Error::BootstrapUnavailable {
                requirement: requirement.clone(),
            })?;

        if let Some(expected) = self.expected_sha256 {
            let actual = sha256_file(&artifact)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::Integrity {
                    path: artifact,
                    expected: expected.to_string(),
                    actual,
                }
                .into());
            }
            self.reporter
                .report(Category::Info, &format!("Verified SHA256 {actual}"));
        }

        let kind = DistKind::detect(&artifact).ok_or_else(|| Error::BootstrapUnavailable {
            requirement: requirement.clone(),
        })?;
        let unpack_dir = scratch.create("bootstrap", self.reporter)?;
        extract::unpack(&artifact, kind, &unpack_dir)?;
        let root = extract::extracted_root(&unpack_dir)?;

        Ok(ResolvedBootstrap { root, artifact })
    }
}
