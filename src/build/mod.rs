//! Build stages that run inside or against the isolated build environment.
//!
//! - [`env`] - create the build virtualenv
//! - [`describe`] - ask the project for its name, version and ident
//! - [`wheels`] - compile wheels for the project and its dependencies
//! - [`cache`] - persistent wheel cache
//! - [`metadata`] - sidecar files describing the bundle
//! - [`installer`] - the bundled `install.sh`
//! - [`postbuild`] - optional user hook

pub mod cache;
pub mod describe;
pub mod env;
pub mod installer;
pub mod metadata;
pub mod postbuild;
pub mod wheels;

use serde::{Deserialize, Serialize};

pub use env::BuildEnv;

/// Identity of the packaged project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    /// Platform tag of the build environment, e.g. `linux-x86_64`.
    pub platform: String,
    /// `name-version`.
    pub ident: String,
}

impl PackageInfo {
    /// Base name shared by the archive and its top-level directory.
    pub fn artifact_base(&self) -> String {
        format!("{}-{}", self.ident, self.platform)
    }
}
