//! Bundle a Python project into a self-installing archive.
//!
//! A bundle carries everything needed to install the project on a host
//! that only has a compatible interpreter: a virtualenv bootstrapper, the
//! wheels for the project and its requirements, a few metadata files and
//! an `install.sh` that ties them together.
//!
//! # Architecture
//!
//! ```text
//! pipeline::Builder
//!     │
//!     ├── bootstrap   fetch + verify + unpack virtualenv
//!     ├── build::env  build virtualenv with the wheel tool
//!     ├── build::describe / wheels / metadata / postbuild / cache / installer
//!     └── artifact    archive, digests, retention
//!
//! process, scratch, report, config, error   shared by every stage
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use platter::config::{BuildContext, BuildOptions};
//! use platter::report::ConsoleReporter;
//!
//! let cwd = std::env::current_dir()?;
//! let ctx = BuildContext::resolve(BuildOptions::default(), &cwd)?;
//! let record = platter::pipeline::build(&ctx, &ConsoleReporter)?;
//! println!("{}", record.path.display());
//! ```

pub mod artifact;
pub mod bootstrap;
pub mod build;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod scratch;

#[cfg(test)]
mod testutil;

pub use artifact::digest::ArtifactRecord;
pub use build::PackageInfo;
pub use config::{ArchiveFormat, BuildContext, BuildOptions};
pub use error::Error;
pub use pipeline::Builder;
