//! Sidecar files at the top of the bundle describing what it contains.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::PackageInfo;
use crate::report::{Category, Reporter};

pub const INFO_FILE: &str = "info.json";
pub const VERSION_FILE: &str = "VERSION";
pub const PLATFORM_FILE: &str = "PLATFORM";
pub const PACKAGE_FILE: &str = "PACKAGE";

/// Write `info.json` and the single-value files into `staging`.
pub fn write(staging: &Path, info: &PackageInfo, reporter: &dyn Reporter) -> Result<()> {
    reporter.report(Category::Step, "Placing meta information");

    let mut json = serde_json::to_string_pretty(info).context("serializing package info")?;
    json.push('\n');
    write_file(&staging.join(INFO_FILE), &json)?;

    for (name, value) in [
        (VERSION_FILE, &info.version),
        (PLATFORM_FILE, &info.platform),
        (PACKAGE_FILE, &info.name),
    ] {
        write_file(&staging.join(name), &format!("{value}\n"))?;
    }
    Ok(())
}

/// Read the package info back from a staging tree or unpacked bundle.
pub fn read(staging: &Path) -> Result<PackageInfo> {
    let path = staging.join(INFO_FILE);
    let content =
        fs::read_to_string(&path).with_context(|| format!("reading '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing '{}'", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing '{}'", path.display()))
}
