//! Package identity, as reported by the project's own `setup.py`.

use anyhow::Result;
use std::path::Path;

use super::PackageInfo;
use crate::config::PROJECT_DESCRIPTOR;
use crate::error::Error;
use crate::process::Cmd;
use crate::report::{Category, Reporter};

const PLATFORM_QUERY: &str = "import sysconfig; print(sysconfig.get_platform())";

/// Ask `python setup.py` for name, version and fullname, and the build
/// interpreter for its platform tag.
pub fn describe(python: &Path, project: &Path, reporter: &dyn Reporter) -> Result<PackageInfo> {
    reporter.report(
        Category::Info,
        "Invoking dummy setup to trigger requirements.",
    );
    // Output ignored; this only gives setup_requires a chance to install.
    Cmd::new(python)
        .args([PROJECT_DESCRIPTOR, "--version"])
        .current_dir(project)
        .capture(reporter)?;

    let raw = Cmd::new(python)
        .args([PROJECT_DESCRIPTOR, "--name", "--version", "--fullname"])
        .current_dir(project)
        .capture(reporter)?;
    let (name, version, ident) = parse_descriptor(&String::from_utf8_lossy(&raw))?;

    let platform = Cmd::new(python)
        .args(["-c", PLATFORM_QUERY])
        .current_dir(project)
        .capture(reporter)?;
    let platform = String::from_utf8_lossy(&platform).trim().to_string();

    reporter.report(
        Category::Info,
        &format!("Package name: {name}, version: {version}"),
    );
    Ok(PackageInfo {
        name,
        version,
        platform,
        ident,
    })
}

fn parse_descriptor(output: &str) -> Result<(String, String, String)> {
    let lines: Vec<&str> = output
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    match lines.as_slice() {
        [name, version, ident] => Ok((name.to_string(), version.to_string(), ident.to_string())),
        _ => Err(Error::MalformedDescriptor {
            lines: lines.len(),
            output: output.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use crate::testutil::{demo_project, install_fake_toolchain, write_script, FAKE_PLATFORM};
    use tempfile::TempDir;

    #[test]
    fn describes_demo_project() {
        let temp = TempDir::new().unwrap();
        let python = install_fake_toolchain(&temp.path().join("toolchain"));
        let project = demo_project(temp.path());

        let reporter = MemoryReporter::new();
        let info = describe(&python, &project, &reporter).unwrap();
        assert_eq!(
            info,
            PackageInfo {
                name: "demo".into(),
                version: "1.0".into(),
                platform: FAKE_PLATFORM.into(),
                ident: "demo-1.0".into(),
            }
        );
        assert_eq!(info.artifact_base(), "demo-1.0-linux-x86_64");
        assert_eq!(reporter.lines(Category::Command).len(), 3);
    }

    #[test]
    fn two_lines_is_malformed() {
        let temp = TempDir::new().unwrap();
        let python = install_fake_toolchain(&temp.path().join("toolchain"));
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        write_script(
            &project,
            "setup.py",
            "#!/bin/sh\necho demo\necho 1.0\n",
        );

        let reporter = MemoryReporter::new();
        let err = describe(&python, &project, &reporter).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MalformedDescriptor { lines: 2, .. })
        ));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let parsed = parse_descriptor("\n  demo\n\n1.0\ndemo-1.0\n\n").unwrap();
        assert_eq!(
            parsed,
            ("demo".to_string(), "1.0".to_string(), "demo-1.0".to_string())
        );
    }

    #[test]
    fn extra_output_is_malformed() {
        let err = parse_descriptor("warning: old setuptools\ndemo\n1.0\ndemo-1.0\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MalformedDescriptor { lines: 4, .. })
        ));
    }
}
