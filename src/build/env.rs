//! Isolated build environment.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::bootstrap::{make_spec, ResolvedBootstrap};
use crate::config::BuildContext;
use crate::process::Cmd;
use crate::report::{Category, Reporter};
use crate::scratch::Scratchpads;

/// A virtualenv created for the build.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub root: PathBuf,
}

impl BuildEnv {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn bin(&self, name: &str) -> PathBuf {
        self.root.join("bin").join(name)
    }

    pub fn python(&self) -> PathBuf {
        self.bin("python")
    }

    pub fn pip(&self) -> PathBuf {
        self.bin("pip")
    }

    pub fn activate_script(&self) -> PathBuf {
        self.bin("activate")
    }
}

/// Create the build virtualenv and install the wheel tool into it.
pub fn build(
    ctx: &BuildContext,
    bootstrap: &ResolvedBootstrap,
    scratch: &mut Scratchpads,
    reporter: &dyn Reporter,
) -> Result<BuildEnv> {
    let root = scratch.create("venv", reporter)?;
    reporter.report(
        Category::Step,
        &format!("Initializing build virtualenv in {}", root.display()),
    );
    create_env(&ctx.python, &bootstrap.script(), &root, &ctx.project, reporter)?;

    let env = BuildEnv::new(root);
    Cmd::new(env.pip())
        .arg("install")
        .args(ctx.pip_options())
        .arg(make_spec("wheel", ctx.wheel_version.as_deref()))
        .current_dir(&ctx.project)
        .stream(reporter)?;
    Ok(env)
}

fn create_env(
    python: &Path,
    script: &Path,
    target: &Path,
    cwd: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    Cmd::new(python)
        .arg_path(script)
        .arg_path(target)
        .current_dir(cwd)
        .stream(reporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildOptions, WheelCacheChoice};
    use crate::error::Error;
    use crate::report::MemoryReporter;
    use crate::testutil::{install_fake_toolchain, write_script};
    use std::fs;
    use tempfile::TempDir;

    fn context(temp: &TempDir, python: PathBuf) -> BuildContext {
        let project = temp.path().join("project");
        fs::create_dir_all(&project).unwrap();
        BuildContext::resolve(
            BuildOptions {
                path: Some(project),
                python: Some(python),
                wheel_version: Some("0.24.0".to_string()),
                wheel_cache: WheelCacheChoice::Disabled,
                ..Default::default()
            },
            temp.path(),
        )
        .unwrap()
    }

    #[test]
    fn builds_env_and_installs_wheel_tool() {
        let temp = TempDir::new().unwrap();
        let python = install_fake_toolchain(&temp.path().join("toolchain"));
        let ctx = context(&temp, python);
        let bootstrap = ResolvedBootstrap {
            root: temp.path().to_path_buf(),
            artifact: temp.path().join("virtualenv.whl"),
        };
        fs::write(bootstrap.script(), "").unwrap();

        let reporter = MemoryReporter::new();
        let mut scratch = Scratchpads::new();
        let env = build(&ctx, &bootstrap, &mut scratch, &reporter).unwrap();

        assert!(env.python().is_file());
        assert!(env.activate_script().is_file());
        let log = fs::read_to_string(env.root.join("pip.log")).unwrap();
        assert_eq!(log.trim(), "install wheel==0.24.0");
    }

    #[test]
    fn failing_bootstrap_propagates_command_error() {
        let temp = TempDir::new().unwrap();
        let python = write_script(temp.path(), "python", "#!/bin/sh\nexit 1\n");
        let ctx = context(&temp, python);
        let bootstrap = ResolvedBootstrap {
            root: temp.path().to_path_buf(),
            artifact: temp.path().join("virtualenv.whl"),
        };

        let reporter = MemoryReporter::new();
        let mut scratch = Scratchpads::new();
        let err = build(&ctx, &bootstrap, &mut scratch, &reporter).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ExternalCommand { code: Some(1), .. })
        ));
    }
}
