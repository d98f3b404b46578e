//! Wheel compilation into the bundle's `data/` directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::BuildEnv;
use crate::bootstrap::make_spec;
use crate::config::BuildContext;
use crate::error::Error;
use crate::process::Cmd;
use crate::report::{Category, Reporter};

/// Name of the requirements copy inside `data/`; the installer looks for it.
pub const BUNDLED_REQUIREMENTS: &str = "requirements.txt";

/// Download the wheel tool and build wheels for the project and its
/// requirements into `data_dir`.
pub fn compile(
    ctx: &BuildContext,
    env: &BuildEnv,
    data_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    reporter.report(Category::Step, "Building wheels");
    run_pip_steps(ctx, env, data_dir, reporter).map_err(|err| offline_failure(ctx, err))
}

fn run_pip_steps(
    ctx: &BuildContext,
    env: &BuildEnv,
    data_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<()> {
    let options = ctx.pip_options();

    Cmd::new(env.pip())
        .arg("download")
        .arg("--dest")
        .arg_path(data_dir)
        .args(&options)
        .arg(make_spec("wheel", ctx.wheel_version.as_deref()))
        .current_dir(&ctx.project)
        .stream(reporter)?;

    let mut wheel = Cmd::new(env.pip())
        .arg("wheel")
        .arg(format!("--wheel-dir={}", data_dir.display()))
        .args(&options);
    if let Some(requirements) = &ctx.requirements {
        wheel = wheel.arg("-r").arg_path(requirements);
        let target = data_dir.join(BUNDLED_REQUIREMENTS);
        fs::copy(requirements, &target).with_context(|| {
            format!(
                "copying '{}' to '{}'",
                requirements.display(),
                target.display()
            )
        })?;
    }
    wheel
        .arg_path(&ctx.project)
        .current_dir(&ctx.project)
        .stream(reporter)
}

/// Offline builds surface pip failures as [`Error::OfflineResolution`].
fn offline_failure(ctx: &BuildContext, err: anyhow::Error) -> anyhow::Error {
    let is_command = matches!(
        err.downcast_ref::<Error>(),
        Some(Error::ExternalCommand { .. })
    );
    if ctx.no_download && is_command {
        Error::OfflineResolution { source: err }.into()
    } else {
        err
    }
}
