//! Optional user hook run against the staging tree before archiving.
//!
//! The hook runs with the build virtualenv activated and the staging root
//! as its working directory. It can add files to the bundle and append
//! shell to `$INSTALL_SCRIPT`, which ends up in the installer's
//! post-install section.

use anyhow::Result;
use std::path::Path;

use super::BuildEnv;
use crate::error::Error;
use crate::process::Cmd;
use crate::report::{Category, Reporter};
use crate::scratch::Scratchpads;

/// Shell run through `sh -c`. Paths arrive as environment variables, never
/// spliced into the script text.
pub const POSTBUILD_WRAPPER: &str = r#". "$PLATTER_BUILD_ENV/bin/activate"
export HERE DATA_DIR SOURCE_DIR SCRATCHPAD INSTALL_SCRIPT
"$PLATTER_HOOK"
"#;

/// Paths the hook can see.
pub struct HookPaths<'a> {
    pub staging: &'a Path,
    pub source_dir: &'a Path,
    pub install_script: &'a Path,
}

pub fn run(
    script: &Path,
    env: &BuildEnv,
    paths: &HookPaths<'_>,
    scratch: &mut Scratchpads,
    reporter: &dyn Reporter,
) -> Result<()> {
    reporter.report(
        Category::Step,
        &format!("Invoking build script {}", script.display()),
    );
    let scratchpad = scratch.create("postbuild", reporter)?;

    let result = Cmd::new("sh")
        .arg("-c")
        .arg(POSTBUILD_WRAPPER)
        .current_dir(paths.staging)
        .env("PLATTER_BUILD_ENV", &env.root)
        .env("PLATTER_HOOK", script)
        .env("HERE", paths.staging)
        .env("DATA_DIR", paths.staging.join("data"))
        .env("SOURCE_DIR", paths.source_dir)
        .env("SCRATCHPAD", &scratchpad)
        .env("INSTALL_SCRIPT", paths.install_script)
        .stream(reporter);

    match result {
        Err(err) => match err.downcast_ref::<Error>() {
            Some(Error::ExternalCommand { code, .. }) => {
                reporter.report(Category::Error, "Build script failed");
                Err(Error::PostbuildHook {
                    script: script.to_path_buf(),
                    code: *code,
                }
                .into())
            }
            _ => Err(err),
        },
        Ok(()) => Ok(()),
    }
}
