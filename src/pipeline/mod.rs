//! Build pipeline orchestration.
//!
//! ```text
//! bootstrap -> build env -> describe -> place bootstrap -> wheels
//!   -> metadata -> postbuild hook -> wheel cache -> install.sh
//!   -> archive -> scratchpad cleanup -> digests
//! ```
//!
//! Everything runs sequentially in one thread. The staging tree lives in
//! the `buildbase` scratchpad until the archiver consumes it.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::artifact::{self, digest::ArtifactRecord};
use crate::bootstrap::{self, ArtifactProvider, BootstrapResolver};
use crate::build::{self, cache::WheelCache, describe, installer, metadata, postbuild, wheels};
use crate::config::BuildContext;
use crate::error::Error;
use crate::report::{Category, Reporter};
use crate::scratch::Scratchpads;

/// Placeholder the postbuild hook appends post-install shell to.
const INSTALL_SCRIPT_PLACEHOLDER: &str = "install_script";

/// One build run. Owns the scratchpads it creates.
pub struct Builder<'a> {
    ctx: &'a BuildContext,
    reporter: &'a dyn Reporter,
    provider: &'a dyn ArtifactProvider,
    scratch: Scratchpads,
}

impl<'a> Builder<'a> {
    pub fn new(
        ctx: &'a BuildContext,
        reporter: &'a dyn Reporter,
        provider: &'a dyn ArtifactProvider,
    ) -> Self {
        Self {
            ctx,
            reporter,
            provider,
            scratch: Scratchpads::new(),
        }
    }

    /// Run every stage and return the finished artifact.
    ///
    /// Scratchpads are released whether or not the build succeeded.
    pub fn build(&mut self) -> Result<ArtifactRecord> {
        let result = self.run_stages();
        self.scratch.cleanup_all(self.reporter);
        let path = result?;

        let record = artifact::digest::finalize(&path)?;
        record.report(self.reporter);
        Ok(record)
    }

    fn run_stages(&mut self) -> Result<PathBuf> {
        let ctx = self.ctx;
        let reporter = self.reporter;
        if !ctx.project.is_dir() {
            return Err(Error::user_input(format!(
                "The project path ({}) does not exist",
                ctx.project.display()
            ))
            .into());
        }
        reporter.report(
            Category::Step,
            &format!("Building {} into {}", ctx.project.display(), ctx.output.display()),
        );

        let resolved = BootstrapResolver::new(
            self.provider,
            ctx.virtualenv_sha256.as_deref(),
            reporter,
        )
        .resolve(ctx.virtualenv_version.as_deref(), &mut self.scratch)?;

        let env = build::env::build(ctx, &resolved, &mut self.scratch, reporter)?;
        let info = describe::describe(&env.python(), &ctx.project, reporter)?;

        let staging = self.scratch.create("buildbase", reporter)?;
        let data_dir = staging.join("data");
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating '{}'", data_dir.display()))?;

        resolved.place_into(&data_dir, reporter)?;
        wheels::compile(ctx, &env, &data_dir, reporter)?;
        metadata::write(&staging, &info, reporter)?;

        let install_script = env.root.join(INSTALL_SCRIPT_PLACEHOLDER);
        fs::write(&install_script, "")
            .with_context(|| format!("creating '{}'", install_script.display()))?;

        if let Some(script) = &ctx.postbuild_script {
            postbuild::run(
                script,
                &env,
                &postbuild::HookPaths {
                    staging: &staging,
                    source_dir: &ctx.project,
                    install_script: &install_script,
                },
                &mut self.scratch,
                reporter,
            )?;
        }

        if let Some(dir) = &ctx.wheel_cache {
            WheelCache::new(dir.clone()).update(&data_dir, &resolved.artifact, reporter)?;
        }

        let postinstall = installer::read_postinstall(&install_script)?;
        installer::synthesize(
            &staging,
            &info,
            &ctx.python_basename(),
            &postinstall,
            reporter,
        )?;

        artifact::archive(&staging, &info, ctx.format, &ctx.output, reporter)
    }
}

/// Build with the artifact provider `ctx` asks for.
pub fn build(ctx: &BuildContext, reporter: &dyn Reporter) -> Result<ArtifactRecord> {
    let provider = bootstrap::provider_for(ctx);
    Builder::new(ctx, reporter, provider.as_ref()).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchiveFormat, BuildOptions, WheelCacheChoice};
    use crate::report::MemoryReporter;
    use crate::testutil::{demo_project, install_fake_toolchain, write_script, FakeBootstrap};
    use std::fs::File;
    use std::path::Path;
    use tempfile::TempDir;

    fn context(temp: &TempDir, options: BuildOptions) -> BuildContext {
        let python = install_fake_toolchain(&temp.path().join("toolchain"));
        let project = demo_project(temp.path());
        BuildContext::resolve(
            BuildOptions {
                path: Some(project),
                python: Some(python),
                output: Some(temp.path().join("dist")),
                ..options
            },
            temp.path(),
        )
        .unwrap()
    }

    fn created_scratchpads(reporter: &MemoryReporter) -> Vec<PathBuf> {
        reporter
            .lines(Category::Scratch)
            .iter()
            .filter_map(|line| line.strip_prefix("Created scratchpad in "))
            .map(PathBuf::from)
            .collect()
    }

    fn assert_released(reporter: &MemoryReporter) {
        let pads = created_scratchpads(reporter);
        assert!(!pads.is_empty());
        for pad in pads {
            assert!(!pad.exists(), "{} survived the run", pad.display());
        }
    }

    #[test]
    fn builds_zip_bundle() {
        let temp = TempDir::new().unwrap();
        let ctx = context(
            &temp,
            BuildOptions {
                format: Some(ArchiveFormat::Zip),
                wheel_cache: WheelCacheChoice::Disabled,
                ..Default::default()
            },
        );

        let reporter = MemoryReporter::new();
        let record = Builder::new(&ctx, &reporter, &FakeBootstrap)
            .build()
            .unwrap();

        assert_eq!(
            record.path,
            temp.path().join("dist/demo-1.0-linux-x86_64.zip")
        );
        assert!(record.digests.is_some());

        let zip = zip::ZipArchive::new(File::open(&record.path).unwrap()).unwrap();
        let mut names: Vec<&str> = zip.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "demo-1.0-linux-x86_64/PACKAGE",
                "demo-1.0-linux-x86_64/PLATFORM",
                "demo-1.0-linux-x86_64/VERSION",
                "demo-1.0-linux-x86_64/data/demo-1.0-py3-none-any.whl",
                "demo-1.0-linux-x86_64/data/pip-1.5.6-py2.py3-none-any.whl",
                "demo-1.0-linux-x86_64/data/virtualenv.py",
                "demo-1.0-linux-x86_64/data/wheel-0.0-py2.py3-none-any.whl",
                "demo-1.0-linux-x86_64/info.json",
                "demo-1.0-linux-x86_64/install.sh",
            ]
        );
        assert_released(&reporter);

        let info = reporter.lines(Category::Info);
        assert!(info.iter().any(|line| line.starts_with("MD5: ")));
        assert!(info.iter().any(|line| line.starts_with("SHA256: ")));
    }

    #[test]
    fn dir_bundle_carries_hook_output_and_fills_cache() {
        let temp = TempDir::new().unwrap();
        let hook = write_script(
            temp.path(),
            "postbuild.sh",
            "#!/bin/sh\n\
             echo hello > \"$HERE/NOTES\"\n\
             echo 'echo configured' >> \"$INSTALL_SCRIPT\"\n",
        );
        let cache = temp.path().join("cache");
        let ctx = context(
            &temp,
            BuildOptions {
                format: Some(ArchiveFormat::Dir),
                postbuild_script: Some(hook),
                wheel_cache: WheelCacheChoice::Path(cache.clone()),
                ..Default::default()
            },
        );

        let reporter = MemoryReporter::new();
        let record = Builder::new(&ctx, &reporter, &FakeBootstrap)
            .build()
            .unwrap();

        let bundle = temp.path().join("dist/demo-1.0-linux-x86_64");
        assert_eq!(record.path, bundle);
        assert_eq!(record.digests, None);
        assert_eq!(
            fs::read_to_string(bundle.join("NOTES")).unwrap(),
            "hello\n"
        );
        let installer = fs::read_to_string(bundle.join("install.sh")).unwrap();
        assert!(installer.contains("\necho configured\n"));
        assert!(installer.contains("py=\"python\""));
        assert_eq!(
            metadata::read(&bundle).unwrap().artifact_base(),
            "demo-1.0-linux-x86_64"
        );

        assert!(cache.join("demo-1.0-py3-none-any.whl").is_file());
        assert!(cache.join("virtualenv-0.0-py2.py3-none-any.whl").is_file());
        assert_released(&reporter);
    }

    #[test]
    fn failing_hook_leaves_no_artifact() {
        let temp = TempDir::new().unwrap();
        let hook = write_script(temp.path(), "postbuild.sh", "#!/bin/sh\nexit 1\n");
        let cache = temp.path().join("cache");
        let ctx = context(
            &temp,
            BuildOptions {
                postbuild_script: Some(hook),
                wheel_cache: WheelCacheChoice::Path(cache.clone()),
                ..Default::default()
            },
        );

        let reporter = MemoryReporter::new();
        let err = Builder::new(&ctx, &reporter, &FakeBootstrap)
            .build()
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PostbuildHook { code: Some(1), .. })
        ));
        let dist = temp.path().join("dist");
        assert!(!dist.exists() || fs::read_dir(&dist).unwrap().next().is_none());
        assert!(!cache.exists());
        assert_released(&reporter);
    }

    #[test]
    fn missing_bootstrap_aborts_before_building() {
        struct Nothing;
        impl ArtifactProvider for Nothing {
            fn fetch(&self, _: &str, _: &Path, _: &dyn Reporter) -> Result<Option<PathBuf>> {
                Ok(None)
            }
        }

        let temp = TempDir::new().unwrap();
        let ctx = context(
            &temp,
            BuildOptions {
                wheel_cache: WheelCacheChoice::Disabled,
                ..Default::default()
            },
        );
        let reporter = MemoryReporter::new();
        let err = Builder::new(&ctx, &reporter, &Nothing).build().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::BootstrapUnavailable { .. })
        ));
        assert_eq!(created_scratchpads(&reporter).len(), 1);
        assert_released(&reporter);
    }
}
