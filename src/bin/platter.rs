use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{prelude::*, EnvFilter};

use platter::artifact::retention::prune_outputs;
use platter::build::cache::WheelCache;
use platter::config::{
    default_wheel_cache, ArchiveFormat, BuildContext, BuildOptions, WheelCacheChoice,
    DEFAULT_OUTPUT_DIR,
};
use platter::report::{Category, ConsoleReporter, Reporter};
use platter::Error;

const LOG_ENV: &str = "PLATTER_LOG";

#[derive(Parser)]
#[command(name = "platter", version, about = "Bundle a Python project with its wheels and an installer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a bundle for the project at PATH.
    Build(BuildArgs),
    /// Remove every file from the wheel cache.
    CleanCache,
    /// Delete all but the newest artifacts in the output directory.
    Clean {
        #[arg(long, env = "PLATTER_OUTPUT", default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        keep: usize,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Project directory. Defaults to the closest ancestor with a setup.py.
    #[arg(env = "PLATTER_PATH")]
    path: Option<PathBuf>,
    #[arg(long, env = "PLATTER_OUTPUT")]
    output: Option<PathBuf>,
    /// Interpreter used to build, and the installer's default.
    #[arg(short = 'p', long, env = "PLATTER_PYTHON")]
    python: Option<PathBuf>,
    #[arg(long, env = "PLATTER_VIRTUALENV_VERSION")]
    virtualenv_version: Option<String>,
    /// Expected SHA-256 of the virtualenv archive.
    #[arg(long, env = "PLATTER_VIRTUALENV_SHA256")]
    virtualenv_sha256: Option<String>,
    /// Use this virtualenv archive instead of downloading one.
    #[arg(long, env = "PLATTER_VIRTUALENV_ARCHIVE")]
    virtualenv_archive: Option<PathBuf>,
    #[arg(long, env = "PLATTER_WHEEL_VERSION")]
    wheel_version: Option<String>,
    /// Extra option passed to every pip call. Repeatable; values are split
    /// on spaces, so PLATTER_PIP_OPTION can carry several.
    #[arg(
        long = "pip-option",
        env = "PLATTER_PIP_OPTION",
        value_delimiter = ' ',
        allow_hyphen_values = true
    )]
    pip_options: Vec<String>,
    #[arg(short = 'r', long, env = "PLATTER_REQUIREMENTS")]
    requirements: Option<PathBuf>,
    #[arg(long, env = "PLATTER_FORMAT", value_parser = parse_format)]
    format: Option<ArchiveFormat>,
    /// Script run against the staging tree before archiving.
    #[arg(long, env = "PLATTER_POSTBUILD_SCRIPT")]
    postbuild_script: Option<PathBuf>,
    #[arg(long, env = "PLATTER_WHEEL_CACHE")]
    wheel_cache: Option<PathBuf>,
    /// Neither read nor update the wheel cache. Wins over --wheel-cache.
    #[arg(long, env = "PLATTER_NO_WHEEL_CACHE")]
    no_wheel_cache: bool,
    /// Only use the wheel cache; never hit the package index.
    #[arg(long, env = "PLATTER_NO_DOWNLOAD")]
    no_download: bool,
}

impl From<BuildArgs> for BuildOptions {
    fn from(args: BuildArgs) -> Self {
        let wheel_cache = match (args.no_wheel_cache, args.wheel_cache) {
            (true, _) => WheelCacheChoice::Disabled,
            (false, Some(dir)) => WheelCacheChoice::Path(dir),
            (false, None) => WheelCacheChoice::Default,
        };
        BuildOptions {
            path: args.path,
            output: args.output,
            python: args.python,
            virtualenv_version: args.virtualenv_version,
            virtualenv_sha256: args.virtualenv_sha256,
            virtualenv_archive: args.virtualenv_archive,
            wheel_version: args.wheel_version,
            pip_options: args.pip_options,
            requirements: args.requirements,
            format: args.format,
            postbuild_script: args.postbuild_script,
            wheel_cache,
            no_download: args.no_download,
        }
    }
}

fn parse_format(value: &str) -> Result<ArchiveFormat, String> {
    value.parse().map_err(|err: Error| err.to_string())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let reporter = ConsoleReporter;

    match run(cli.command, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            reporter.report(Category::Error, &format!("{err:#}"));
            let code = err
                .downcast_ref::<Error>()
                .map(Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn run(command: Command, reporter: &dyn Reporter) -> Result<()> {
    match command {
        Command::Build(args) => build(args, reporter),
        Command::CleanCache => clean_cache(reporter),
        Command::Clean { output, keep } => clean(&output, keep, reporter),
    }
}

fn build(args: BuildArgs, reporter: &dyn Reporter) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let ctx = BuildContext::resolve(args.into(), &cwd)?;
    tracing::debug!(?ctx, "resolved build context");
    platter::pipeline::build(&ctx, reporter)?;
    Ok(())
}

fn clean_cache(reporter: &dyn Reporter) -> Result<()> {
    let cache = WheelCache::new(default_wheel_cache()?);
    cache.clean(reporter)?;
    Ok(())
}

fn clean(output: &Path, keep: usize, reporter: &dyn Reporter) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let output = cwd.join(output);
    if prune_outputs(&output, keep)? {
        reporter.report(
            Category::Info,
            &format!("Pruned {} down to {keep} artifacts", output.display()),
        );
    } else {
        reporter.report(Category::Info, "Nothing to clean");
    }
    Ok(())
}
