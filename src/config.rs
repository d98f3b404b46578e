//! Build configuration.
//!
//! Raw inputs arrive as [`BuildOptions`] (command line and `PLATTER_*`
//! environment variables), are merged over the project's optional
//! `platter.toml`, and are resolved once into an immutable [`BuildContext`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// File whose presence marks a project root.
pub const PROJECT_DESCRIPTOR: &str = "setup.py";

/// Optional per-project configuration file.
pub const PROJECT_CONFIG: &str = "platter.toml";

pub const DEFAULT_OUTPUT_DIR: &str = "dist";

const APP_NAME: &str = "platter";

/// Output container for the build artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    TarGz,
    TarBz2,
    Tar,
    Zip,
    Dir,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 5] = [
        ArchiveFormat::TarGz,
        ArchiveFormat::TarBz2,
        ArchiveFormat::Tar,
        ArchiveFormat::Zip,
        ArchiveFormat::Dir,
    ];

    /// File extension, which doubles as the format's name.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Dir => "dir",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|f| f.extension()).collect();
                Error::user_input(format!(
                    "unsupported format '{}'; expected one of: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

impl<'de> Deserialize<'de> for ArchiveFormat {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Wheel cache selection as given by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WheelCacheChoice {
    /// The per-user default location.
    #[default]
    Default,
    Path(PathBuf),
    Disabled,
}

/// Unresolved build inputs. `None` means "not given here".
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub virtualenv_version: Option<String>,
    pub virtualenv_sha256: Option<String>,
    pub virtualenv_archive: Option<PathBuf>,
    pub wheel_version: Option<String>,
    pub pip_options: Vec<String>,
    pub requirements: Option<PathBuf>,
    pub format: Option<ArchiveFormat>,
    pub postbuild_script: Option<PathBuf>,
    pub wheel_cache: WheelCacheChoice,
    pub no_download: bool,
}

/// `[build]` table of `platter.toml`. Relative paths are relative to the
/// project root.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub build: BuildTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildTable {
    pub output: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub virtualenv_version: Option<String>,
    pub virtualenv_sha256: Option<String>,
    pub wheel_version: Option<String>,
    pub pip_options: Option<Vec<String>>,
    pub requirements: Option<PathBuf>,
    pub format: Option<ArchiveFormat>,
    pub postbuild_script: Option<PathBuf>,
    pub wheel_cache: Option<PathBuf>,
    pub no_download: Option<bool>,
}

/// Load `platter.toml` from the project root, if present.
pub fn load_project_config(project: &Path) -> Result<Option<FileConfig>> {
    let path = project.join(PROJECT_CONFIG);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading project config '{}'", path.display()))?;
    let parsed: FileConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing project config '{}'", path.display()))?;
    Ok(Some(parsed))
}

impl BuildOptions {
    /// Fill every field not given on the command line from the file config.
    pub fn merge_file_config(mut self, project: &Path, config: FileConfig) -> Self {
        let table = config.build;
        let rel = |p: PathBuf| if p.is_absolute() { p } else { project.join(p) };

        if self.output.is_none() {
            self.output = table.output.map(rel);
        }
        if self.python.is_none() {
            self.python = table.python;
        }
        if self.virtualenv_version.is_none() {
            self.virtualenv_version = table.virtualenv_version;
        }
        if self.virtualenv_sha256.is_none() {
            self.virtualenv_sha256 = table.virtualenv_sha256;
        }
        if self.wheel_version.is_none() {
            self.wheel_version = table.wheel_version;
        }
        if self.pip_options.is_empty() {
            self.pip_options = table.pip_options.unwrap_or_default();
        }
        if self.requirements.is_none() {
            self.requirements = table.requirements.map(rel);
        }
        if self.format.is_none() {
            self.format = table.format;
        }
        if self.postbuild_script.is_none() {
            self.postbuild_script = table.postbuild_script.map(rel);
        }
        if self.wheel_cache == WheelCacheChoice::Default {
            if let Some(cache) = table.wheel_cache {
                self.wheel_cache = WheelCacheChoice::Path(rel(cache));
            }
        }
        if !self.no_download {
            self.no_download = table.no_download.unwrap_or(false);
        }
        self
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Absolute path of the project being packaged.
    pub project: PathBuf,
    pub output: PathBuf,
    /// Interpreter used to build, and the default in the generated installer.
    pub python: PathBuf,
    pub virtualenv_version: Option<String>,
    /// Expected SHA-256 of the bootstrap archive, if pinned.
    pub virtualenv_sha256: Option<String>,
    /// Local bootstrap archive to use instead of downloading one.
    pub virtualenv_archive: Option<PathBuf>,
    pub wheel_version: Option<String>,
    pub pip_options: Vec<String>,
    pub requirements: Option<PathBuf>,
    pub wheel_cache: Option<PathBuf>,
    pub no_download: bool,
    pub postbuild_script: Option<PathBuf>,
    pub format: ArchiveFormat,
}

impl BuildContext {
    /// Resolve raw options against `cwd`.
    ///
    /// Discovers the project when no path was given, applies `platter.toml`,
    /// absolutizes paths and rejects conflicting flags.
    pub fn resolve(options: BuildOptions, cwd: &Path) -> Result<Self> {
        let project = match &options.path {
            Some(path) => absolutize(cwd, path),
            None => find_closest_package(cwd)?,
        };
        if !project.is_dir() {
            return Err(Error::user_input(format!(
                "The project path ({}) does not exist",
                project.display()
            ))
            .into());
        }

        let options = match load_project_config(&project)? {
            Some(config) => options.merge_file_config(&project, config),
            None => options,
        };

        let wheel_cache = match options.wheel_cache {
            WheelCacheChoice::Disabled => {
                if options.no_download {
                    return Err(Error::user_input(
                        "--no-download and --no-wheel-cache cannot be used together.",
                    )
                    .into());
                }
                None
            }
            WheelCacheChoice::Path(path) => Some(absolutize(cwd, &path)),
            WheelCacheChoice::Default => Some(default_wheel_cache()?),
        };

        let python = match options.python {
            Some(python) => python,
            None => default_python()?,
        };

        let requirements = options.requirements.map(|p| absolutize(cwd, &p));
        if let Some(req) = &requirements {
            if !req.is_file() {
                return Err(Error::user_input(format!(
                    "requirements file '{}' does not exist",
                    req.display()
                ))
                .into());
            }
        }

        let postbuild_script = options.postbuild_script.map(|p| absolutize(cwd, &p));
        if let Some(script) = &postbuild_script {
            if !script.is_file() {
                return Err(Error::user_input(format!(
                    "postbuild script '{}' does not exist",
                    script.display()
                ))
                .into());
            }
        }

        let virtualenv_sha256 = options
            .virtualenv_sha256
            .map(|sha| sha.trim().to_ascii_lowercase());
        if let Some(sha) = &virtualenv_sha256 {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::user_input(format!("invalid sha256: {sha}")).into());
            }
        }

        Ok(Self {
            project,
            output: absolutize(
                cwd,
                &options
                    .output
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ),
            python,
            virtualenv_version: options.virtualenv_version,
            virtualenv_sha256,
            virtualenv_archive: options.virtualenv_archive.map(|p| absolutize(cwd, &p)),
            wheel_version: options.wheel_version,
            pip_options: options.pip_options,
            requirements,
            wheel_cache,
            no_download: options.no_download,
            postbuild_script,
            format: options.format.unwrap_or_default(),
        })
    }

    /// Options appended to every pip invocation: passthrough options, the
    /// wheel cache as an extra find-links source, and `--no-index` offline.
    pub fn pip_options(&self) -> Vec<String> {
        let mut options = self.pip_options.clone();
        if let Some(cache) = &self.wheel_cache {
            if cache.is_dir() {
                options.push("-f".to_string());
                options.push(cache.display().to_string());
            }
        }
        if self.no_download {
            options.push("--no-index".to_string());
        }
        options
    }

    /// Interpreter name written into the installer as its default.
    pub fn python_basename(&self) -> String {
        self.python
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.python.display().to_string())
    }
}

/// Walk up from `start` to the nearest directory containing `setup.py`.
pub fn find_closest_package(start: &Path) -> Result<PathBuf> {
    for node in start.ancestors() {
        if node.join(PROJECT_DESCRIPTOR).is_file() {
            return Ok(node.to_path_buf());
        }
    }
    Err(Error::user_input("Cannot discover package, you need to be explicit.").into())
}

/// Per-user wheel cache location.
pub fn default_wheel_cache() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| Error::user_input("cannot determine the user cache directory").into())
}

/// Interpreter to use when none was given: `python3`, then `python`.
pub fn default_python() -> Result<PathBuf> {
    which::which("python3")
        .or_else(|_| which::which("python"))
        .map_err(|_| {
            Error::user_input("no Python interpreter found on PATH; pass --python").into()
        })
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
