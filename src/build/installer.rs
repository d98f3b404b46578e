//! The `install.sh` shipped at the top of every bundle.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::PackageInfo;
use crate::report::{Category, Reporter};

pub const INSTALL_SCRIPT: &str = "install.sh";

/// Installer body. `@IDENT@`, `@PACKAGE@` and `@PYTHON@` are filled from
/// the package info; `@POSTINSTALL@` is replaced last and verbatim.
pub const INSTALLER_TEMPLATE: &str = r##"#!/bin/bash
# This script installs the bundled wheel distribution of @IDENT@ into
# a provided path where it will end up in a new virtualenv.

set -e
set -o pipefail

show_usage() {
  echo "Usage: ./install.sh [OPTIONS] DST"
}

show_help() {
  show_usage
  cat << EOF

  Installs @IDENT@ into a new virtualenv that is provided as the DST
  parameter.  The interpreter to use for this virtualenv can be
  overridden by the "-p" parameter.

Options:
  --help              display this help and exit.
  -p --python PYTHON  use an alternative Python interpreter
EOF
  exit 0
}

param_error() {
  show_usage
  echo
  echo "Error: $1"
  exit 1
}

py="@PYTHON@"

while [ "$#" -gt 0 ]; do
  case $1 in
    --help)         show_help ;;
    -p|--python)
      if [ "$#" -gt 1 ]; then
        py="$2"
        shift
      else
        param_error "$1 option requires an argument"
      fi
      ;;
    --python=?*)    py=${1#*=} ;;
    --)             shift; break ;;
    -?*)            param_error "no such option: $1" ;;
    *)              break
  esac
  shift
done

if [ "$1" == "" ]; then
  param_error "destination argument is required"
fi

HERE="$(cd "$(dirname "$0")"; pwd)"
DATA_DIR="$HERE/data"

# Ensure Python exists
command -v "$py" &> /dev/null || param_error "Given python interpreter not found ($py)"

echo 'Setting up virtualenv'
"$py" "$DATA_DIR/virtualenv.py" "$1"
VIRTUAL_ENV="$(cd "$1"; pwd)"

INSTALL_ARGS=''
if [ -f "$DATA_DIR/requirements.txt" ]; then
  INSTALL_ARGS="$INSTALL_ARGS"\ -r\ "$DATA_DIR/requirements.txt"
fi

echo "Installing @IDENT@"
"$VIRTUAL_ENV/bin/pip" install --pre --no-index \
  --find-links "$DATA_DIR" wheel $INSTALL_ARGS @PACKAGE@ | { grep -v '^$' || true; }

# Potential post installation
cd "$HERE"
. "$VIRTUAL_ENV/bin/activate"
@POSTINSTALL@

echo "Done."
"##;

/// Render the installer for `info`.
pub fn render(info: &PackageInfo, python: &str, postinstall: &str) -> String {
    INSTALLER_TEMPLATE
        .replace("@IDENT@", &info.ident)
        .replace("@PACKAGE@", &info.name)
        .replace("@PYTHON@", python)
        .replace("@POSTINSTALL@", postinstall)
}

/// Write an executable `install.sh` into `staging`.
pub fn synthesize(
    staging: &Path,
    info: &PackageInfo,
    python: &str,
    postinstall: &str,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    reporter.report(Category::Step, "Writing install script");
    let path = staging.join(INSTALL_SCRIPT);
    fs::write(&path, render(info, python, postinstall))
        .with_context(|| format!("writing '{}'", path.display()))?;

    let mut perms = fs::metadata(&path)
        .with_context(|| format!("reading metadata of '{}'", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)
        .with_context(|| format!("chmod 755 '{}'", path.display()))?;
    Ok(path)
}

/// Post-install snippet collected by the postbuild hook, with trailing
/// whitespace stripped. A missing file means no snippet.
pub fn read_postinstall(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim_end().to_string()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("reading '{}'", path.display())),
    }
}
