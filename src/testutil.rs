//! Shell-script stand-ins for `python` and `pip` used by the unit tests.
//!
//! The fake interpreter understands the three ways the pipeline calls it:
//! running `virtualenv.py` (creates `bin/python`, `bin/pip`, `bin/activate`),
//! running `setup.py` (delegates to the test project's `setup.py`, itself a
//! shell script), and `-c` (prints a fixed platform tag). The fake pip logs
//! every call to `<env>/pip.log` and drops empty wheel files where pip
//! would put real ones.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::bootstrap::ArtifactProvider;
use crate::report::Reporter;

pub(crate) const FAKE_PLATFORM: &str = "linux-x86_64";

pub(crate) const FAKE_PYTHON: &str = r##"#!/bin/sh
here="$(cd "$(dirname "$0")" && pwd)"
case "$1" in
  *virtualenv.py)
    target="$2"
    mkdir -p "$target/bin"
    cp "$0" "$target/bin/python"
    cp "$here/pip" "$target/bin/pip"
    printf 'VIRTUAL_ENV="%s"\nexport VIRTUAL_ENV\n' "$target" > "$target/bin/activate"
    echo "New python executable in $target/bin/python"
    ;;
  setup.py)
    shift
    exec sh ./setup.py "$@"
    ;;
  -c)
    echo "linux-x86_64"
    ;;
  *)
    echo "unexpected python invocation: $*" >&2
    exit 2
    ;;
esac
"##;

pub(crate) const FAKE_PIP: &str = r##"#!/bin/sh
echo "$*" >> "$(dirname "$0")/../pip.log"
cmd="$1"
shift
case "$cmd" in
  install)
    echo "Successfully installed $*"
    ;;
  download)
    dest=""
    spec=""
    while [ "$#" -gt 0 ]; do
      case "$1" in
        --dest) dest="$2"; shift ;;
        -f|-r) shift ;;
        *) spec="$1" ;;
      esac
      shift
    done
    name=$(printf '%s' "$spec" | sed 's/[<>=!~].*//')
    touch "$dest/$name-0.0-py2.py3-none-any.whl"
    echo "Saved $dest/$name-0.0-py2.py3-none-any.whl"
    ;;
  wheel)
    dir=""
    project=""
    while [ "$#" -gt 0 ]; do
      case "$1" in
        --wheel-dir=*) dir="${1#--wheel-dir=}" ;;
        -f|-r) shift ;;
        *) project="$1" ;;
      esac
      shift
    done
    if [ -e "$project/fail-wheel" ]; then
      echo "Could not find a version that satisfies the requirement" >&2
      exit 1
    fi
    touch "$dir/demo-1.0-py3-none-any.whl"
    echo "Stored in directory: $dir"
    ;;
  *)
    exit 2
    ;;
esac
"##;

/// `setup.py` for a project named `demo` at version `1.0`.
pub(crate) const DEMO_SETUP_PY: &str = r##"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --name) echo "demo" ;;
    --version) echo "1.0" ;;
    --fullname) echo "demo-1.0" ;;
  esac
done
"##;

pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Write fake `python` and `pip` into `dir`; returns the interpreter path.
pub(crate) fn install_fake_toolchain(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    write_script(dir, "pip", FAKE_PIP);
    write_script(dir, "python", FAKE_PYTHON)
}

/// Create a `demo` project directory under `parent`.
pub(crate) fn demo_project(parent: &Path) -> PathBuf {
    let project = parent.join("project");
    fs::create_dir_all(&project).unwrap();
    write_script(&project, "setup.py", DEMO_SETUP_PY);
    project
}

/// Provider handing out a minimal virtualenv distribution: `virtualenv.py`
/// plus one support wheel.
pub(crate) struct FakeBootstrap;

impl ArtifactProvider for FakeBootstrap {
    fn fetch(
        &self,
        _requirement: &str,
        dest: &Path,
        _reporter: &dyn Reporter,
    ) -> anyhow::Result<Option<PathBuf>> {
        let path = dest.join("virtualenv-0.0-py2.py3-none-any.whl");
        let mut zip = zip::ZipWriter::new(fs::File::create(&path)?);
        let options = zip::write::FileOptions::default();
        zip.start_file("virtualenv.py", options)?;
        zip.write_all(b"# bootstrap\n")?;
        zip.start_file("virtualenv_support/pip-1.5.6-py2.py3-none-any.whl", options)?;
        zip.write_all(b"pip")?;
        zip.finish()?;
        Ok(Some(path))
    }
}
