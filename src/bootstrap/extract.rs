//! Unpacking of bootstrap distributions.

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Container formats a bootstrap distribution may come in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistKind {
    /// Wheels and plain zip archives.
    Zip,
    TarGz,
    TarBz2,
    Tar,
}

impl DistKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".whl") || name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Extract `archive` into `dest`.
pub fn unpack(archive: &Path, kind: DistKind, dest: &Path) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("opening '{}'", archive.display()))?;
    match kind {
        DistKind::Zip => {
            let mut zip = zip::ZipArchive::new(file)
                .with_context(|| format!("reading zip archive '{}'", archive.display()))?;
            zip.extract(dest)
                .with_context(|| format!("unpacking '{}'", archive.display()))?;
        }
        DistKind::TarGz => unpack_tar(GzDecoder::new(file), archive, dest)?,
        DistKind::TarBz2 => unpack_tar(BzDecoder::new(file), archive, dest)?,
        DistKind::Tar => unpack_tar(file, archive, dest)?,
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    tar::Archive::new(reader)
        .unpack(dest)
        .with_context(|| format!("unpacking '{}'", archive.display()))
}

/// Root of an extracted tree.
///
/// A tree holding exactly one entry that is a directory is rooted at that
/// directory (source distributions wrap their contents, wheels do not).
pub fn extracted_root(dir: &Path) -> Result<PathBuf> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("reading extracted tree '{}'", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading entries of '{}'", dir.display()))?;
    if entries.len() == 1 {
        let only = entries.remove(0).path();
        if only.is_dir() {
            return Ok(only);
        }
    }
    Ok(dir.to_path_buf())
}
