//! Bundle output.
//!
//! - [`archive`] turns the staging tree into the final artifact
//! - [`digest`] computes integrity digests of it
//! - [`retention`] prunes old artifacts from the output directory
//!
//! Archives are written to a hidden name in the output directory and
//! renamed into place once complete.

pub mod digest;
pub mod retention;

use anyhow::{bail, Context, Result};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::build::PackageInfo;
use crate::config::ArchiveFormat;
use crate::report::{Category, Reporter};

/// Package `staging` as `<output_dir>/<ident>-<platform>[.ext]`.
pub fn archive(
    staging: &Path,
    info: &PackageInfo,
    format: ArchiveFormat,
    output_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory '{}'", output_dir.display()))?;
    let base = info.artifact_base();

    if format == ArchiveFormat::Dir {
        let target = output_dir.join(&base);
        reporter.report(
            Category::Step,
            &format!("Moving artifact to {}", target.display()),
        );
        if target.exists() {
            bail!("output directory '{}' already exists", target.display());
        }
        fs::rename(staging, &target).with_context(|| {
            format!(
                "moving '{}' to '{}'",
                staging.display(),
                target.display()
            )
        })?;
        return Ok(target);
    }

    let file_name = format!("{base}.{}", format.extension());
    let target = output_dir.join(&file_name);
    let tmp = output_dir.join(format!(".{file_name}"));
    reporter.report(
        Category::Step,
        &format!("Creating {} archive {}", format, target.display()),
    );

    let written = write_archive(staging, &base, format, &tmp).and_then(|()| {
        fs::rename(&tmp, &target).with_context(|| {
            format!("renaming '{}' to '{}'", tmp.display(), target.display())
        })
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(target)
}

fn write_archive(staging: &Path, base: &str, format: ArchiveFormat, out: &Path) -> Result<()> {
    let file = File::create(out).with_context(|| format!("creating '{}'", out.display()))?;
    let file = BufWriter::new(file);
    match format {
        ArchiveFormat::Tar => {
            write_tar(staging, base, file)?.flush()?;
        }
        ArchiveFormat::TarGz => {
            let encoder = GzEncoder::new(file, flate2::Compression::default());
            write_tar(staging, base, encoder)?.finish()?.flush()?;
        }
        ArchiveFormat::TarBz2 => {
            let encoder = BzEncoder::new(file, bzip2::Compression::default());
            write_tar(staging, base, encoder)?.finish()?.flush()?;
        }
        ArchiveFormat::Zip => write_zip(staging, base, file)?,
        ArchiveFormat::Dir => bail!("directory output is not an archive"),
    }
    Ok(())
}

/// Every entry below `root`, sorted by relative path.
fn sorted_entries(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.with_context(|| format!("walking '{}'", root.display()))?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        entries.push((entry.path().to_path_buf(), rel));
    }
    entries.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(entries)
}

/// Write the tar stream and hand back the inner writer for finishing.
fn write_tar<W: Write>(staging: &Path, base: &str, out: W) -> Result<W> {
    let mut builder = TarBuilder::new(out);

    let md = fs::metadata(staging)
        .with_context(|| format!("reading metadata of '{}'", staging.display()))?;
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(md.permissions().mode());
    header.set_cksum();
    builder.append_data(&mut header, base, io::empty())?;

    for (path, rel) in sorted_entries(staging)? {
        let name = format!("{base}/{rel}");
        let md = fs::symlink_metadata(&path)
            .with_context(|| format!("reading metadata of '{}'", path.display()))?;
        let mut header = tar::Header::new_gnu();
        header.set_mode(md.permissions().mode());
        header.set_mtime(
            md.modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );

        if md.file_type().is_symlink() {
            let target = fs::read_link(&path)?;
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_cksum();
            builder.append_link(&mut header, &name, &target)?;
        } else if md.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            builder.append_data(&mut header, &name, io::empty())?;
        } else if md.is_file() {
            let f = File::open(&path).with_context(|| format!("opening '{}'", path.display()))?;
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(md.len());
            header.set_cksum();
            builder.append_data(&mut header, &name, f)?;
        }
    }

    Ok(builder.into_inner()?)
}

fn write_zip<W: Write + io::Seek>(staging: &Path, base: &str, out: W) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    for (path, rel) in sorted_entries(staging)? {
        let md = fs::symlink_metadata(&path)?;
        if !md.is_file() {
            continue;
        }
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(md.permissions().mode());
        zip.start_file(format!("{base}/{rel}"), options)?;
        let mut f = File::open(&path).with_context(|| format!("opening '{}'", path.display()))?;
        io::copy(&mut f, &mut zip)?;
    }
    zip.finish()?.flush()?;
    Ok(())
}
