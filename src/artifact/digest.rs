//! Integrity digests of build artifacts.

use anyhow::{Context, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::report::{Category, Reporter};

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex digests of one byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub md5: String,
    pub sha256: String,
}

/// The finished artifact and, for regular files, its digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub path: PathBuf,
    pub digests: Option<Digests>,
}

impl ArtifactRecord {
    pub fn report(&self, reporter: &dyn Reporter) {
        reporter.report(Category::Step, "Build artifact successfully created.");
        reporter.report(
            Category::Info,
            &format!("Artifact: {}", self.path.display()),
        );
        if let Some(digests) = &self.digests {
            reporter.report(Category::Info, &format!("MD5: {}", digests.md5));
            reporter.report(Category::Info, &format!("SHA256: {}", digests.sha256));
        }
    }
}

/// Describe the artifact at `path`. Directories get no digests.
pub fn finalize(path: &Path) -> Result<ArtifactRecord> {
    let digests = if path.is_file() {
        Some(digest_file(path)?)
    } else {
        None
    };
    Ok(ArtifactRecord {
        path: path.to_path_buf(),
        digests,
    })
}

/// MD5 and SHA-256 of a file, computed in a single read pass.
pub fn digest_file(path: &Path) -> Result<Digests> {
    let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    digest_reader(BufReader::new(file)).with_context(|| format!("reading '{}'", path.display()))
}

pub fn digest_reader<R: Read>(mut reader: R) -> Result<Digests> {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha256.update(&buf[..n]);
    }
    Ok(Digests {
        md5: format!("{:x}", md5.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
    })
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    Ok(digest_file(path)?.sha256)
}
