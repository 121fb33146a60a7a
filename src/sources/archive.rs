//! Unpacking downloaded bundles.
//!
//! Each archive kind is gated behind its own feature; unpacking a kind that was not
//! compiled in reports [`Error::Dependency`].

use crate::error::{Error, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    /// A single gzip-compressed file.
    #[serde(rename = "gz")]
    Gzip,
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
    #[serde(rename = "7z")]
    SevenZ,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gzip => "gz",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::SevenZ => "7z",
        })
    }
}

fn corrupt(archive: &Path, e: impl fmt::Display) -> Error {
    Error::Integrity(format!("cannot unpack {}: {e}", archive.display()))
}

#[allow(dead_code)]
fn missing(kind: ArchiveKind, feature: &str) -> Error {
    Error::Dependency(format!(
        "unpacking {kind} archives requires the `{feature}` feature"
    ))
}

/// Unpack `archive` into `dest`, creating it if needed.
///
/// For [`ArchiveKind::Gzip`] the output is a single file named after the archive
/// without its `.gz` suffix; the returned path is that file. Otherwise it is `dest`.
///
/// # Errors
/// Returns [`Error::Integrity`] when the archive is corrupt and
/// [`Error::Dependency`] when the kind is not compiled in.
pub fn unpack(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<PathBuf> {
    if !archive.exists() {
        return Err(Error::NotFound(archive.to_path_buf()));
    }
    create_dir_all(dest).io_context(|| format!("mkdir -p {}", dest.display()))?;
    info!(archive = %archive.display(), %kind, dest = %dest.display(), "unpacking");
    match kind {
        ArchiveKind::Gzip => unpack_gzip(archive, dest),
        ArchiveKind::Zip => unpack_zip(archive, dest).map(|()| dest.to_path_buf()),
        ArchiveKind::Tar => unpack_tar(archive, dest, false).map(|()| dest.to_path_buf()),
        ArchiveKind::TarGz => unpack_tar(archive, dest, true).map(|()| dest.to_path_buf()),
        ArchiveKind::SevenZ => unpack_7z(archive, dest).map(|()| dest.to_path_buf()),
    }
}

#[cfg(feature = "compression-gzip")]
fn unpack_gzip(archive: &Path, dest: &Path) -> Result<PathBuf> {
    use std::fs::File;
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(".gz").unwrap_or(&name);
    let out = dest.join(stem);
    let input = File::open(archive).io_context(|| format!("open {}", archive.display()))?;
    let mut decoder = flate2::read::MultiGzDecoder::new(input);
    let mut output = File::create(&out).io_context(|| format!("create {}", out.display()))?;
    std::io::copy(&mut decoder, &mut output).map_err(|e| corrupt(archive, e))?;
    Ok(out)
}

#[cfg(not(feature = "compression-gzip"))]
fn unpack_gzip(_archive: &Path, _dest: &Path) -> Result<PathBuf> {
    Err(missing(ArchiveKind::Gzip, "compression-gzip"))
}

#[cfg(feature = "archive-zip")]
fn unpack_zip(archive: &Path, dest: &Path) -> Result<()> {
    let f = std::fs::File::open(archive).io_context(|| format!("open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(f).map_err(|e| corrupt(archive, e))?;
    zip.extract(dest).map_err(|e| corrupt(archive, e))
}

#[cfg(not(feature = "archive-zip"))]
fn unpack_zip(_archive: &Path, _dest: &Path) -> Result<()> {
    Err(missing(ArchiveKind::Zip, "archive-zip"))
}

#[cfg(feature = "archive-tar")]
fn unpack_tar(archive: &Path, dest: &Path, gzipped: bool) -> Result<()> {
    use std::io::Read;
    let f = std::fs::File::open(archive).io_context(|| format!("open {}", archive.display()))?;
    let reader: Box<dyn Read> = if gzipped {
        Box::new(flate2::read::GzDecoder::new(f))
    } else {
        Box::new(f)
    };
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(|e| corrupt(archive, e))
}

#[cfg(not(feature = "archive-tar"))]
fn unpack_tar(_archive: &Path, _dest: &Path, gzipped: bool) -> Result<()> {
    let kind = if gzipped { ArchiveKind::TarGz } else { ArchiveKind::Tar };
    Err(missing(kind, "archive-tar"))
}

#[cfg(feature = "archive-7z")]
fn unpack_7z(archive: &Path, dest: &Path) -> Result<()> {
    sevenz_rust::decompress_file(archive, dest).map_err(|e| corrupt(archive, e))
}

#[cfg(not(feature = "archive-7z"))]
fn unpack_7z(_archive: &Path, _dest: &Path) -> Result<()> {
    Err(missing(ArchiveKind::SevenZ, "archive-7z"))
}
