//! Hex digests of downloaded files.

use crate::error::{Error, IoContext, Result};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha256,
    Sha512,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        })
    }
}

fn digest_file<D: Digest>(path: &Path) -> Result<String> {
    let mut f = File::open(path).io_context(|| format!("open {}", path.display()))?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = f
            .read(&mut buf)
            .io_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Lowercase hex digest of the file at `path`.
///
/// # Errors
/// Returns [`Error::NotFound`] for a missing file or an I/O error while reading.
pub fn file_digest(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    match algorithm {
        ChecksumAlgorithm::Md5 => digest_file::<md5::Md5>(path),
        ChecksumAlgorithm::Sha256 => digest_file::<sha2::Sha256>(path),
        ChecksumAlgorithm::Sha512 => digest_file::<sha2::Sha512>(path),
    }
}

/// Compare the digest of `path` with `expected` (case-insensitive).
///
/// # Errors
/// Returns [`Error::Integrity`] on mismatch.
pub fn verify_file(path: &Path, expected: &str, algorithm: ChecksumAlgorithm) -> Result<()> {
    let actual = file_digest(path, algorithm)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(Error::Integrity(format!(
            "{algorithm} checksum mismatch for {}: expected {expected}, got {actual}",
            path.display()
        )));
    }
    Ok(())
}
