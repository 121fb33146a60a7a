//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result<T>`]. Variants map onto a small set of
//! categories ([`ErrorKind`]) so callers can branch on "what went wrong" without
//! matching every variant.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid descriptor fields, unknown names, forbidden parameter combinations.
    Config,
    /// Filesystem and network failures, paths outside the cache root.
    Io,
    /// Checksum mismatch, decompression failure.
    Integrity,
    /// Missing required column or field, out-of-range column index.
    Schema,
    /// Malformed input text.
    Parse,
    /// An optional collaborator is not compiled in.
    Dependency,
    /// Invalid argument values.
    Usage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("path {} is outside the cache root {}", .path.display(), .root.display())]
    OutsideCache { path: PathBuf, root: PathBuf },

    #[error("directory {} is not writable: {reason}", .path.display())]
    PermissionDenied { path: PathBuf, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("parse error at line {line}: {message} (`{content}`)")]
    Parse {
        line: usize,
        content: String,
        message: String,
    },

    #[error("missing dependency: {0}")]
    Dependency(String),

    #[error("invalid usage: {0}")]
    Usage(String),

    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),

    #[error("pipeline replay error: {0}")]
    Replay(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] postcard::Error),
}

impl Error {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Replay(_) | Self::Yaml(_) => ErrorKind::Config,
            Self::Io { .. }
            | Self::NotFound(_)
            | Self::OutsideCache { .. }
            | Self::PermissionDenied { .. }
            | Self::Network(_) => ErrorKind::Io,
            Self::Integrity(_) | Self::Snapshot(_) => ErrorKind::Integrity,
            Self::Schema(_) | Self::UnsupportedFormat(_) => ErrorKind::Schema,
            Self::Parse { .. } | Self::Csv(_) | Self::Json(_) => ErrorKind::Parse,
            Self::Dependency(_) => ErrorKind::Dependency,
            Self::Usage(_) => ErrorKind::Usage,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn parse(line: usize, content: &str, message: impl Into<String>) -> Self {
        let mut content = content.to_string();
        if content.len() > 80 {
            let mut cut = 80;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("...");
        }
        Self::Parse {
            line,
            content,
            message: message.into(),
        }
    }
}

/// Attach a context string to `std::io::Result` values.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}
