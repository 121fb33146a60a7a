//! Column selection shared by the readers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A column given either by label or by position.
///
/// An integer first matches a header label spelled the same way and only then falls
/// back to positional lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Label(String),
}

impl ColumnRef {
    /// Resolve against a header, returning the position and the label to use.
    ///
    /// # Errors
    /// Returns a schema error for an unknown label or an out-of-range index.
    pub fn resolve(&self, header: &[String]) -> Result<(usize, String)> {
        match self {
            Self::Label(l) => header
                .iter()
                .position(|h| h == l)
                .map(|i| (i, l.clone()))
                .ok_or_else(|| {
                    Error::Schema(format!(
                        "column '{l}' not found (available: {})",
                        header.join(", ")
                    ))
                }),
            Self::Index(i) => {
                let as_label = i.to_string();
                if let Some(p) = header.iter().position(|h| *h == as_label) {
                    return Ok((p, as_label));
                }
                header.get(*i).map(|h| (*i, h.clone())).ok_or_else(|| {
                    Error::Schema(format!(
                        "column index {i} out of range for {} columns",
                        header.len()
                    ))
                })
            }
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Label(l) => f.write_str(l),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(s: &str) -> Self {
        Self::Label(s.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(s: String) -> Self {
        Self::Label(s)
    }
}

impl From<usize> for ColumnRef {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// Resolve an optional role column.
///
/// # Errors
/// See [`ColumnRef::resolve`].
pub fn resolve_opt(col: Option<&ColumnRef>, header: &[String]) -> Result<Option<(usize, String)>> {
    col.map(|c| c.resolve(header)).transpose()
}

/// Positional header `"0", "1", ...` for headerless inputs.
#[must_use]
pub fn positional_header(width: usize) -> Vec<String> {
    (0..width).map(|i| i.to_string()).collect()
}
