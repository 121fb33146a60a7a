//! Delimited-text record sources with two parsing engines.
//!
//! [`Engine::Csv`] goes through the `csv` crate (quote-aware, single-byte separator);
//! [`Engine::Split`] splits raw lines on a literal separator and accepts multi-character
//! separators such as `::`. [`open_with_fallback`] retries once with a second engine
//! when the first one cannot open or parse the head of the file.

use crate::error::{Error, Result};
use crate::io::compression::open_input;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Csv,
    Split,
}

/// Layout of a delimited file.
#[derive(Clone, Debug)]
pub(crate) struct Layout<'a> {
    pub sep: &'a str,
    pub header: bool,
    pub skiprows: usize,
    pub cols: Option<&'a [String]>,
}

type Records = Box<dyn Iterator<Item = Result<(usize, Vec<String>)>>>;

/// Header plus a lazy iterator over `(line number, fields)`.
pub(crate) struct Table {
    pub header: Vec<String>,
    records: Records,
    pending: Option<(usize, Vec<String>)>,
}

impl Table {
    /// Pull at most `n` records.
    pub fn next_chunk(&mut self, n: usize) -> Result<Vec<(usize, Vec<String>)>> {
        let mut out = Vec::with_capacity(n.min(1 << 16));
        if let Some(r) = self.pending.take() {
            out.push(r);
        }
        while out.len() < n {
            match self.records.next() {
                Some(r) => out.push(r?),
                None => break,
            }
        }
        Ok(out)
    }

    pub fn collect_all(&mut self) -> Result<Vec<(usize, Vec<String>)>> {
        self.next_chunk(usize::MAX)
    }
}

fn open_csv(path: &Path, layout: &Layout<'_>) -> Result<Records> {
    let &[delim] = layout.sep.as_bytes() else {
        return Err(Error::Config(format!(
            "csv engine requires a single-byte separator, got {:?}",
            layout.sep
        )));
    };
    let input = open_input(path)?;
    let rdr = csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let iter = rdr.into_records().map(|rec| -> Result<(usize, Vec<String>)> {
        let rec = rec?;
        let line = rec.position().map_or(0, |p| usize::try_from(p.line()).unwrap_or(0));
        Ok((line, rec.iter().map(|s| s.trim().to_string()).collect()))
    });
    Ok(Box::new(iter))
}

fn open_split(path: &Path, layout: &Layout<'_>) -> Result<Records> {
    if layout.sep.is_empty() {
        return Err(Error::Config("empty separator".into()));
    }
    let sep = layout.sep.to_string();
    let input = open_input(path)?;
    let display = path.display().to_string();
    let iter = input
        .lines()
        .enumerate()
        .filter_map(move |(i, line)| match line {
            Ok(l) if l.trim().is_empty() => None,
            Ok(l) => Some(Ok((
                i + 1,
                l.trim_end_matches('\r')
                    .split(sep.as_str())
                    .map(|s| s.trim().to_string())
                    .collect(),
            ))),
            Err(e) => Some(Err(Error::io(format!("read line {} in {display}", i + 1), e))),
        });
    Ok(Box::new(iter))
}

/// Open `path` with `engine`, consuming skipped rows and the header.
///
/// # Errors
/// Returns an error if the file is missing or the head of the file cannot be parsed.
pub(crate) fn open_table(path: &Path, layout: &Layout<'_>, engine: Engine) -> Result<Table> {
    let mut records = match engine {
        Engine::Csv => open_csv(path, layout)?,
        Engine::Split => open_split(path, layout)?,
    };
    for _ in 0..layout.skiprows {
        if records.next().transpose()?.is_none() {
            break;
        }
    }
    let first = records.next().transpose()?;
    let (header, pending) = match (layout.header, first) {
        (true, Some((_, h))) => {
            let pending = records.next().transpose()?;
            let header = layout.cols.map_or(h, <[String]>::to_vec);
            (header, pending)
        }
        (true, None) => (layout.cols.map(<[String]>::to_vec).unwrap_or_default(), None),
        (false, first) => {
            let width = first.as_ref().map_or(0, |(_, f)| f.len());
            let header = layout
                .cols
                .map_or_else(|| super::columns::positional_header(width), <[String]>::to_vec);
            (header, first)
        }
    };
    Ok(Table {
        header,
        records,
        pending,
    })
}

/// Open with `engine`, retrying once with `fallback` on failure.
///
/// # Errors
/// Returns `NotFound` without retrying, otherwise the fallback's error.
pub(crate) fn open_with_fallback(
    path: &Path,
    layout: &Layout<'_>,
    engine: Engine,
    fallback: Option<Engine>,
) -> Result<Table> {
    match open_table(path, layout, engine) {
        Ok(t) => Ok(t),
        Err(e @ Error::NotFound(_)) => Err(e),
        Err(e) => match fallback {
            Some(fb) if fb != engine => {
                warn!(
                    path = %path.display(),
                    ?engine,
                    fallback = ?fb,
                    error = %e,
                    "primary parser engine failed, retrying with fallback"
                );
                open_table(path, layout, fb)
            }
            _ => Err(e),
        },
    }
}

/// Raw lines of a file, skipping blanks, with 1-based line numbers.
///
/// # Errors
/// Returns an error if the file is missing or unreadable.
pub(crate) fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let input = open_input(path)?;
    let mut out = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.map_err(|e| Error::io(format!("read line {} in {}", i + 1, path.display()), e))?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            out.push((i + 1, line.to_string()));
        }
    }
    Ok(out)
}
