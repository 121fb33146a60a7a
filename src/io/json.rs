//! JSON array and JSON-lines transaction files.
//!
//! A JSON document is an array of flat objects; a JSON-lines file holds one object per
//! line. Field names come from the options.

use crate::datarec::DataRec;
use crate::error::{Error, IoContext, Result};
use crate::frame::Frame;
use crate::io::compression::{create_output, open_input, read_to_string};
use crate::io::{ChunkSink, DEFAULT_CHUNKSIZE, Renames, project, wrap_read};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for the JSON and JSON-lines readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    pub user_col: String,
    pub item_col: String,
    pub rating_col: Option<String>,
    pub timestamp_col: Option<String>,
    pub stream: bool,
    pub encode_ids: bool,
    pub chunksize: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            user_col: "user_id".into(),
            item_col: "item_id".into(),
            rating_col: None,
            timestamp_col: None,
            stream: false,
            encode_ids: false,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

impl JsonOptions {
    #[must_use]
    pub fn new(user_col: impl Into<String>, item_col: impl Into<String>) -> Self {
        Self {
            user_col: user_col.into(),
            item_col: item_col.into(),
            ..Self::default()
        }
    }

    fn keys(&self) -> Vec<&str> {
        let mut keys = vec![self.user_col.as_str(), self.item_col.as_str()];
        keys.extend(self.rating_col.as_deref());
        keys.extend(self.timestamp_col.as_deref());
        keys
    }

    fn roles(&self) -> Roles {
        Roles {
            user: Some(self.user_col.clone()),
            item: Some(self.item_col.clone()),
            rating: self.rating_col.clone(),
            timestamp: self.timestamp_col.clone(),
        }
    }
}

enum Missing {
    Skip,
    Fail,
}

/// Extract the configured keys from one record.
///
/// Returns `Ok(None)` when a required key is absent and `missing` is [`Missing::Skip`].
fn extract(
    obj: &Map<String, Json>,
    opts: &JsonOptions,
    keys: &[&str],
    missing: &Missing,
    line: usize,
) -> Result<Option<Vec<Value>>> {
    let mut row = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let required = i < 2;
        match obj
            .get(*key)
            .and_then(Value::from_json)
            .filter(|v| !v.is_null())
        {
            Some(v) => row.push(v),
            None if !required => row.push(Value::Null),
            None => {
                return match missing {
                    Missing::Skip => Ok(None),
                    Missing::Fail => Err(Error::Schema(format!(
                        "record {line} is missing required field '{key}' (expected {} and {})",
                        opts.user_col, opts.item_col
                    ))),
                };
            }
        }
    }
    Ok(Some(row))
}

/// Parse a JSON array of interaction objects.
///
/// # Errors
/// Returns `NotFound`, a JSON error, or a schema error for a record without the user or
/// item field.
pub fn read_transactions_json_raw(path: impl AsRef<Path>, opts: &JsonOptions) -> Result<RawData> {
    let path = path.as_ref();
    let doc: Json = serde_json::from_str(&read_to_string(path)?)?;
    let Json::Array(records) = doc else {
        return Err(Error::Schema(format!(
            "{}: top-level JSON value must be an array of objects",
            path.display()
        )));
    };
    let keys = opts.keys();
    let missing = if opts.stream { Missing::Skip } else { Missing::Fail };
    let chunksize = if opts.stream { opts.chunksize.max(1) } else { usize::MAX };
    let mut sink = ChunkSink::new(opts.roles(), opts.encode_ids);
    let mut rows = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec.as_object().ok_or_else(|| {
            Error::Schema(format!("record {} is not a JSON object", i + 1))
        })?;
        if let Some(row) = extract(obj, opts, &keys, &missing, i + 1)? {
            rows.push(row);
        }
        if rows.len() >= chunksize {
            sink.push(Frame::from_rows(&keys, std::mem::take(&mut rows))?)?;
        }
    }
    if !rows.is_empty() {
        sink.push(Frame::from_rows(&keys, rows)?)?;
    }
    let raw = sink.finish(&keys)?;
    info!(path = %path.display(), rows = raw.len(), "JSON transactions read");
    Ok(raw)
}

/// See [`read_transactions_json_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_transactions_json_raw`].
pub fn read_transactions_json(path: impl AsRef<Path>, opts: &JsonOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_transactions_json_raw(path, opts)?;
    wrap_read(raw, path, "read_transactions_json", opts)
}

/// Parse a JSON-lines file line by line.
///
/// In streaming mode records missing the user or item field are skipped; otherwise
/// they are a schema error.
///
/// # Errors
/// Returns `NotFound`, a parse error citing the line, or a schema error.
pub fn read_transactions_jsonl_raw(path: impl AsRef<Path>, opts: &JsonOptions) -> Result<RawData> {
    let path = path.as_ref();
    let input = open_input(path)?;
    let keys = opts.keys();
    let missing = if opts.stream { Missing::Skip } else { Missing::Fail };
    let chunksize = if opts.stream { opts.chunksize.max(1) } else { usize::MAX };
    let mut sink = ChunkSink::new(opts.roles(), opts.encode_ids);
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, line) in input.lines().enumerate() {
        let line = line.io_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: Json = serde_json::from_str(&line)
            .map_err(|e| Error::parse(i + 1, &line, format!("invalid JSON: {e}")))?;
        let Some(obj) = rec.as_object() else {
            return Err(Error::parse(i + 1, &line, "expected a JSON object"));
        };
        match extract(obj, opts, &keys, &missing, i + 1)? {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
        if rows.len() >= chunksize {
            sink.push(Frame::from_rows(&keys, std::mem::take(&mut rows))?)?;
        }
    }
    if !rows.is_empty() {
        sink.push(Frame::from_rows(&keys, rows)?)?;
    }
    if skipped > 0 {
        debug!(skipped, "records without user/item fields dropped");
    }
    let raw = sink.finish(&keys)?;
    info!(path = %path.display(), rows = raw.len(), "JSON-lines transactions read");
    Ok(raw)
}

/// See [`read_transactions_jsonl_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_transactions_jsonl_raw`].
pub fn read_transactions_jsonl(path: impl AsRef<Path>, opts: &JsonOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_transactions_jsonl_raw(path, opts)?;
    wrap_read(raw, path, "read_transactions_jsonl", opts)
}

/// Options for the JSON and JSON-lines writers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonWriteOptions {
    pub include_rating: Option<bool>,
    pub include_timestamp: Option<bool>,
    pub user_col: Option<String>,
    pub item_col: Option<String>,
    pub rating_col: Option<String>,
    pub timestamp_col: Option<String>,
}

impl JsonWriteOptions {
    fn renames(&self) -> Renames<'_> {
        Renames {
            user: self.user_col.as_deref(),
            item: self.item_col.as_deref(),
            rating: self.rating_col.as_deref(),
            timestamp: self.timestamp_col.as_deref(),
        }
    }
}

fn records(frame: &Frame) -> Vec<Map<String, Json>> {
    (0..frame.n_rows())
        .map(|i| {
            frame
                .columns()
                .iter()
                .zip(frame.row(i))
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect()
        })
        .collect()
}

/// Write a JSON array of interaction objects.
///
/// # Errors
/// Returns a usage error for an unsatisfiable inclusion or an I/O/JSON error.
pub fn write_transactions_json(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &JsonWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let proj = project(data, opts.include_rating, opts.include_timestamp, opts.renames())?;
    let mut out = create_output(path)?;
    serde_json::to_writer(&mut out, &records(&proj.frame))?;
    out.flush().io_context(|| format!("flush {}", path.display()))?;
    info!(path = %path.display(), rows = proj.frame.n_rows(), "JSON transactions written");
    Ok(path.to_path_buf())
}

/// Write one JSON object per line.
///
/// # Errors
/// Returns a usage error for an unsatisfiable inclusion or an I/O/JSON error.
pub fn write_transactions_jsonl(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &JsonWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let proj = project(data, opts.include_rating, opts.include_timestamp, opts.renames())?;
    let mut out = create_output(path)?;
    for (i, rec) in records(&proj.frame).iter().enumerate() {
        serde_json::to_writer(&mut out, rec)?;
        out.write_all(b"\n")
            .io_context(|| format!("write record #{} to {}", i + 1, path.display()))?;
    }
    out.flush().io_context(|| format!("flush {}", path.display()))?;
    info!(path = %path.display(), rows = proj.frame.n_rows(), "JSON-lines transactions written");
    Ok(path.to_path_buf())
}
