//! JSON sequence documents.
//!
//! ```text
//! mapping: {"7": [{"item_id": 10, "rating": 4}, ...], ...}
//! array:   [{"user_id": 7, "sequence": [{"item_id": 10}, ...]}, ...]
//! items:   {"7": [10, 11, 12], ...}
//! ```

use crate::datarec::DataRec;
use crate::error::{Error, IoContext, Result};
use crate::frame::Frame;
use crate::io::compression::{create_output, read_to_string};
use crate::io::{ChunkSink, Renames, project, token, wrap_read};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for the JSON sequence readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceJsonOptions {
    /// Output user column; in the array variant also the user key of each entry.
    pub user_col: String,
    /// Item key inside each event.
    pub item_col: String,
    pub rating_col: Option<String>,
    pub timestamp_col: Option<String>,
    /// Array variant only: key holding the event list.
    pub sequence_key: String,
    pub encode_ids: bool,
}

impl Default for SequenceJsonOptions {
    fn default() -> Self {
        Self {
            user_col: "user_id".into(),
            item_col: "item_id".into(),
            rating_col: None,
            timestamp_col: None,
            sequence_key: "sequence".into(),
            encode_ids: false,
        }
    }
}

impl SequenceJsonOptions {
    #[must_use]
    pub fn new(user_col: impl Into<String>, item_col: impl Into<String>) -> Self {
        Self {
            user_col: user_col.into(),
            item_col: item_col.into(),
            ..Self::default()
        }
    }

    fn names(&self) -> Vec<&str> {
        let mut names = vec![self.user_col.as_str(), self.item_col.as_str()];
        names.extend(self.rating_col.as_deref());
        names.extend(self.timestamp_col.as_deref());
        names
    }

    fn roles(&self) -> Roles {
        Roles {
            user: Some(self.user_col.clone()),
            item: Some(self.item_col.clone()),
            rating: self.rating_col.clone(),
            timestamp: self.timestamp_col.clone(),
        }
    }

    fn finish(&self, rows: Vec<Vec<Value>>) -> Result<RawData> {
        let names = self.names();
        let mut sink = ChunkSink::new(self.roles(), self.encode_ids);
        sink.push(Frame::from_rows(&names, rows)?)?;
        sink.finish(&names)
    }
}

/// Rows for one user's event list.
fn explode_events(
    user: &Value,
    events: &Json,
    opts: &SequenceJsonOptions,
    rows: &mut Vec<Vec<Value>>,
) -> Result<()> {
    let Json::Array(events) = events else {
        return Err(Error::Schema(format!("events of user {user} must be a list")));
    };
    for (k, ev) in events.iter().enumerate() {
        let Json::Object(ev) = ev else {
            return Err(Error::Schema(format!(
                "event #{k} of user {user} must be an object"
            )));
        };
        let item = ev
            .get(&opts.item_col)
            .and_then(Value::from_json)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                Error::Schema(format!(
                    "event #{k} of user {user} has no '{}' key",
                    opts.item_col
                ))
            })?;
        let mut row = vec![user.clone(), item];
        for key in [&opts.rating_col, &opts.timestamp_col].into_iter().flatten() {
            row.push(ev.get(key).and_then(Value::from_json).unwrap_or_default());
        }
        rows.push(row);
    }
    Ok(())
}

fn load_json(path: &Path) -> Result<Json> {
    Ok(serde_json::from_str(&read_to_string(path)?)?)
}

/// Parse a `user -> [event, ...]` mapping.
///
/// # Errors
/// Returns `NotFound`, a JSON error, or a schema error for an event without the item key.
pub fn read_sequence_json_raw(path: impl AsRef<Path>, opts: &SequenceJsonOptions) -> Result<RawData> {
    let path = path.as_ref();
    let Json::Object(doc) = load_json(path)? else {
        return Err(Error::Schema(format!(
            "{}: top-level JSON value must be an object mapping users to events",
            path.display()
        )));
    };
    let mut rows = Vec::new();
    for (user, events) in &doc {
        explode_events(&token(user), events, opts, &mut rows)?;
    }
    let raw = opts.finish(rows)?;
    info!(path = %path.display(), users = doc.len(), rows = raw.len(), "JSON sequences read");
    Ok(raw)
}

/// See [`read_sequence_json_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_json_raw`].
pub fn read_sequence_json(path: impl AsRef<Path>, opts: &SequenceJsonOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_json_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_json", opts)
}

/// Parse an array of `{user, sequence: [event, ...]}` entries.
///
/// # Errors
/// Returns `NotFound`, a JSON error, or a schema error for a malformed entry.
pub fn read_sequence_json_array_raw(
    path: impl AsRef<Path>,
    opts: &SequenceJsonOptions,
) -> Result<RawData> {
    let path = path.as_ref();
    let Json::Array(entries) = load_json(path)? else {
        return Err(Error::Schema(format!(
            "{}: top-level JSON value must be an array",
            path.display()
        )));
    };
    let mut rows = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let user = entry
            .get(&opts.user_col)
            .and_then(Value::from_json)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                Error::Schema(format!("entry #{i} has no '{}' key", opts.user_col))
            })?;
        let events = entry.get(&opts.sequence_key).ok_or_else(|| {
            Error::Schema(format!("entry #{i} has no '{}' key", opts.sequence_key))
        })?;
        explode_events(&user, events, opts, &mut rows)?;
    }
    let raw = opts.finish(rows)?;
    info!(path = %path.display(), users = entries.len(), rows = raw.len(), "JSON sequence array read");
    Ok(raw)
}

/// See [`read_sequence_json_array_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_json_array_raw`].
pub fn read_sequence_json_array(
    path: impl AsRef<Path>,
    opts: &SequenceJsonOptions,
) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_json_array_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_json_array", opts)
}

/// Parse a `user -> [item, ...]` mapping of scalar items.
///
/// # Errors
/// Returns a usage error if rating or timestamp keys are configured, and a schema
/// error for nested event objects.
pub fn read_sequence_json_items_raw(
    path: impl AsRef<Path>,
    opts: &SequenceJsonOptions,
) -> Result<RawData> {
    let path = path.as_ref();
    if opts.rating_col.is_some() || opts.timestamp_col.is_some() {
        return Err(Error::Usage(
            "item-list sequences carry no rating or timestamp keys".into(),
        ));
    }
    let Json::Object(doc) = load_json(path)? else {
        return Err(Error::Schema(format!(
            "{}: top-level JSON value must be an object mapping users to item lists",
            path.display()
        )));
    };
    let mut rows = Vec::new();
    for (user, items) in &doc {
        let user = token(user);
        let Json::Array(items) = items else {
            return Err(Error::Schema(format!("items of user {user} must be a list")));
        };
        for (k, item) in items.iter().enumerate() {
            let item = Value::from_json(item).filter(|v| !v.is_null()).ok_or_else(|| {
                Error::Schema(format!(
                    "item #{k} of user {user} must be a scalar identifier, not a nested value"
                ))
            })?;
            rows.push(vec![user.clone(), item]);
        }
    }
    let raw = opts.finish(rows)?;
    info!(path = %path.display(), users = doc.len(), rows = raw.len(), "JSON item lists read");
    Ok(raw)
}

/// See [`read_sequence_json_items_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_json_items_raw`].
pub fn read_sequence_json_items(
    path: impl AsRef<Path>,
    opts: &SequenceJsonOptions,
) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_json_items_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_json_items", opts)
}

/// Options for the JSON sequence writers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceJsonWriteOptions {
    pub include_rating: Option<bool>,
    pub include_timestamp: Option<bool>,
    pub user_col: Option<String>,
    pub item_col: Option<String>,
    pub rating_col: Option<String>,
    pub timestamp_col: Option<String>,
    pub sequence_key: String,
}

impl Default for SequenceJsonWriteOptions {
    fn default() -> Self {
        Self {
            include_rating: None,
            include_timestamp: None,
            user_col: None,
            item_col: None,
            rating_col: None,
            timestamp_col: None,
            sequence_key: "sequence".into(),
        }
    }
}

enum Shape {
    Mapping,
    Array,
    Items,
}

fn write_json_sequences(
    data: &impl AsRawData,
    path: &Path,
    opts: &SequenceJsonWriteOptions,
    shape: &Shape,
) -> Result<usize> {
    let (rating, timestamp) = match shape {
        Shape::Items => (Some(false), Some(false)),
        Shape::Mapping | Shape::Array => (opts.include_rating, opts.include_timestamp),
    };
    let proj = project(
        data,
        rating,
        timestamp,
        Renames {
            user: opts.user_col.as_deref(),
            item: opts.item_col.as_deref(),
            rating: opts.rating_col.as_deref(),
            timestamp: opts.timestamp_col.as_deref(),
        },
    )?;
    let frame = &proj.frame;
    let groups = frame.group_indices(&proj.user)?;
    let event_cols: Vec<(&String, &[Value])> = [Some(&proj.item), proj.rating.as_ref(), proj.timestamp.as_ref()]
        .into_iter()
        .flatten()
        .map(|c| frame.require(c).map(|v| (c, v)))
        .collect::<Result<_>>()?;

    let events = |rows: &[usize]| -> Vec<Json> {
        rows.iter()
            .map(|&i| match shape {
                Shape::Items => event_cols[0].1[i].to_json(),
                Shape::Mapping | Shape::Array => Json::Object(
                    event_cols
                        .iter()
                        .map(|(k, col)| ((*k).clone(), col[i].to_json()))
                        .collect(),
                ),
            })
            .collect()
    };
    let doc = match shape {
        Shape::Mapping | Shape::Items => Json::Object(
            groups
                .iter()
                .map(|(u, rows)| (u.to_string(), Json::Array(events(rows))))
                .collect::<Map<_, _>>(),
        ),
        Shape::Array => Json::Array(
            groups
                .iter()
                .map(|(u, rows)| {
                    let mut entry = Map::new();
                    entry.insert(proj.user.clone(), u.to_json());
                    entry.insert(opts.sequence_key.clone(), Json::Array(events(rows)));
                    Json::Object(entry)
                })
                .collect(),
        ),
    };
    let mut out = create_output(path)?;
    serde_json::to_writer(&mut out, &doc)?;
    out.flush().io_context(|| format!("flush {}", path.display()))?;
    Ok(groups.len())
}

/// Write a `user -> [event, ...]` mapping.
///
/// # Errors
/// Returns a usage error for an unsatisfiable inclusion or an I/O/JSON error.
pub fn write_sequence_json(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &SequenceJsonWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let users = write_json_sequences(data, path, opts, &Shape::Mapping)?;
    info!(path = %path.display(), users, "JSON sequences written");
    Ok(path.to_path_buf())
}

/// Write an array of `{user, sequence}` entries.
///
/// # Errors
/// Returns a usage error for an unsatisfiable inclusion or an I/O/JSON error.
pub fn write_sequence_json_array(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &SequenceJsonWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let users = write_json_sequences(data, path, opts, &Shape::Array)?;
    info!(path = %path.display(), users, "JSON sequence array written");
    Ok(path.to_path_buf())
}

/// Write a `user -> [item, ...]` mapping.
///
/// # Errors
/// Returns a schema error for missing user/item roles or an I/O/JSON error.
pub fn write_sequence_json_items(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &SequenceJsonWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let users = write_json_sequences(data, path, opts, &Shape::Items)?;
    info!(path = %path.display(), users, "JSON item lists written");
    Ok(path.to_path_buf())
}
