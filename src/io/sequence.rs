//! Tabular sequence formats.
//!
//! - **inline**: one row per user, items packed in one delimited cell
//!   (`7,"10 11 12",2005`)
//! - **wide**: ragged rows `<user> <item_1> <item_2> ...`
//! - **implicit**: ragged rows of items; the row index is the sequence identifier
//!
//! All three explode into one interaction per event.

use crate::datarec::DataRec;
use crate::error::{Error, IoContext, Result};
use crate::frame::Frame;
use crate::io::columns::{ColumnRef, resolve_opt};
use crate::io::compression::create_output;
use crate::io::delimited::{Engine, Layout, open_with_fallback, read_lines};
use crate::io::{ChunkSink, DEFAULT_CHUNKSIZE, Renames, cell, project, token, wrap_read};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn split_tokens<'a>(s: &'a str, sep: &'a str) -> impl Iterator<Item = &'a str> {
    let parts: Box<dyn Iterator<Item = &'a str> + 'a> = if sep.trim().is_empty() {
        Box::new(s.split_whitespace())
    } else {
        Box::new(s.split(sep))
    };
    parts.map(str::trim).filter(|t| !t.is_empty())
}

// ----------------------------------------------------------------------------
// Inline
// ----------------------------------------------------------------------------

/// Options for [`read_sequence_tabular_inline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineOptions {
    pub user_col: ColumnRef,
    pub sequence_col: ColumnRef,
    /// Separator between items inside the sequence cell.
    pub sequence_sep: String,
    /// A timestamp cell holding as many tokens as the sequence is split per event;
    /// otherwise it is replicated to every event of the row.
    pub timestamp_col: Option<ColumnRef>,
    pub meta_cols: Vec<ColumnRef>,
    /// Name of the exploded item column.
    pub item_col: String,
    pub col_sep: String,
    pub header: bool,
    pub cols: Option<Vec<String>>,
    pub engine: Engine,
    pub fallback_engine: Option<Engine>,
    pub stream: bool,
    pub encode_ids: bool,
    pub chunksize: usize,
}

impl Default for InlineOptions {
    fn default() -> Self {
        Self {
            user_col: ColumnRef::Label("user_id".into()),
            sequence_col: ColumnRef::Label("sequence".into()),
            sequence_sep: " ".into(),
            timestamp_col: None,
            meta_cols: Vec::new(),
            item_col: "item_id".into(),
            col_sep: ",".into(),
            header: true,
            cols: None,
            engine: Engine::Csv,
            fallback_engine: Some(Engine::Split),
            stream: false,
            encode_ids: false,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

impl InlineOptions {
    #[must_use]
    pub fn new(user_col: impl Into<ColumnRef>, sequence_col: impl Into<ColumnRef>) -> Self {
        Self {
            user_col: user_col.into(),
            sequence_col: sequence_col.into(),
            ..Self::default()
        }
    }
}

/// Parse an inline-sequence table.
///
/// # Errors
/// Returns `NotFound`, a schema error for a missing column, or a parse error for a
/// short row.
pub fn read_sequence_tabular_inline_raw(
    path: impl AsRef<Path>,
    opts: &InlineOptions,
) -> Result<RawData> {
    let path = path.as_ref();
    let layout = Layout {
        sep: &opts.col_sep,
        header: opts.header,
        skiprows: 0,
        cols: opts.cols.as_deref(),
    };
    let mut table = open_with_fallback(path, &layout, opts.engine, opts.fallback_engine)?;
    let (ui, user) = opts.user_col.resolve(&table.header)?;
    let (si, _) = opts.sequence_col.resolve(&table.header)?;
    let ts = resolve_opt(opts.timestamp_col.as_ref(), &table.header)?;
    let metas = opts
        .meta_cols
        .iter()
        .map(|m| m.resolve(&table.header))
        .collect::<Result<Vec<_>>>()?;

    let mut names: Vec<&str> = vec![user.as_str(), opts.item_col.as_str()];
    if let Some((_, t)) = &ts {
        names.push(t);
    }
    names.extend(metas.iter().map(|(_, m)| m.as_str()));
    let roles = Roles {
        user: Some(user.clone()),
        item: Some(opts.item_col.clone()),
        rating: None,
        timestamp: ts.as_ref().map(|(_, t)| t.clone()),
    };

    let chunksize = if opts.stream { opts.chunksize.max(1) } else { usize::MAX };
    let mut sink = ChunkSink::new(roles, opts.encode_ids);
    loop {
        let chunk = table.next_chunk(chunksize)?;
        if chunk.is_empty() {
            break;
        }
        let mut rows = Vec::new();
        for (line, fields) in chunk {
            let get = |i: usize| {
                fields.get(i).map(String::as_str).ok_or_else(|| {
                    Error::parse(line, &fields.join(&opts.col_sep), format!("missing field {i}"))
                })
            };
            let u = token(get(ui)?);
            let items: Vec<&str> = split_tokens(get(si)?, &opts.sequence_sep).collect();
            let stamps: Option<Vec<&str>> = match &ts {
                Some((ti, _)) => Some(split_tokens(get(*ti)?, &opts.sequence_sep).collect()),
                None => None,
            };
            let meta_vals = metas
                .iter()
                .map(|(mi, _)| get(*mi).map(token))
                .collect::<Result<Vec<_>>>()?;
            for (k, item) in items.iter().enumerate() {
                let mut row = vec![u.clone(), token(item)];
                if let Some(stamps) = &stamps {
                    let t = if stamps.len() == items.len() {
                        token(stamps[k])
                    } else {
                        token(&stamps.join(&opts.sequence_sep))
                    };
                    row.push(t);
                }
                row.extend(meta_vals.iter().cloned());
                rows.push(row);
            }
        }
        sink.push(Frame::from_rows(&names, rows)?)?;
        if !opts.stream {
            break;
        }
    }
    let raw = sink.finish(&names)?;
    info!(path = %path.display(), rows = raw.len(), "inline sequences read");
    Ok(raw)
}

/// See [`read_sequence_tabular_inline_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_tabular_inline_raw`].
pub fn read_sequence_tabular_inline(path: impl AsRef<Path>, opts: &InlineOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_tabular_inline_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_tabular_inline", opts)
}

/// Options for [`write_sequence_tabular_inline`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineWriteOptions {
    pub col_sep: String,
    pub sequence_sep: String,
    pub header: bool,
    pub include_timestamp: Option<bool>,
    pub user_col: Option<String>,
    pub sequence_col: String,
    pub timestamp_col: Option<String>,
}

impl Default for InlineWriteOptions {
    fn default() -> Self {
        Self {
            col_sep: ",".into(),
            sequence_sep: " ".into(),
            header: true,
            include_timestamp: None,
            user_col: None,
            sequence_col: "sequence".into(),
            timestamp_col: None,
        }
    }
}

/// Events of each user in first-seen user order, preserving row order within a user.
fn per_user(frame: &Frame, user: &str) -> Result<Vec<(Value, Vec<usize>)>> {
    frame.group_indices(user)
}

/// Write one row per user with the items packed into one cell.
///
/// # Errors
/// Returns a usage error for an unsatisfiable inclusion or an I/O error.
pub fn write_sequence_tabular_inline(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &InlineWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let &[delim] = opts.col_sep.as_bytes() else {
        return Err(Error::Usage(format!(
            "inline writer requires a single-byte column separator, got {:?}",
            opts.col_sep
        )));
    };
    let proj = project(
        data,
        Some(false),
        opts.include_timestamp,
        Renames {
            user: opts.user_col.as_deref(),
            timestamp: opts.timestamp_col.as_deref(),
            ..Renames::default()
        },
    )?;
    let frame = &proj.frame;
    let items = frame.require(&proj.item)?;
    let stamps = proj.timestamp.as_deref().map(|t| frame.require(t)).transpose()?;
    let groups = per_user(frame, &proj.user)?;

    let mut out = create_output(path)?;
    let ctx = || format!("write {}", path.display());
    let mut header = vec![proj.user.clone(), opts.sequence_col.clone()];
    header.extend(proj.timestamp.clone());
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .from_writer(&mut out);
    if opts.header {
        wtr.write_record(&header)?;
    }
    for (user, rows) in &groups {
        let seq: Vec<String> = rows.iter().map(|&i| cell(&items[i])).collect();
        let mut record = vec![cell(user), seq.join(&opts.sequence_sep)];
        if let Some(stamps) = stamps {
            let ts: Vec<String> = rows.iter().map(|&i| cell(&stamps[i])).collect();
            record.push(ts.join(&opts.sequence_sep));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush().io_context(ctx)?;
    drop(wtr);
    out.flush().io_context(ctx)?;
    info!(path = %path.display(), users = groups.len(), "inline sequences written");
    Ok(path.to_path_buf())
}

// ----------------------------------------------------------------------------
// Wide and implicit
// ----------------------------------------------------------------------------

/// Options for [`read_sequence_tabular_wide`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WideOptions {
    pub user_col: String,
    pub item_col: String,
    pub col_sep: String,
    pub header: bool,
    pub encode_ids: bool,
}

impl Default for WideOptions {
    fn default() -> Self {
        Self {
            user_col: "user_id".into(),
            item_col: "item_id".into(),
            col_sep: " ".into(),
            header: false,
            encode_ids: false,
        }
    }
}

/// Options for [`read_sequence_tabular_implicit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplicitOptions {
    pub user_col: String,
    pub item_col: String,
    pub col_sep: String,
    pub header: bool,
    /// The first token of every row is a declared length, not an item.
    pub drop_length_col: bool,
    pub encode_ids: bool,
}

impl Default for ImplicitOptions {
    fn default() -> Self {
        Self {
            user_col: "sequence_id".into(),
            item_col: "item_id".into(),
            col_sep: " ".into(),
            header: false,
            drop_length_col: false,
            encode_ids: false,
        }
    }
}

fn ragged_rows(path: &Path, header: bool) -> Result<Vec<(usize, String)>> {
    let mut lines = read_lines(path)?;
    if header && !lines.is_empty() {
        lines.remove(0);
    }
    Ok(lines)
}

fn finish_sequences(
    rows: Vec<Vec<Value>>,
    user_col: &str,
    item_col: &str,
    encode_ids: bool,
) -> Result<RawData> {
    let names = [user_col, item_col];
    let mut sink = ChunkSink::new(Roles::new(user_col, item_col), encode_ids);
    sink.push(Frame::from_rows(&names, rows)?)?;
    sink.finish(&names)
}

/// Parse ragged `<user> <item> <item> ...` rows.
///
/// # Errors
/// Returns `NotFound` for a missing file.
pub fn read_sequence_tabular_wide_raw(path: impl AsRef<Path>, opts: &WideOptions) -> Result<RawData> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    for (_, line) in ragged_rows(path, opts.header)? {
        let mut tokens = split_tokens(&line, &opts.col_sep);
        let Some(user) = tokens.next() else { continue };
        let user = token(user);
        rows.extend(tokens.map(|item| vec![user.clone(), token(item)]));
    }
    let raw = finish_sequences(rows, &opts.user_col, &opts.item_col, opts.encode_ids)?;
    info!(path = %path.display(), rows = raw.len(), "wide sequences read");
    Ok(raw)
}

/// See [`read_sequence_tabular_wide_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_tabular_wide_raw`].
pub fn read_sequence_tabular_wide(path: impl AsRef<Path>, opts: &WideOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_tabular_wide_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_tabular_wide", opts)
}

/// Parse ragged item rows; the 0-based row index becomes the sequence identifier.
///
/// Blank lines are skipped and take no index, so ids count non-blank rows. With
/// `drop_length_col`, the first token of each row is discarded whatever it holds.
///
/// # Errors
/// Returns `NotFound` for a missing file.
pub fn read_sequence_tabular_implicit_raw(
    path: impl AsRef<Path>,
    opts: &ImplicitOptions,
) -> Result<RawData> {
    let path = path.as_ref();
    let mut rows = Vec::new();
    for (seq_id, (line_no, line)) in ragged_rows(path, opts.header)?.into_iter().enumerate() {
        let mut tokens = split_tokens(&line, &opts.col_sep);
        if opts.drop_length_col
            && let Some(declared) = tokens.next()
            && declared.parse::<usize>().is_err()
        {
            debug!(line = line_no, declared, "leading sequence length is not a number");
        }
        let user = Value::Str(seq_id.to_string());
        rows.extend(tokens.map(|item| vec![user.clone(), token(item)]));
    }
    let raw = finish_sequences(rows, &opts.user_col, &opts.item_col, opts.encode_ids)?;
    info!(path = %path.display(), rows = raw.len(), "implicit sequences read");
    Ok(raw)
}

/// See [`read_sequence_tabular_implicit_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_sequence_tabular_implicit_raw`].
pub fn read_sequence_tabular_implicit(
    path: impl AsRef<Path>,
    opts: &ImplicitOptions,
) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_sequence_tabular_implicit_raw(path, opts)?;
    wrap_read(raw, path, "read_sequence_tabular_implicit", opts)
}

/// Options for the wide and implicit writers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceWriteOptions {
    pub col_sep: String,
    /// Emit a `<user_col> <item_col>` header line.
    pub header: bool,
    /// Implicit writer only: prefix each row with its length.
    pub drop_length_col: bool,
}

impl Default for SequenceWriteOptions {
    fn default() -> Self {
        Self {
            col_sep: " ".into(),
            header: false,
            drop_length_col: false,
        }
    }
}

fn write_ragged(
    data: &impl AsRawData,
    path: &Path,
    opts: &SequenceWriteOptions,
    with_user: bool,
) -> Result<usize> {
    let proj = project(data, Some(false), Some(false), Renames::default())?;
    let frame = &proj.frame;
    let items = frame.require(&proj.item)?;
    let groups = per_user(frame, &proj.user)?;
    let mut out = create_output(path)?;
    let ctx = || format!("write {}", path.display());
    if opts.header {
        writeln!(out, "{}{}{}", proj.user, opts.col_sep, proj.item).io_context(ctx)?;
    }
    for (user, rows) in &groups {
        let mut tokens: Vec<String> = Vec::with_capacity(rows.len() + 1);
        if with_user {
            tokens.push(cell(user));
        } else if opts.drop_length_col {
            tokens.push(rows.len().to_string());
        }
        tokens.extend(rows.iter().map(|&i| cell(&items[i])));
        writeln!(out, "{}", tokens.join(&opts.col_sep)).io_context(ctx)?;
    }
    out.flush().io_context(ctx)?;
    Ok(groups.len())
}

/// Write one `<user> <items...>` row per user.
///
/// # Errors
/// Returns a schema error for missing user/item roles or an I/O error.
pub fn write_sequence_tabular_wide(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &SequenceWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let users = write_ragged(data, path, opts, true)?;
    info!(path = %path.display(), users, "wide sequences written");
    Ok(path.to_path_buf())
}

/// Write one row of items per user, in first-seen user order.
///
/// # Errors
/// Returns a schema error for missing user/item roles or an I/O error.
pub fn write_sequence_tabular_implicit(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &SequenceWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let users = write_ragged(data, path, opts, false)?;
    info!(path = %path.display(), users, "implicit sequences written");
    Ok(path.to_path_buf())
}
