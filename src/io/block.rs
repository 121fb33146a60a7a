//! Block-grouped transactions.
//!
//! ```text
//! 1:
//! 10,4,2005-01-01
//! 11,3,2005-02-10
//! 2:
//! 20,3,2005-01-02
//! ```
//!
//! A line `<token>:` opens a block; the following lines are events of that block laid
//! out as `id[,rating[,timestamp]]`. The block identifier is bound to the `block_by`
//! role and each event identifier to the opposite role.

use crate::datarec::DataRec;
use crate::error::{Error, IoContext, Result};
use crate::frame::Frame;
use crate::io::compression::create_output;
use crate::io::delimited::read_lines;
use crate::io::{ChunkSink, DEFAULT_CHUNKSIZE, Renames, cell, project, token, wrap_read};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Role carried by the block header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockBy {
    #[default]
    Item,
    User,
}

/// Fields of one event line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLayout {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "id|rating")]
    IdRating,
    #[default]
    #[serde(rename = "id|rating|timestamp")]
    IdRatingTimestamp,
}

impl EventLayout {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Id => 1,
            Self::IdRating => 2,
            Self::IdRatingTimestamp => 3,
        }
    }

    #[must_use]
    pub const fn has_rating(self) -> bool {
        !matches!(self, Self::Id)
    }

    #[must_use]
    pub const fn has_timestamp(self) -> bool {
        matches!(self, Self::IdRatingTimestamp)
    }
}

/// Options for [`read_transactions_blocks`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockOptions {
    pub block_by: BlockBy,
    pub event_layout: EventLayout,
    pub sep: String,
    pub user_col: String,
    pub item_col: String,
    pub rating_col: String,
    pub timestamp_col: String,
    pub stream: bool,
    pub encode_ids: bool,
    pub chunksize: usize,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            block_by: BlockBy::Item,
            event_layout: EventLayout::IdRatingTimestamp,
            sep: ",".into(),
            user_col: "user_id".into(),
            item_col: "item_id".into(),
            rating_col: "rating".into(),
            timestamp_col: "timestamp".into(),
            stream: false,
            encode_ids: false,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

impl BlockOptions {
    #[must_use]
    pub fn new(block_by: BlockBy, event_layout: EventLayout, sep: impl Into<String>) -> Self {
        Self {
            block_by,
            event_layout,
            sep: sep.into(),
            ..Self::default()
        }
    }

    fn names(&self) -> Vec<&str> {
        let mut names = vec![self.user_col.as_str(), self.item_col.as_str()];
        if self.event_layout.has_rating() {
            names.push(&self.rating_col);
        }
        if self.event_layout.has_timestamp() {
            names.push(&self.timestamp_col);
        }
        names
    }

    fn roles(&self) -> Roles {
        Roles {
            user: Some(self.user_col.clone()),
            item: Some(self.item_col.clone()),
            rating: self.event_layout.has_rating().then(|| self.rating_col.clone()),
            timestamp: self
                .event_layout
                .has_timestamp()
                .then(|| self.timestamp_col.clone()),
        }
    }
}

/// `Some(id)` if the line opens a block.
fn block_header<'a>(line: &'a str, sep: &str) -> Option<&'a str> {
    let t = line.trim();
    let id = t.strip_suffix(':')?;
    (!id.is_empty() && !id.contains(sep)).then_some(id)
}

/// Parse a block-grouped file.
///
/// # Errors
/// Returns a parse error citing the line for an event before any header or an event
/// whose field count does not match the layout.
pub fn read_transactions_blocks_raw(path: impl AsRef<Path>, opts: &BlockOptions) -> Result<RawData> {
    let path = path.as_ref();
    if opts.sep.is_empty() {
        return Err(Error::Config("block reader requires a non-empty separator".into()));
    }
    let names = opts.names();
    let chunksize = if opts.stream { opts.chunksize.max(1) } else { usize::MAX };
    let width = opts.event_layout.width();
    let mut sink = ChunkSink::new(opts.roles(), opts.encode_ids);
    let mut current: Option<Value> = None;
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for (line_no, line) in read_lines(path)? {
        if let Some(id) = block_header(&line, &opts.sep) {
            current = Some(token(id));
            continue;
        }
        let Some(block) = &current else {
            return Err(Error::parse(line_no, &line, "event before any block header"));
        };
        let fields: Vec<&str> = line.split(opts.sep.as_str()).map(str::trim).collect();
        if fields.len() != width {
            return Err(Error::parse(
                line_no,
                &line,
                format!("expected {width} fields, found {}", fields.len()),
            ));
        }
        let event_id = token(fields[0]);
        let (user, item) = match opts.block_by {
            BlockBy::Item => (event_id, block.clone()),
            BlockBy::User => (block.clone(), event_id),
        };
        let mut row = vec![user, item];
        row.extend(fields[1..].iter().map(|f| token(f)));
        rows.push(row);
        if rows.len() >= chunksize {
            sink.push(Frame::from_rows(&names, std::mem::take(&mut rows))?)?;
        }
    }
    if !rows.is_empty() {
        sink.push(Frame::from_rows(&names, rows)?)?;
    }
    let raw = sink.finish(&names)?;
    info!(path = %path.display(), rows = raw.len(), "block transactions read");
    Ok(raw)
}

/// See [`read_transactions_blocks_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_transactions_blocks_raw`].
pub fn read_transactions_blocks(path: impl AsRef<Path>, opts: &BlockOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_transactions_blocks_raw(path, opts)?;
    wrap_read(raw, path, "read_transactions_blocks", opts)
}

/// Options for [`write_transactions_blocks`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockWriteOptions {
    pub block_by: BlockBy,
    pub event_layout: EventLayout,
    pub sep: String,
}

impl Default for BlockWriteOptions {
    fn default() -> Self {
        Self {
            block_by: BlockBy::Item,
            event_layout: EventLayout::IdRatingTimestamp,
            sep: ",".into(),
        }
    }
}

/// Write a block-grouped file.
///
/// A header is emitted whenever the block identifier changes from one row to the next,
/// so rows should be grouped by the block role for one header per block.
///
/// # Errors
/// Returns a usage error if the layout needs a role the data lacks, or a schema error
/// naming the column when a required cell is missing.
pub fn write_transactions_blocks(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &BlockWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let layout = opts.event_layout;
    let proj = project(
        data,
        Some(layout.has_rating()),
        Some(layout.has_timestamp()),
        Renames::default(),
    )?;
    let (block_col, event_col) = match opts.block_by {
        BlockBy::Item => (&proj.item, &proj.user),
        BlockBy::User => (&proj.user, &proj.item),
    };
    let mut fields: Vec<&String> = vec![event_col];
    fields.extend(proj.rating.as_ref());
    fields.extend(proj.timestamp.as_ref());

    let frame = &proj.frame;
    let blocks = frame.require(block_col)?;
    let columns: Vec<&[Value]> = fields
        .iter()
        .map(|f| frame.require(f))
        .collect::<Result<_>>()?;

    for (i, block) in blocks.iter().enumerate() {
        if block.is_null() {
            return Err(Error::Schema(format!(
                "row {i}: missing value in column '{block_col}'"
            )));
        }
        if let Some((name, _)) = fields.iter().zip(&columns).find(|(_, col)| col[i].is_null()) {
            return Err(Error::Schema(format!(
                "row {i}: missing value in column '{name}' required by the event layout"
            )));
        }
    }

    let mut out = create_output(path)?;
    let ctx = || format!("write {}", path.display());
    let mut previous: Option<&Value> = None;
    for (i, block) in blocks.iter().enumerate() {
        if previous != Some(block) {
            writeln!(out, "{block}:").io_context(ctx)?;
            previous = Some(block);
        }
        let cells: Vec<String> = columns.iter().map(|col| cell(&col[i])).collect();
        writeln!(out, "{}", cells.join(&opts.sep)).io_context(ctx)?;
    }
    out.flush().io_context(ctx)?;
    info!(path = %path.display(), rows = frame.n_rows(), "block transactions written");
    Ok(path.to_path_buf())
}
