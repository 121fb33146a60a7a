//! Delimited transaction tables: one interaction per row.

use crate::datarec::DataRec;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::io::columns::{ColumnRef, resolve_opt};
use crate::io::compression::create_output;
use crate::io::delimited::{Engine, Layout, open_with_fallback};
use crate::io::{ChunkSink, DEFAULT_CHUNKSIZE, Renames, cell, project, token, wrap_read};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for [`read_transactions_tabular`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularOptions {
    pub sep: String,
    pub user_col: ColumnRef,
    pub item_col: ColumnRef,
    pub rating_col: Option<ColumnRef>,
    pub timestamp_col: Option<ColumnRef>,
    /// First (non-skipped) row holds column names.
    pub header: bool,
    pub skiprows: usize,
    /// Column names to use instead of (or in the absence of) a header row.
    pub cols: Option<Vec<String>>,
    pub engine: Engine,
    pub fallback_engine: Option<Engine>,
    pub stream: bool,
    pub encode_ids: bool,
    pub chunksize: usize,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            sep: ",".into(),
            user_col: ColumnRef::Label("user_id".into()),
            item_col: ColumnRef::Label("item_id".into()),
            rating_col: None,
            timestamp_col: None,
            header: true,
            skiprows: 0,
            cols: None,
            engine: Engine::Csv,
            fallback_engine: Some(Engine::Split),
            stream: false,
            encode_ids: false,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

impl TabularOptions {
    #[must_use]
    pub fn new(sep: impl Into<String>, user_col: impl Into<ColumnRef>, item_col: impl Into<ColumnRef>) -> Self {
        Self {
            sep: sep.into(),
            user_col: user_col.into(),
            item_col: item_col.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rating(mut self, col: impl Into<ColumnRef>) -> Self {
        self.rating_col = Some(col.into());
        self
    }

    #[must_use]
    pub fn timestamp(mut self, col: impl Into<ColumnRef>) -> Self {
        self.timestamp_col = Some(col.into());
        self
    }

    #[must_use]
    pub const fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    #[must_use]
    pub const fn streaming(mut self, chunksize: usize) -> Self {
        self.stream = true;
        self.chunksize = chunksize;
        self
    }

    #[must_use]
    pub const fn encode_ids(mut self, encode: bool) -> Self {
        self.encode_ids = encode;
        self
    }
}

/// Parse a delimited transactions file.
///
/// # Errors
/// Returns `NotFound` for a missing file, a schema error for a missing column, or the
/// parser error if both engines fail.
pub fn read_transactions_tabular_raw(path: impl AsRef<Path>, opts: &TabularOptions) -> Result<RawData> {
    let path = path.as_ref();
    let layout = Layout {
        sep: &opts.sep,
        header: opts.header,
        skiprows: opts.skiprows,
        cols: opts.cols.as_deref(),
    };
    let mut table = open_with_fallback(path, &layout, opts.engine, opts.fallback_engine)?;

    let (ui, user) = opts.user_col.resolve(&table.header)?;
    let (ii, item) = opts.item_col.resolve(&table.header)?;
    let rating = resolve_opt(opts.rating_col.as_ref(), &table.header)?;
    let timestamp = resolve_opt(opts.timestamp_col.as_ref(), &table.header)?;

    let mut picks = vec![(ui, user.clone()), (ii, item.clone())];
    picks.extend(rating.clone());
    picks.extend(timestamp.clone());
    let names: Vec<&str> = picks.iter().map(|(_, n)| n.as_str()).collect();
    let roles = Roles {
        user: Some(user),
        item: Some(item),
        rating: rating.map(|(_, n)| n),
        timestamp: timestamp.map(|(_, n)| n),
    };

    let chunksize = if opts.stream { opts.chunksize.max(1) } else { usize::MAX };
    let mut sink = ChunkSink::new(roles, opts.encode_ids);
    loop {
        let chunk = table.next_chunk(chunksize)?;
        if chunk.is_empty() {
            break;
        }
        let mut rows = Vec::with_capacity(chunk.len());
        for (line, fields) in chunk {
            let row = picks
                .iter()
                .map(|(i, name)| {
                    fields.get(*i).map(|s| token(s)).ok_or_else(|| {
                        Error::parse(
                            line,
                            &fields.join(&opts.sep),
                            format!("missing field for column '{name}'"),
                        )
                    })
                })
                .collect::<Result<Vec<Value>>>()?;
            rows.push(row);
        }
        sink.push(Frame::from_rows(&names, rows)?)?;
        if !opts.stream {
            break;
        }
    }
    let raw = sink.finish(&names)?;
    info!(path = %path.display(), rows = raw.len(), "transactions table read");
    Ok(raw)
}

/// See [`read_transactions_tabular_raw`]; the result carries a `read` step.
///
/// # Errors
/// See [`read_transactions_tabular_raw`].
pub fn read_transactions_tabular(path: impl AsRef<Path>, opts: &TabularOptions) -> Result<DataRec> {
    let path = path.as_ref();
    let raw = read_transactions_tabular_raw(path, opts)?;
    wrap_read(raw, path, "read_transactions_tabular", opts)
}

/// Options for [`write_transactions_tabular`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularWriteOptions {
    pub sep: String,
    pub header: bool,
    pub include_rating: Option<bool>,
    pub include_timestamp: Option<bool>,
    pub user_col: Option<String>,
    pub item_col: Option<String>,
    pub rating_col: Option<String>,
    pub timestamp_col: Option<String>,
}

impl Default for TabularWriteOptions {
    fn default() -> Self {
        Self {
            sep: "\t".into(),
            header: true,
            include_rating: None,
            include_timestamp: None,
            user_col: None,
            item_col: None,
            rating_col: None,
            timestamp_col: None,
        }
    }
}

/// Write the interaction table as delimited text.
///
/// # Errors
/// Returns a usage error for an inclusion the data cannot satisfy, or an I/O error.
pub fn write_transactions_tabular(
    data: &impl AsRawData,
    path: impl AsRef<Path>,
    opts: &TabularWriteOptions,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let proj = project(
        data,
        opts.include_rating,
        opts.include_timestamp,
        Renames {
            user: opts.user_col.as_deref(),
            item: opts.item_col.as_deref(),
            rating: opts.rating_col.as_deref(),
            timestamp: opts.timestamp_col.as_deref(),
        },
    )?;
    let frame = &proj.frame;
    let out = create_output(path)?;

    if let &[delim] = opts.sep.as_bytes() {
        let mut w = csv::WriterBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .from_writer(out);
        if opts.header {
            w.write_record(frame.columns())?;
        }
        for i in 0..frame.n_rows() {
            w.write_record(frame.row(i).into_iter().map(cell))?;
        }
        w.flush().map_err(|e| Error::io(format!("flush {}", path.display()), e))?;
    } else {
        let mut w = out;
        let ctx = |e| Error::io(format!("write {}", path.display()), e);
        if opts.header {
            writeln!(w, "{}", frame.columns().join(&opts.sep)).map_err(ctx)?;
        }
        for i in 0..frame.n_rows() {
            let line: Vec<String> = frame.row(i).into_iter().map(cell).collect();
            writeln!(w, "{}", line.join(&opts.sep)).map_err(ctx)?;
        }
        w.flush().map_err(ctx)?;
    }
    info!(path = %path.display(), rows = frame.n_rows(), "transactions table written");
    Ok(path.to_path_buf())
}
