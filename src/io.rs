//! Format readers and writers.
//!
//! Every format has a `read_*` entry point returning a [`DataRec`] whose pipeline starts
//! with a `read` step, a `read_*_raw` twin returning the bare [`RawData`], and a
//! `write_*` counterpart accepting anything that implements [`AsRawData`].

pub mod block;
pub mod columns;
pub mod compression;
pub(crate) mod delimited;
pub mod format;
pub mod json;
pub mod sequence;
pub mod sequence_json;
pub mod tabular;

pub use block::{BlockBy, BlockOptions, BlockWriteOptions, EventLayout};
pub use block::{read_transactions_blocks, read_transactions_blocks_raw, write_transactions_blocks};
pub use columns::ColumnRef;
pub use delimited::Engine;
pub use format::Format;
pub use json::{JsonOptions, JsonWriteOptions};
pub use json::{
    read_transactions_json, read_transactions_json_raw, read_transactions_jsonl,
    read_transactions_jsonl_raw, write_transactions_json, write_transactions_jsonl,
};
pub use sequence::{
    ImplicitOptions, InlineOptions, InlineWriteOptions, SequenceWriteOptions, WideOptions,
};
pub use sequence::{
    read_sequence_tabular_implicit, read_sequence_tabular_implicit_raw,
    read_sequence_tabular_inline, read_sequence_tabular_inline_raw, read_sequence_tabular_wide,
    read_sequence_tabular_wide_raw, write_sequence_tabular_implicit,
    write_sequence_tabular_inline, write_sequence_tabular_wide,
};
pub use sequence_json::{SequenceJsonOptions, SequenceJsonWriteOptions};
pub use sequence_json::{
    read_sequence_json, read_sequence_json_array, read_sequence_json_array_raw,
    read_sequence_json_items, read_sequence_json_items_raw, read_sequence_json_raw,
    write_sequence_json, write_sequence_json_array, write_sequence_json_items,
};
pub use tabular::{TabularOptions, TabularWriteOptions};
pub use tabular::{read_transactions_tabular, read_transactions_tabular_raw, write_transactions_tabular};

use crate::datarec::DataRec;
use crate::encoder::IncrementalEncoder;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::pipeline::{Pipeline, StepName, to_params};
use crate::rawdata::{AsRawData, RawData, Roles};
use crate::value::Value;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub(crate) const DEFAULT_CHUNKSIZE: usize = 100_000;

/// Wrap reader output into a [`DataRec`] whose lineage is a single `read` step.
pub(crate) fn wrap_read<O: Serialize>(
    raw: RawData,
    path: &Path,
    operation: &str,
    options: &O,
) -> Result<DataRec> {
    let mut params = to_params(options)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    params.insert("filename".into(), serde_yaml::Value::String(filename));
    let mut pipeline = Pipeline::new();
    pipeline.add_step(StepName::Read, operation, params)?;
    DataRec::new(raw, Some(pipeline))
}

/// Identifier encoders shared across the chunks of one read.
#[derive(Debug, Default)]
pub(crate) struct ChunkEncoders {
    user: IncrementalEncoder,
    item: IncrementalEncoder,
}

impl ChunkEncoders {
    /// Replace the user and item columns of `frame` with their codes.
    pub fn encode(&mut self, frame: &mut Frame, roles: &Roles) -> Result<()> {
        for (col, enc) in [
            (roles.user.as_deref(), &mut self.user),
            (roles.item.as_deref(), &mut self.item),
        ] {
            let Some(col) = col else { continue };
            let codes: Vec<Value> = frame
                .require(col)?
                .iter()
                .map(|v| Value::Int(enc.encode_or_insert(v)))
                .collect();
            frame.set_column(col, codes)?;
        }
        Ok(())
    }

    pub fn finish(self, raw: RawData) -> RawData {
        raw.with_encoders(Some(self.user), Some(self.item))
    }
}

/// Collects per-chunk frames, encoding them as they arrive when requested.
pub(crate) struct ChunkSink {
    roles: Roles,
    encoders: Option<ChunkEncoders>,
    frames: Vec<Frame>,
}

impl ChunkSink {
    pub fn new(roles: Roles, encode_ids: bool) -> Self {
        Self {
            roles,
            encoders: encode_ids.then(ChunkEncoders::default),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, mut frame: Frame) -> Result<()> {
        if let Some(enc) = self.encoders.as_mut() {
            enc.encode(&mut frame, &self.roles)?;
        }
        debug!(chunk = self.frames.len(), rows = frame.n_rows(), "chunk parsed");
        self.frames.push(frame);
        Ok(())
    }

    /// Concatenate the chunks in read order.
    pub fn finish(self, names: &[&str]) -> Result<RawData> {
        let mut frame = Frame::concat(self.frames)?;
        if frame.n_cols() == 0 {
            frame = Frame::from_columns(names.iter().map(|n| (*n, Vec::new())).collect())?;
        }
        let raw = RawData::new(frame, self.roles);
        Ok(match self.encoders {
            Some(enc) => enc.finish(raw),
            None => raw,
        })
    }
}

/// Role columns prepared for a writer: decoded, optionally renamed, restricted to the
/// requested roles.
pub(crate) struct Projection {
    pub frame: Frame,
    pub user: String,
    pub item: String,
    pub rating: Option<String>,
    pub timestamp: Option<String>,
}

/// Output column names requested by a writer.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Renames<'a> {
    pub user: Option<&'a str>,
    pub item: Option<&'a str>,
    pub rating: Option<&'a str>,
    pub timestamp: Option<&'a str>,
}

fn include(requested: Option<bool>, present: bool, what: &str) -> Result<bool> {
    match requested {
        Some(true) if !present => Err(Error::Usage(format!(
            "cannot include {what}: the data has no {what} column"
        ))),
        Some(flag) => Ok(flag),
        None => Ok(present),
    }
}

/// Build a [`Projection`] of `data`.
///
/// `None` inclusion flags mean "include when present".
///
/// # Errors
/// Returns a usage error if an inclusion is requested for an absent role, or a schema
/// error if the user/item role is missing.
pub(crate) fn project(
    data: &impl AsRawData,
    include_rating: Option<bool>,
    include_timestamp: Option<bool>,
    renames: Renames<'_>,
) -> Result<Projection> {
    let RawData {
        frame,
        roles,
        user_encoder,
        item_encoder,
    } = data.to_rawdata();
    let (Some(user), Some(item)) = (roles.user.clone(), roles.item.clone()) else {
        return Err(Error::Schema("data has no user/item columns to write".into()));
    };
    let with_rating = include(include_rating, roles.rating.is_some(), "rating")?;
    let with_ts = include(include_timestamp, roles.timestamp.is_some(), "timestamp")?;

    let mut out = Frame::new();
    let mut push = |src: &str, values: Vec<Value>, rename: Option<&str>| -> Result<String> {
        let name = rename.unwrap_or(src).to_string();
        out.push_column(name.clone(), values)?;
        Ok(name)
    };
    let users = frame.require(&user)?;
    let users = match &user_encoder {
        Some(enc) => enc.decode_column(users)?,
        None => users.to_vec(),
    };
    let items = frame.require(&item)?;
    let items = match &item_encoder {
        Some(enc) => enc.decode_column(items)?,
        None => items.to_vec(),
    };
    let user = push(&user, users, renames.user)?;
    let item = push(&item, items, renames.item)?;
    let rating = match (&roles.rating, with_rating) {
        (Some(r), true) => Some(push(r, frame.require(r)?.to_vec(), renames.rating)?),
        _ => None,
    };
    let timestamp = match (&roles.timestamp, with_ts) {
        (Some(t), true) => Some(push(t, frame.require(t)?.to_vec(), renames.timestamp)?),
        _ => None,
    };
    Ok(Projection {
        frame: out,
        user,
        item,
        rating,
        timestamp,
    })
}

/// Text form of a cell for delimited outputs.
pub(crate) fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a token into a cell, mapping empty tokens to null.
pub(crate) fn token(s: &str) -> Value {
    if s.is_empty() {
        Value::Null
    } else {
        Value::infer(s)
    }
}
