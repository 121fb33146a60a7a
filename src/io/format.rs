//! Format tags used by registry resources and pipeline steps, with dispatch to the
//! matching reader and writer.

use crate::datarec::DataRec;
use crate::error::{Error, Result};
use crate::io::{block, json, sequence, sequence_json, tabular};
use crate::pipeline::{Params, from_params};
use crate::rawdata::{AsRawData, RawData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    TransactionsTabular,
    TransactionsJson,
    TransactionsJsonl,
    TransactionsBlocks,
    SequenceTabularInline,
    SequenceTabularWide,
    SequenceTabularImplicit,
    SequenceJson,
    SequenceJsonArray,
    SequenceJsonItems,
}

impl Format {
    pub const ALL: [Self; 10] = [
        Self::TransactionsTabular,
        Self::TransactionsJson,
        Self::TransactionsJsonl,
        Self::TransactionsBlocks,
        Self::SequenceTabularInline,
        Self::SequenceTabularWide,
        Self::SequenceTabularImplicit,
        Self::SequenceJson,
        Self::SequenceJsonArray,
        Self::SequenceJsonItems,
    ];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::TransactionsTabular => "transactions_tabular",
            Self::TransactionsJson => "transactions_json",
            Self::TransactionsJsonl => "transactions_jsonl",
            Self::TransactionsBlocks => "transactions_blocks",
            Self::SequenceTabularInline => "sequence_tabular_inline",
            Self::SequenceTabularWide => "sequence_tabular_wide",
            Self::SequenceTabularImplicit => "sequence_tabular_implicit",
            Self::SequenceJson => "sequence_json",
            Self::SequenceJsonArray => "sequence_json_array",
            Self::SequenceJsonItems => "sequence_json_items",
        }
    }

    /// Pipeline operation name of the reader, e.g. `read_transactions_tabular`.
    #[must_use]
    pub fn reader_operation(self) -> String {
        format!("read_{}", self.tag())
    }

    /// Pipeline operation name of the writer, e.g. `write_transactions_tabular`.
    #[must_use]
    pub fn writer_operation(self) -> String {
        format!("write_{}", self.tag())
    }

    /// Format whose reader is named `operation`.
    #[must_use]
    pub fn from_reader_operation(operation: &str) -> Option<Self> {
        operation
            .strip_prefix("read_")
            .and_then(|t| t.parse().ok())
    }

    /// Format whose writer is named `operation`.
    #[must_use]
    pub fn from_writer_operation(operation: &str) -> Option<Self> {
        operation
            .strip_prefix("write_")
            .and_then(|t| t.parse().ok())
    }

    /// Parse `path` with reader options deserialized from `params`.
    ///
    /// # Errors
    /// Returns a configuration error for invalid options, then whatever the reader
    /// reports.
    pub fn read_raw(self, path: &Path, params: &Params) -> Result<RawData> {
        match self {
            Self::TransactionsTabular => {
                tabular::read_transactions_tabular_raw(path, &from_params(params)?)
            }
            Self::TransactionsJson => json::read_transactions_json_raw(path, &from_params(params)?),
            Self::TransactionsJsonl => {
                json::read_transactions_jsonl_raw(path, &from_params(params)?)
            }
            Self::TransactionsBlocks => {
                block::read_transactions_blocks_raw(path, &from_params(params)?)
            }
            Self::SequenceTabularInline => {
                sequence::read_sequence_tabular_inline_raw(path, &from_params(params)?)
            }
            Self::SequenceTabularWide => {
                sequence::read_sequence_tabular_wide_raw(path, &from_params(params)?)
            }
            Self::SequenceTabularImplicit => {
                sequence::read_sequence_tabular_implicit_raw(path, &from_params(params)?)
            }
            Self::SequenceJson => sequence_json::read_sequence_json_raw(path, &from_params(params)?),
            Self::SequenceJsonArray => {
                sequence_json::read_sequence_json_array_raw(path, &from_params(params)?)
            }
            Self::SequenceJsonItems => {
                sequence_json::read_sequence_json_items_raw(path, &from_params(params)?)
            }
        }
    }

    /// Like [`Format::read_raw`], returning a dataset whose lineage is the `read` step.
    ///
    /// # Errors
    /// See [`Format::read_raw`].
    pub fn read(self, path: &Path, params: &Params) -> Result<DataRec> {
        match self {
            Self::TransactionsTabular => {
                tabular::read_transactions_tabular(path, &from_params(params)?)
            }
            Self::TransactionsJson => json::read_transactions_json(path, &from_params(params)?),
            Self::TransactionsJsonl => json::read_transactions_jsonl(path, &from_params(params)?),
            Self::TransactionsBlocks => {
                block::read_transactions_blocks(path, &from_params(params)?)
            }
            Self::SequenceTabularInline => {
                sequence::read_sequence_tabular_inline(path, &from_params(params)?)
            }
            Self::SequenceTabularWide => {
                sequence::read_sequence_tabular_wide(path, &from_params(params)?)
            }
            Self::SequenceTabularImplicit => {
                sequence::read_sequence_tabular_implicit(path, &from_params(params)?)
            }
            Self::SequenceJson => sequence_json::read_sequence_json(path, &from_params(params)?),
            Self::SequenceJsonArray => {
                sequence_json::read_sequence_json_array(path, &from_params(params)?)
            }
            Self::SequenceJsonItems => {
                sequence_json::read_sequence_json_items(path, &from_params(params)?)
            }
        }
    }

    /// Write `data` to `path` with writer options deserialized from `params`.
    ///
    /// # Errors
    /// Returns a configuration error for invalid options, then whatever the writer
    /// reports.
    pub fn write(self, data: &impl AsRawData, path: &Path, params: &Params) -> Result<PathBuf> {
        match self {
            Self::TransactionsTabular => {
                tabular::write_transactions_tabular(data, path, &from_params(params)?)
            }
            Self::TransactionsJson => json::write_transactions_json(data, path, &from_params(params)?),
            Self::TransactionsJsonl => {
                json::write_transactions_jsonl(data, path, &from_params(params)?)
            }
            Self::TransactionsBlocks => {
                block::write_transactions_blocks(data, path, &from_params(params)?)
            }
            Self::SequenceTabularInline => {
                sequence::write_sequence_tabular_inline(data, path, &from_params(params)?)
            }
            Self::SequenceTabularWide => {
                sequence::write_sequence_tabular_wide(data, path, &from_params(params)?)
            }
            Self::SequenceTabularImplicit => {
                sequence::write_sequence_tabular_implicit(data, path, &from_params(params)?)
            }
            Self::SequenceJson => {
                sequence_json::write_sequence_json(data, path, &from_params(params)?)
            }
            Self::SequenceJsonArray => {
                sequence_json::write_sequence_json_array(data, path, &from_params(params)?)
            }
            Self::SequenceJsonItems => {
                sequence_json::write_sequence_json_items(data, path, &from_params(params)?)
            }
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.tag() == s)
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
