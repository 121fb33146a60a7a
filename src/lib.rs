//! # datarec
//!
//! Reproducible dataset preparation for recommender-systems research.
//!
//! The crate covers the path from a public interaction dataset to the files an
//! experiment consumes:
//!
//! - **Registry** - YAML descriptors name each dataset version, where its bytes come
//!   from and how to parse them
//! - **Acquisition** - download, checksum verification and archive extraction into a
//!   relocatable cache directory
//! - **Readers and writers** - delimited, JSON, block-grouped and sequence layouts,
//!   transparently compressed
//! - **Processing** - binarization, k-core filtering, rating, time and duplicate filters
//! - **Splitting** - random, stratified, temporal and leave-out train/val/test splits
//! - **Pipelines** - every transformation appends a step to a YAML-serializable
//!   lineage that can be replayed to rebuild the artifact
//!
//! ## Quick Start
//!
//! ```no_run
//! use datarec::processing::{Binarize, Processor};
//! use datarec::splitters::{RandomHoldOut, SplitKind, Splitter};
//! # fn main() -> datarec::Result<()> {
//!
//! let data = datarec::load_dataset("movielens", "100k")?;
//! let binary = Binarize::new(4.0).process(&data)?;
//! let splits = RandomHoldOut::new(0.2, 0.1, 42).split(&binary)?;
//!
//! // The train split remembers how it was made.
//! let train = &splits[&SplitKind::Train];
//! train.pipeline().to_yaml("pipeline.yml")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### DataRec
//!
//! A [`DataRec`] is an interaction table with four column roles (user, item, rating,
//! timestamp), two identifier encoders and the [`Pipeline`] that produced it. Values are
//! never mutated by transformations: processors and splitters return new values with
//! one more step in their lineage.
//!
//! ### Pipeline
//!
//! A [`Pipeline`] is an ordered list of [`Step`]s: `load` or `read` first, then any
//! number of `process` and `split` steps, then optionally one terminal `export` or
//! `write`. [`Pipeline::apply`] replays it, resolving `filename` parameters against the
//! folders passed in so a descriptor can be moved between machines.
//!
//! ### Cache
//!
//! Downloads, extracted archives and parsed snapshots live under a single cache root
//! (see [`cache`]), which can be relocated for a scope with [`cache::use_cache_dir`].
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` -
//!   transparent codecs for readers and writers, chosen by file extension
//! - `archive-zip`, `archive-tar`, `archive-7z` - source archive extraction
//! - `download` - HTTP transport with progress reporting
//!
//! All features are enabled by default.

pub mod cache;
pub mod characteristics;
pub mod datarec;
pub mod encoder;
pub mod error;
pub mod export;
pub mod frame;
pub mod graph;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod processing;
pub mod rawdata;
pub mod registry;
pub mod resources;
pub mod sources;
pub mod splitters;
pub mod task;
pub mod testing;
pub mod value;

// General re-exports
pub use characteristics::{Metric, Quartiles, Stats, register_characteristic};
pub use datarec::{DataRec, Role, Scope, from_snapshot};
pub use encoder::{Encoder, IncrementalEncoder};
pub use error::{Error, ErrorKind, Result};
pub use export::{Elliot, ExportInput, Exporter, RecBole};
pub use frame::Frame;
pub use graph::GraphRec;
pub use io::Format;
pub use pipeline::{Params, Pipeline, Replayed, Step, StepName};
pub use processing::Processor;
pub use rawdata::{AsRawData, RawData, Roles};
pub use registry::{DatasetVersion, Registry, load_dataset};
pub use splitters::{SplitKind, SplitResult, Splitter};
pub use task::{Task, TaskDataset};
pub use value::Value;
