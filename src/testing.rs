//! Testing utilities for dataset pipelines.
//!
//! - **Builders**: small interaction tables assembled row by row
//! - **Fixtures**: the fixed tables used by the seeded scenarios
//! - **Assertions**: split partitions and pipeline lineage
//! - **Scratch I/O**: temporary data directories and scoped cache roots
//!
//! # Quick Start
//!
//! ```
//! use datarec::processing::{Binarize, Keep, Processor};
//! use datarec::testing::*;
//!
//! # fn main() -> datarec::Result<()> {
//! let data = InteractionsBuilder::new()
//!     .add_rated(1, 10, 2.5)
//!     .add_rated(2, 20, 3.5)
//!     .build()?;
//!
//! let out = Binarize::new(3.0).keep(Keep::Positive).process(&data)?;
//! assert_lineage_extends(&data, &out, datarec::StepName::Process, "Binarize");
//! assert_eq!(out.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Cache isolation
//!
//! The cache root is process-wide. [`TempCache`] points it at a fresh temporary
//! directory and holds a lock for its lifetime, so tests that touch the cache run one
//! at a time even when the harness runs tests on several threads.

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use mock_io::*;
