//! Pure transformations of a [`DataRec`].
//!
//! A processor is a serde struct whose fields are its parameters. [`Processor::process`]
//! never touches its input; it returns a new value whose pipeline gains one `process`
//! step with the processor name and the serialized struct as `params`, so replay can
//! rebuild the same processor from YAML.

pub mod binarize;
pub mod filters;
pub mod kcore;

pub use binarize::{Binarize, Keep};
pub use filters::{
    ColdFilter, DuplicateKeep, EntityMode, FilterByRatingThreshold, FilterByTime,
    FilterByUserMeanRating, FilterOutDuplicatedInteractions, TimeBound,
};
pub use kcore::{
    Cores, ItemKCore, IterativeKCore, NRoundsKCore, UserItemIterativeKCore, UserItemNRoundsKCore,
    UserKCore,
};

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::pipeline::{Step, StepName, to_params};
use crate::rawdata::Roles;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub trait Processor: Serialize + DeserializeOwned {
    /// Operation name recorded in the pipeline.
    const NAME: &'static str;

    /// Reject invalid parameter combinations.
    ///
    /// # Errors
    /// Returns a usage error describing the invalid parameter.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Compute the output table and roles.
    ///
    /// # Errors
    /// Returns a schema error when a required role is missing.
    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)>;

    /// Apply the processor, extending the lineage by one step.
    ///
    /// # Errors
    /// See [`Processor::validate`] and [`Processor::transform`].
    fn process(&self, data: &DataRec) -> Result<DataRec> {
        self.validate()?;
        let (frame, roles) = self.transform(data)?;
        debug!(
            processor = Self::NAME,
            rows_in = data.len(),
            rows_out = frame.n_rows(),
            "processed"
        );
        let step = Step::new(StepName::Process, Self::NAME, to_params(self)?);
        data.derive(frame, roles, step)
    }
}

/// The column for `role`, or a schema error naming the processor.
pub(crate) fn require_role<'a>(data: &'a DataRec, role: Role, who: &str) -> Result<&'a str> {
    data.role_col(role).ok_or_else(|| {
        Error::Schema(format!(
            "{who} requires a {} column",
            role.canonical()
        ))
    })
}

/// Rows of `data` selected by `mask`, roles unchanged.
pub(crate) fn keep_rows(data: &DataRec, mask: &[bool]) -> (Frame, Roles) {
    (data.frame().filter(mask), data.roles().clone())
}
