//! Train/validation/test partitioning.
//!
//! A splitter labels every row with exactly one [`SplitKind`]; the result holds one
//! [`DataRec`] per non-empty label, each extended with the same `split` step. Random
//! splitters draw from a seeded [`StdRng`](rand::rngs::StdRng), so the same input,
//! parameters and seed always yield the same partition.

pub mod leave_out;
pub mod random;
pub mod temporal;

pub use leave_out::{LeaveNLast, LeaveNOut, LeaveOneLast, LeaveOneOut, LeaveRatioLast, LeaveRatioOut};
pub use random::{RandomHoldOut, UserStratifiedHoldOut};
pub use temporal::{TemporalHoldOut, TemporalThresholdSplit};

use crate::datarec::DataRec;
use crate::error::{Error, Result};
use crate::pipeline::{Step, StepName, to_params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Val,
    Test,
}

impl SplitKind {
    pub const ALL: [Self; 3] = [Self::Train, Self::Val, Self::Test];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty splits keyed by kind.
pub type SplitResult = BTreeMap<SplitKind, DataRec>;

pub trait Splitter: Serialize + DeserializeOwned {
    /// Operation name recorded in the pipeline.
    const NAME: &'static str;

    /// Reject invalid parameters.
    ///
    /// # Errors
    /// Returns a usage error describing the invalid parameter.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// One label per input row.
    ///
    /// # Errors
    /// Returns a schema error when a required role is missing.
    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>>;

    /// Order in which rows appear inside each split; input order by default.
    ///
    /// # Errors
    /// Returns a schema error when a required role is missing.
    fn row_order(&self, data: &DataRec) -> Result<Vec<usize>> {
        Ok((0..data.len()).collect())
    }

    /// Partition `data`.
    ///
    /// # Errors
    /// See [`Splitter::validate`] and [`Splitter::assign`].
    fn split(&self, data: &DataRec) -> Result<SplitResult> {
        self.validate()?;
        let labels = self.assign(data)?;
        let order = self.row_order(data)?;
        let step = Step::new(StepName::Split, Self::NAME, to_params(self)?);
        let mut out = SplitResult::new();
        for kind in SplitKind::ALL {
            let rows: Vec<usize> = order.iter().copied().filter(|&i| labels[i] == kind).collect();
            if rows.is_empty() {
                continue;
            }
            debug!(splitter = Self::NAME, split = %kind, rows = rows.len(), "split");
            let part = data.derive(data.frame().take(&rows), data.roles().clone(), step.clone())?;
            out.insert(kind, part);
        }
        Ok(out)
    }
}

pub(crate) const fn default_seed() -> u64 {
    42
}

/// Check a `(test, val)` ratio pair.
pub(crate) fn check_ratios(test_ratio: f64, val_ratio: f64) -> Result<()> {
    for (name, r) in [("test_ratio", test_ratio), ("val_ratio", val_ratio)] {
        if !(0.0..=1.0).contains(&r) {
            return Err(Error::Usage(format!("{name} must be in [0, 1], got {r}")));
        }
    }
    if test_ratio + val_ratio > 1.0 + f64::EPSILON {
        return Err(Error::Usage(format!(
            "test_ratio + val_ratio must not exceed 1, got {}",
            test_ratio + val_ratio
        )));
    }
    Ok(())
}

/// `round(ratio * n)`, clamped to `n`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn ratio_count(ratio: f64, n: usize) -> usize {
    ((ratio * n as f64).round() as usize).min(n)
}

/// Label `rows` (already in selection order): the first `n_test` go to test, the next
/// `n_val` to validation, the rest to train.
pub(crate) fn label_in_order(labels: &mut [SplitKind], rows: &[usize], n_test: usize, n_val: usize) {
    let n_test = n_test.min(rows.len());
    let n_val = n_val.min(rows.len() - n_test);
    for (k, &i) in rows.iter().enumerate() {
        labels[i] = if k < n_test {
            SplitKind::Test
        } else if k < n_test + n_val {
            SplitKind::Val
        } else {
            SplitKind::Train
        };
    }
}
