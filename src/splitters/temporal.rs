use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::processing::{TimeBound, require_role};
use crate::splitters::{SplitKind, Splitter, check_ratios, label_in_order, ratio_count};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Epoch seconds of every row.
fn timestamps(data: &DataRec, who: &str) -> Result<Vec<f64>> {
    let col = require_role(data, Role::Timestamp, who)?;
    data.frame()
        .require(col)?
        .iter()
        .enumerate()
        .map(|(i, t)| {
            t.as_timestamp()
                .ok_or_else(|| Error::Schema(format!("row {i}: timestamp {t:?} is not a time")))
        })
        .collect()
}

/// Row indices sorted by timestamp ascending, ties in input order.
fn chronological(ts: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ts.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(ts[i]));
    order
}

/// Global temporal hold-out: the oldest rows train, the newest test.
///
/// Splits are returned in timestamp order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalHoldOut {
    #[serde(default)]
    pub test_ratio: f64,
    #[serde(default)]
    pub val_ratio: f64,
}

impl TemporalHoldOut {
    #[must_use]
    pub const fn new(test_ratio: f64, val_ratio: f64) -> Self {
        Self {
            test_ratio,
            val_ratio,
        }
    }
}

impl Splitter for TemporalHoldOut {
    const NAME: &'static str = "TemporalHoldOut";

    fn validate(&self) -> Result<()> {
        check_ratios(self.test_ratio, self.val_ratio)
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let ts = timestamps(data, Self::NAME)?;
        let n = ts.len();
        let mut newest_first = chronological(&ts);
        newest_first.reverse();
        let n_test = ratio_count(self.test_ratio, n);
        let n_val = ratio_count(self.val_ratio, n).min(n - n_test);
        let mut labels = vec![SplitKind::Train; n];
        label_in_order(&mut labels, &newest_first, n_test, n_val);
        Ok(labels)
    }

    fn row_order(&self, data: &DataRec) -> Result<Vec<usize>> {
        Ok(chronological(&timestamps(data, Self::NAME)?))
    }
}

/// Bucket rows by fixed time thresholds:
/// `t < val_threshold` train, `val_threshold <= t < test_threshold` val, the rest test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalThresholdSplit {
    pub val_threshold: TimeBound,
    pub test_threshold: TimeBound,
}

impl TemporalThresholdSplit {
    #[must_use]
    pub const fn new(val_threshold: TimeBound, test_threshold: TimeBound) -> Self {
        Self {
            val_threshold,
            test_threshold,
        }
    }

    fn bounds(&self) -> Result<(f64, f64)> {
        Ok((self.val_threshold.seconds()?, self.test_threshold.seconds()?))
    }
}

impl Splitter for TemporalThresholdSplit {
    const NAME: &'static str = "TemporalThresholdSplit";

    fn validate(&self) -> Result<()> {
        let (val, test) = self.bounds()?;
        if val >= test {
            return Err(Error::Usage(format!(
                "val_threshold ({val}) must be lower than test_threshold ({test})"
            )));
        }
        Ok(())
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let (val, test) = self.bounds()?;
        Ok(timestamps(data, Self::NAME)?
            .into_iter()
            .map(|t| {
                if t < val {
                    SplitKind::Train
                } else if t < test {
                    SplitKind::Val
                } else {
                    SplitKind::Test
                }
            })
            .collect())
    }
}
