//! Per-user leave-out splitters.
//!
//! The `*Out` family picks held-out rows uniformly at random within each user; the
//! `*Last` family holds out each user's most recent rows, breaking timestamp ties with
//! the seeded generator. Users are visited in first-appearance order with a single
//! generator, so results depend only on the input order and the seed.

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::processing::require_role;
use crate::splitters::{SplitKind, Splitter, check_ratios, default_seed, label_in_order, ratio_count};
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// How many rows of a user go to test and validation.
#[derive(Clone, Copy)]
enum Quota {
    Fixed { test: usize, val: usize },
    Ratio { test: f64, val: f64 },
}

impl Quota {
    fn counts(self, n: usize) -> (usize, usize) {
        match self {
            Self::Fixed { test, val } => (test, val),
            Self::Ratio { test, val } => (ratio_count(test, n), ratio_count(val, n)),
        }
    }
}

/// Label every user's rows. `latest` selects the most recent rows first instead of
/// random ones.
fn leave_out(data: &DataRec, who: &str, quota: Quota, seed: u64, latest: bool) -> Result<Vec<SplitKind>> {
    let user_col = require_role(data, Role::User, who)?;
    let ts = if latest {
        let col = require_role(data, Role::Timestamp, who)?;
        let ts = data
            .frame()
            .require(col)?
            .iter()
            .enumerate()
            .map(|(i, t)| {
                t.as_timestamp()
                    .ok_or_else(|| Error::Schema(format!("row {i}: timestamp {t:?} is not a time")))
            })
            .collect::<Result<Vec<f64>>>()?;
        Some(ts)
    } else {
        None
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels = vec![SplitKind::Train; data.len()];
    for (_, mut rows) in data.frame().group_indices(user_col)? {
        rows.shuffle(&mut rng);
        if let Some(ts) = &ts {
            // stable: equal timestamps keep their shuffled order
            rows.sort_by_key(|&i| Reverse(OrderedFloat(ts[i])));
        }
        let (n_test, n_val) = quota.counts(rows.len());
        label_in_order(&mut labels, &rows, n_test, n_val);
    }
    Ok(labels)
}

/// Hold out `test_n` random rows per user for test and `validation_n` for validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveNOut {
    #[serde(default)]
    pub test_n: usize,
    #[serde(default)]
    pub validation_n: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LeaveNOut {
    #[must_use]
    pub const fn new(test_n: usize, validation_n: usize, seed: u64) -> Self {
        Self {
            test_n,
            validation_n,
            seed,
        }
    }
}

impl Splitter for LeaveNOut {
    const NAME: &'static str = "LeaveNOut";

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Fixed {
            test: self.test_n,
            val: self.validation_n,
        };
        leave_out(data, Self::NAME, quota, self.seed, false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOneOut {
    #[serde(default = "yes")]
    pub test: bool,
    #[serde(default)]
    pub validation: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn yes() -> bool {
    true
}

impl LeaveOneOut {
    #[must_use]
    pub const fn new(test: bool, validation: bool, seed: u64) -> Self {
        Self {
            test,
            validation,
            seed,
        }
    }
}

impl Splitter for LeaveOneOut {
    const NAME: &'static str = "LeaveOneOut";

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Fixed {
            test: usize::from(self.test),
            val: usize::from(self.validation),
        };
        leave_out(data, Self::NAME, quota, self.seed, false)
    }
}

/// Hold out `round(ratio * rows)` random rows of every user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaveRatioOut {
    #[serde(default)]
    pub test_ratio: f64,
    #[serde(default)]
    pub val_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LeaveRatioOut {
    #[must_use]
    pub const fn new(test_ratio: f64, val_ratio: f64, seed: u64) -> Self {
        Self {
            test_ratio,
            val_ratio,
            seed,
        }
    }
}

impl Splitter for LeaveRatioOut {
    const NAME: &'static str = "LeaveRatioOut";

    fn validate(&self) -> Result<()> {
        check_ratios(self.test_ratio, self.val_ratio)
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Ratio {
            test: self.test_ratio,
            val: self.val_ratio,
        };
        leave_out(data, Self::NAME, quota, self.seed, false)
    }
}

/// Hold out each user's `test_n` most recent rows for test, then the next
/// `validation_n` for validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveNLast {
    #[serde(default)]
    pub test_n: usize,
    #[serde(default)]
    pub validation_n: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LeaveNLast {
    #[must_use]
    pub const fn new(test_n: usize, validation_n: usize, seed: u64) -> Self {
        Self {
            test_n,
            validation_n,
            seed,
        }
    }
}

impl Splitter for LeaveNLast {
    const NAME: &'static str = "LeaveNLast";

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Fixed {
            test: self.test_n,
            val: self.validation_n,
        };
        leave_out(data, Self::NAME, quota, self.seed, true)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOneLast {
    #[serde(default = "yes")]
    pub test: bool,
    #[serde(default)]
    pub validation: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LeaveOneLast {
    #[must_use]
    pub const fn new(test: bool, validation: bool, seed: u64) -> Self {
        Self {
            test,
            validation,
            seed,
        }
    }
}

impl Splitter for LeaveOneLast {
    const NAME: &'static str = "LeaveOneLast";

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Fixed {
            test: usize::from(self.test),
            val: usize::from(self.validation),
        };
        leave_out(data, Self::NAME, quota, self.seed, true)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaveRatioLast {
    #[serde(default)]
    pub test_ratio: f64,
    #[serde(default)]
    pub val_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl LeaveRatioLast {
    #[must_use]
    pub const fn new(test_ratio: f64, val_ratio: f64, seed: u64) -> Self {
        Self {
            test_ratio,
            val_ratio,
            seed,
        }
    }
}

impl Splitter for LeaveRatioLast {
    const NAME: &'static str = "LeaveRatioLast";

    fn validate(&self) -> Result<()> {
        check_ratios(self.test_ratio, self.val_ratio)
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let quota = Quota::Ratio {
            test: self.test_ratio,
            val: self.val_ratio,
        };
        leave_out(data, Self::NAME, quota, self.seed, true)
    }
}
