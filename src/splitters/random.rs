use crate::datarec::{DataRec, Role};
use crate::error::Result;
use crate::processing::require_role;
use crate::splitters::{SplitKind, Splitter, check_ratios, default_seed, label_in_order, ratio_count};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Uniform hold-out over all rows.
///
/// `round(test_ratio * n)` rows go to test and `round(val_ratio * n)` of the remaining
/// rows to validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomHoldOut {
    #[serde(default)]
    pub test_ratio: f64,
    #[serde(default)]
    pub val_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl RandomHoldOut {
    #[must_use]
    pub const fn new(test_ratio: f64, val_ratio: f64, seed: u64) -> Self {
        Self {
            test_ratio,
            val_ratio,
            seed,
        }
    }
}

impl Splitter for RandomHoldOut {
    const NAME: &'static str = "RandomHoldOut";

    fn validate(&self) -> Result<()> {
        check_ratios(self.test_ratio, self.val_ratio)
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let n = data.len();
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut StdRng::seed_from_u64(self.seed));
        let mut labels = vec![SplitKind::Train; n];
        label_in_order(
            &mut labels,
            &rows,
            ratio_count(self.test_ratio, n),
            ratio_count(self.val_ratio, n),
        );
        Ok(labels)
    }
}

/// [`RandomHoldOut`] applied to every user's rows, so each user appears in train.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserStratifiedHoldOut {
    #[serde(default)]
    pub test_ratio: f64,
    #[serde(default)]
    pub val_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl UserStratifiedHoldOut {
    #[must_use]
    pub const fn new(test_ratio: f64, val_ratio: f64, seed: u64) -> Self {
        Self {
            test_ratio,
            val_ratio,
            seed,
        }
    }
}

impl Splitter for UserStratifiedHoldOut {
    const NAME: &'static str = "UserStratifiedHoldOut";

    fn validate(&self) -> Result<()> {
        check_ratios(self.test_ratio, self.val_ratio)
    }

    fn assign(&self, data: &DataRec) -> Result<Vec<SplitKind>> {
        let user_col = require_role(data, Role::User, Self::NAME)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut labels = vec![SplitKind::Train; data.len()];
        for (_, mut rows) in data.frame().group_indices(user_col)? {
            let n = rows.len();
            rows.shuffle(&mut rng);
            label_in_order(
                &mut labels,
                &rows,
                ratio_count(self.test_ratio, n),
                ratio_count(self.val_ratio, n),
            );
        }
        Ok(labels)
    }
}
