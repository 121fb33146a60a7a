use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::processing::{Processor, require_role};
use crate::rawdata::Roles;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Which rows survive binarization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    /// `rating >= threshold`
    Positive,
    /// `rating < threshold`
    Negative,
    All,
}

/// Turn explicit ratings into implicit feedback.
///
/// Rows are filtered according to `keep`, then the rating column is either dropped or
/// rewritten to `over_threshold` / `under_threshold`. The legacy `implicit: true` flag
/// means `keep: positive, drop_rating_col: true` when neither is given explicitly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binarize {
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep: Option<Keep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_rating_col: Option<bool>,
    pub over_threshold: f64,
    pub under_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit: Option<bool>,
}

impl Default for Binarize {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            keep: None,
            drop_rating_col: None,
            over_threshold: 1.0,
            under_threshold: 0.0,
            implicit: None,
        }
    }
}

impl Binarize {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn keep(mut self, keep: Keep) -> Self {
        self.keep = Some(keep);
        self
    }

    #[must_use]
    pub const fn drop_rating_col(mut self, drop: bool) -> Self {
        self.drop_rating_col = Some(drop);
        self
    }

    #[must_use]
    pub const fn implicit(mut self, implicit: bool) -> Self {
        self.implicit = Some(implicit);
        self
    }

    /// Effective `(keep, drop_rating_col)` after applying the legacy flag.
    #[must_use]
    pub fn resolved(&self) -> (Keep, bool) {
        let legacy = self.implicit == Some(true);
        let keep = self
            .keep
            .unwrap_or(if legacy { Keep::Positive } else { Keep::All });
        let drop = self.drop_rating_col.unwrap_or(legacy);
        (keep, drop)
    }
}

fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        #[allow(clippy::cast_possible_truncation)]
        Value::Int(v as i64)
    } else {
        Value::float(v)
    }
}

impl Processor for Binarize {
    const NAME: &'static str = "Binarize";

    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::Usage(format!("threshold must be finite, got {}", self.threshold)));
        }
        Ok(())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let rating_col = require_role(data, Role::Rating, Self::NAME)?;
        let ratings = data.frame().require(rating_col)?;
        let (keep, drop) = self.resolved();
        let over: Vec<bool> = ratings
            .iter()
            .map(|r| r.as_f64().is_some_and(|x| x >= self.threshold))
            .collect();
        let mask: Vec<bool> = over
            .iter()
            .map(|&o| match keep {
                Keep::Positive => o,
                Keep::Negative => !o,
                Keep::All => true,
            })
            .collect();
        let mut frame = data.frame().filter(&mask);
        let mut roles = data.roles().clone();
        if drop {
            frame.drop_column(rating_col);
            roles.rating = None;
        } else {
            let rewritten = over
                .iter()
                .zip(&mask)
                .filter(|(_, keep)| **keep)
                .map(|(&o, _)| number(if o { self.over_threshold } else { self.under_threshold }))
                .collect();
            frame.set_column(rating_col, rewritten)?;
        }
        Ok((frame, roles))
    }
}
