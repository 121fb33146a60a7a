//! Row filters: cold entities, rating thresholds, duplicates, time windows.

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::processing::{Processor, keep_rows, require_role};
use crate::rawdata::Roles;
use crate::value::{Value, parse_iso8601};
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Entity side a filter counts over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityMode {
    #[default]
    User,
    Item,
}

impl EntityMode {
    const fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Item => Role::Item,
        }
    }
}

/// Keep rows of users (or items) with at most `interactions` rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColdFilter {
    pub interactions: usize,
    #[serde(default)]
    pub mode: EntityMode,
}

impl ColdFilter {
    #[must_use]
    pub const fn new(interactions: usize, mode: EntityMode) -> Self {
        Self { interactions, mode }
    }
}

impl Processor for ColdFilter {
    const NAME: &'static str = "ColdFilter";

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let col = require_role(data, self.mode.role(), Self::NAME)?;
        let values = data.frame().require(col)?;
        let mut counts: HashMap<&Value, usize> = HashMap::new();
        for v in values {
            *counts.entry(v).or_default() += 1;
        }
        let mask: Vec<bool> = values
            .iter()
            .map(|v| counts[v] <= self.interactions)
            .collect();
        Ok(keep_rows(data, &mask))
    }
}

/// Drop rows rated below `rating_threshold`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterByRatingThreshold {
    pub rating_threshold: f64,
}

impl FilterByRatingThreshold {
    /// # Errors
    /// Returns a usage error for a negative or non-finite threshold.
    pub fn new(rating_threshold: f64) -> Result<Self> {
        let f = Self { rating_threshold };
        f.validate()?;
        Ok(f)
    }
}

impl Processor for FilterByRatingThreshold {
    const NAME: &'static str = "FilterByRatingThreshold";

    fn validate(&self) -> Result<()> {
        if !self.rating_threshold.is_finite() || self.rating_threshold < 0.0 {
            return Err(Error::Usage(format!(
                "rating_threshold must be a non-negative number, got {}",
                self.rating_threshold
            )));
        }
        Ok(())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let col = require_role(data, Role::Rating, Self::NAME)?;
        let mask: Vec<bool> = data
            .frame()
            .require(col)?
            .iter()
            .map(|r| r.as_f64().is_some_and(|x| x >= self.rating_threshold))
            .collect();
        Ok(keep_rows(data, &mask))
    }
}

/// Drop rows rated below their user's mean rating.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterByUserMeanRating {}

impl FilterByUserMeanRating {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl Processor for FilterByUserMeanRating {
    const NAME: &'static str = "FilterByUserMeanRating";

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let user_col = require_role(data, Role::User, Self::NAME)?;
        let rating_col = require_role(data, Role::Rating, Self::NAME)?;
        let users = data.frame().require(user_col)?;
        let ratings = data.frame().require(rating_col)?;
        let mut sums: HashMap<&Value, (f64, usize)> = HashMap::new();
        for (u, r) in users.iter().zip(ratings) {
            if let Some(x) = r.as_f64() {
                let e = sums.entry(u).or_default();
                e.0 += x;
                e.1 += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let mask: Vec<bool> = users
            .iter()
            .zip(ratings)
            .map(|(u, r)| match (r.as_f64(), sums.get(u)) {
                (Some(x), Some(&(sum, n))) if n > 0 => x >= sum / n as f64,
                _ => false,
            })
            .collect();
        Ok(keep_rows(data, &mask))
    }
}

/// Which row of a duplicated `(user, item)` pair survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKeep {
    #[default]
    First,
    Last,
    Earliest,
    /// Ties on the largest timestamp go to the row that comes last in input order.
    Latest,
    Random,
}

/// Collapse repeated `(user, item)` pairs to one row; output is sorted by
/// `(user, item)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOutDuplicatedInteractions {
    #[serde(default)]
    pub keep: DuplicateKeep,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

const fn default_seed() -> u64 {
    42
}

impl Default for FilterOutDuplicatedInteractions {
    fn default() -> Self {
        Self {
            keep: DuplicateKeep::First,
            random_seed: default_seed(),
        }
    }
}

impl FilterOutDuplicatedInteractions {
    #[must_use]
    pub const fn new(keep: DuplicateKeep, random_seed: u64) -> Self {
        Self { keep, random_seed }
    }
}

impl Processor for FilterOutDuplicatedInteractions {
    const NAME: &'static str = "FilterOutDuplicatedInteractions";

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let user_col = require_role(data, Role::User, Self::NAME)?;
        let item_col = require_role(data, Role::Item, Self::NAME)?;
        let frame = data.frame();
        let users = frame.require(user_col)?;
        let items = frame.require(item_col)?;

        // visiting order decides which duplicate is seen first
        let mut order: Vec<usize> = (0..frame.n_rows()).collect();
        match self.keep {
            DuplicateKeep::First => {}
            DuplicateKeep::Last => order.reverse(),
            DuplicateKeep::Earliest | DuplicateKeep::Latest => {
                let ts_col = data.timestamp_col().ok_or_else(|| {
                    Error::Schema(format!(
                        "keep='{:?}' requires a timestamp column",
                        self.keep
                    ))
                })?;
                let ts = frame.require(ts_col)?;
                let key = |i: usize| OrderedFloat(ts[i].as_timestamp().unwrap_or(f64::NEG_INFINITY));
                order.sort_by_key(|&i| key(i));
                if self.keep == DuplicateKeep::Latest {
                    order.reverse();
                }
            }
            DuplicateKeep::Random => {
                let mut rng = StdRng::seed_from_u64(self.random_seed);
                order.shuffle(&mut rng);
            }
        }
        let mut seen: HashSet<(&Value, &Value)> = HashSet::new();
        let mut kept: Vec<usize> = order
            .into_iter()
            .filter(|&i| seen.insert((&users[i], &items[i])))
            .collect();
        kept.sort_by(|&a, &b| users[a].cmp(&users[b]).then_with(|| items[a].cmp(&items[b])));
        Ok((frame.take(&kept), data.roles().clone()))
    }
}

/// A time bound: epoch seconds or an ISO-8601 string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    Seconds(f64),
    Iso(String),
}

impl TimeBound {
    /// # Errors
    /// Returns a usage error when an ISO string does not parse.
    pub fn seconds(&self) -> Result<f64> {
        match self {
            Self::Seconds(s) => Ok(*s),
            Self::Iso(s) => parse_iso8601(s)
                .ok_or_else(|| Error::Usage(format!("cannot parse time bound '{s}'"))),
        }
    }
}

/// Keep rows whose timestamp lies in the inclusive window `[min_time, max_time]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterByTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time: Option<TimeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<TimeBound>,
}

impl FilterByTime {
    #[must_use]
    pub const fn new(min_time: Option<TimeBound>, max_time: Option<TimeBound>) -> Self {
        Self { min_time, max_time }
    }
}

impl Processor for FilterByTime {
    const NAME: &'static str = "FilterByTime";

    fn validate(&self) -> Result<()> {
        let lo = self.min_time.as_ref().map(TimeBound::seconds).transpose()?;
        let hi = self.max_time.as_ref().map(TimeBound::seconds).transpose()?;
        if let (Some(lo), Some(hi)) = (lo, hi)
            && lo > hi
        {
            return Err(Error::Usage(format!(
                "min_time ({lo}) must not exceed max_time ({hi})"
            )));
        }
        Ok(())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let col = require_role(data, Role::Timestamp, Self::NAME)?;
        let lo = self.min_time.as_ref().map(TimeBound::seconds).transpose()?;
        let hi = self.max_time.as_ref().map(TimeBound::seconds).transpose()?;
        let mask: Vec<bool> = data
            .frame()
            .require(col)?
            .iter()
            .map(|t| {
                t.as_timestamp().is_some_and(|t| {
                    lo.is_none_or(|lo| t >= lo) && hi.is_none_or(|hi| t <= hi)
                })
            })
            .collect();
        Ok(keep_rows(data, &mask))
    }
}
