//! Dataset statistics and named characteristics.
//!
//! [`Stats`] is a borrowed view computed on demand from the current table, so it can
//! never go stale. Characteristics are looked up by name in a process-wide table
//! pre-populated with the built-ins; [`register_characteristic`] adds more.
//!
//! ```ignore
//! let density = data.stats().characteristic("density", &Params::new())?;
//! ```

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::pipeline::Params;
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Value of a characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Count(u64),
    Real(f64),
}

impl Metric {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Count(c) => c as f64,
            Self::Real(r) => r,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(c) => write!(f, "{c}"),
            Self::Real(r) => write!(f, "{r:.6}"),
        }
    }
}

/// A characteristic: a pure function of a dataset and keyword options.
pub type Characteristic = Arc<dyn Fn(&DataRec, &Params) -> Result<Metric> + Send + Sync>;

static CHARACTERISTICS: RwLock<Option<BTreeMap<String, Characteristic>>> = RwLock::new(None);

fn builtin(f: fn(&DataRec, &Params) -> Result<Metric>) -> Characteristic {
    Arc::new(f)
}

fn builtin_characteristics() -> BTreeMap<String, Characteristic> {
    let entries: [(&str, Characteristic); 15] = [
        ("n_users", builtin(|d, _| Ok(Metric::Count(d.stats().n_users() as u64)))),
        ("n_items", builtin(|d, _| Ok(Metric::Count(d.stats().n_items() as u64)))),
        (
            "n_transactions",
            builtin(|d, _| Ok(Metric::Count(d.stats().n_transactions() as u64))),
        ),
        ("space_size", builtin(|d, p| Ok(Metric::Real(space_size(d, p)?)))),
        (
            "space_size_log",
            builtin(|d, p| Ok(Metric::Real(space_size(d, p)?.log10()))),
        ),
        ("shape", builtin(|d, _| Ok(Metric::Real(shape(d))))),
        ("shape_log", builtin(|d, _| Ok(Metric::Real(shape(d).log10())))),
        ("density", builtin(|d, _| Ok(Metric::Real(density(d))))),
        ("density_log", builtin(|d, _| Ok(Metric::Real(density(d).log10())))),
        (
            "gini_user",
            builtin(|d, _| Ok(Metric::Real(gini(d.stats().user_frequencies())))),
        ),
        (
            "gini_item",
            builtin(|d, _| Ok(Metric::Real(gini(d.stats().item_frequencies())))),
        ),
        (
            "ratings_per_user",
            builtin(|d, _| Ok(Metric::Real(ratio(d.stats().n_transactions(), d.stats().n_users())))),
        ),
        (
            "ratings_per_item",
            builtin(|d, _| Ok(Metric::Real(ratio(d.stats().n_transactions(), d.stats().n_items())))),
        ),
        ("mean_rating", builtin(|d, _| Ok(Metric::Real(rating_moments(d)?.0)))),
        ("std_rating", builtin(|d, _| Ok(Metric::Real(rating_moments(d)?.1)))),
    ];
    entries
        .into_iter()
        .map(|(name, f)| (name.to_string(), f))
        .collect()
}

/// Install (or replace) a characteristic under `name`.
pub fn register_characteristic(
    name: impl Into<String>,
    f: impl Fn(&DataRec, &Params) -> Result<Metric> + Send + Sync + 'static,
) {
    CHARACTERISTICS
        .write()
        .get_or_insert_with(builtin_characteristics)
        .insert(name.into(), Arc::new(f));
}

fn lookup(name: &str) -> Option<Characteristic> {
    if let Some(table) = CHARACTERISTICS.read().as_ref() {
        return table.get(name).cloned();
    }
    CHARACTERISTICS
        .write()
        .get_or_insert_with(builtin_characteristics)
        .get(name)
        .cloned()
}

/// Names of every registered characteristic, sorted.
#[must_use]
pub fn characteristic_names() -> Vec<String> {
    CHARACTERISTICS
        .write()
        .get_or_insert_with(builtin_characteristics)
        .keys()
        .cloned()
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        return f64::NAN;
    }
    num as f64 / den as f64
}

/// `sqrt(n_users * n_items) / scale`, `scale` defaulting to 1000.
#[allow(clippy::cast_precision_loss)]
fn space_size(d: &DataRec, params: &Params) -> Result<f64> {
    let scale = match params.get("scale") {
        None => 1000.0,
        Some(v) => v
            .as_f64()
            .filter(|s| *s > 0.0)
            .ok_or_else(|| Error::Usage(format!("scale must be a positive number, got {v:?}")))?,
    };
    let s = d.stats();
    Ok(((s.n_users() * s.n_items()) as f64).sqrt() / scale)
}

fn shape(d: &DataRec) -> f64 {
    let s = d.stats();
    ratio(s.n_users(), s.n_items())
}

fn density(d: &DataRec) -> f64 {
    let s = d.stats();
    ratio(s.n_transactions(), s.n_users() * s.n_items())
}

/// Gini coefficient of an interaction-count distribution.
#[allow(clippy::cast_precision_loss)]
fn gini(freqs: Vec<(&Value, usize)>) -> f64 {
    let mut counts: Vec<usize> = freqs.into_iter().map(|(_, c)| c).collect();
    counts.sort_unstable();
    let n = counts.len() as f64;
    let total: usize = counts.iter().sum();
    if counts.is_empty() || total == 0 {
        return 0.0;
    }
    let weighted: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| (2.0 * (i as f64 + 1.0) - n - 1.0) * c as f64)
        .sum();
    weighted / (n * total as f64)
}

/// Mean and sample standard deviation of the rating column.
#[allow(clippy::cast_precision_loss)]
fn rating_moments(d: &DataRec) -> Result<(f64, f64)> {
    let ratings: Vec<f64> = d
        .role_values(Role::Rating)?
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let n = ratings.len() as f64;
    if ratings.is_empty() {
        return Ok((f64::NAN, f64::NAN));
    }
    let mean = ratings.iter().sum::<f64>() / n;
    if ratings.len() < 2 {
        return Ok((mean, f64::NAN));
    }
    let var = ratings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok((mean, var.sqrt()))
}

/// First, second and third quartile of a popularity distribution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Linear-interpolated quantile of sorted data.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[usize], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    (sorted[hi] as f64 - sorted[lo] as f64).mul_add(frac, sorted[lo] as f64)
}

/// Statistics of a dataset, computed from its current table on every call.
#[derive(Clone, Copy, Debug)]
pub struct Stats<'a> {
    data: &'a DataRec,
}

impl<'a> Stats<'a> {
    #[must_use]
    pub const fn new(data: &'a DataRec) -> Self {
        Self { data }
    }

    fn side(&self, role: Role) -> &'a [Value] {
        self.data.role_values(role).unwrap_or(&[])
    }

    fn frequencies(values: &'a [Value]) -> Vec<(&'a Value, usize)> {
        let mut index: HashMap<&Value, usize> = HashMap::new();
        let mut out: Vec<(&Value, usize)> = Vec::new();
        for v in values {
            match index.get(v) {
                Some(&i) => out[i].1 += 1,
                None => {
                    index.insert(v, out.len());
                    out.push((v, 1));
                }
            }
        }
        out
    }

    /// Distinct users in first-seen order.
    #[must_use]
    pub fn users(&self) -> Vec<&'a Value> {
        self.user_frequencies().into_iter().map(|(v, _)| v).collect()
    }

    /// Distinct items in first-seen order.
    #[must_use]
    pub fn items(&self) -> Vec<&'a Value> {
        self.item_frequencies().into_iter().map(|(v, _)| v).collect()
    }

    #[must_use]
    pub fn n_users(&self) -> usize {
        self.user_frequencies().len()
    }

    #[must_use]
    pub fn n_items(&self) -> usize {
        self.item_frequencies().len()
    }

    #[must_use]
    pub fn n_transactions(&self) -> usize {
        self.data.len()
    }

    /// `(user, rows)` in first-seen order.
    #[must_use]
    pub fn user_frequencies(&self) -> Vec<(&'a Value, usize)> {
        Self::frequencies(self.side(Role::User))
    }

    /// `(item, rows)` in first-seen order.
    #[must_use]
    pub fn item_frequencies(&self) -> Vec<(&'a Value, usize)> {
        Self::frequencies(self.side(Role::Item))
    }

    /// Users by descending popularity; ties keep first-seen order.
    #[must_use]
    pub fn sorted_users(&self) -> Vec<(&'a Value, usize)> {
        let mut f = self.user_frequencies();
        f.sort_by(|a, b| b.1.cmp(&a.1));
        f
    }

    /// Items by descending popularity; ties keep first-seen order.
    #[must_use]
    pub fn sorted_items(&self) -> Vec<(&'a Value, usize)> {
        let mut f = self.item_frequencies();
        f.sort_by(|a, b| b.1.cmp(&a.1));
        f
    }

    fn quartiles_of(freqs: Vec<(&Value, usize)>) -> Quartiles {
        let mut counts: Vec<usize> = freqs.into_iter().map(|(_, c)| c).collect();
        counts.sort_unstable();
        Quartiles {
            q1: quantile(&counts, 0.25),
            median: quantile(&counts, 0.5),
            q3: quantile(&counts, 0.75),
        }
    }

    #[must_use]
    pub fn user_quartiles(&self) -> Quartiles {
        Self::quartiles_of(self.user_frequencies())
    }

    #[must_use]
    pub fn item_quartiles(&self) -> Quartiles {
        Self::quartiles_of(self.item_frequencies())
    }

    /// Evaluate the characteristic registered as `name`.
    ///
    /// # Errors
    /// Returns a usage error for an unknown name, or whatever the characteristic
    /// itself reports.
    pub fn characteristic(&self, name: &str, params: &Params) -> Result<Metric> {
        let f = lookup(name).ok_or_else(|| {
            Error::Usage(format!(
                "unknown characteristic '{name}' (available: {})",
                characteristic_names().join(", ")
            ))
        })?;
        f(self.data, params)
    }

    /// Every registered characteristic that evaluates without error.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, Metric> {
        let params = Params::new();
        characteristic_names()
            .into_iter()
            .filter_map(|name| {
                let m = self.characteristic(&name, &params).ok()?;
                Some((name, m))
            })
            .collect()
    }
}
