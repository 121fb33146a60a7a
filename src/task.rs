//! Task-shaped index views over an encoded dataset, ready to feed a training loop.

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Shape of the training samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// One `(user, item, label)` sample per interaction.
    #[default]
    Pointwise,
    /// One `(user, positive, negative)` triple per interaction, negatives drawn from
    /// the items the user never interacted with.
    Pairwise,
    /// One time-ordered item sequence per user.
    Sequential,
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pointwise" => Ok(Self::Pointwise),
            "pairwise" => Ok(Self::Pairwise),
            "sequential" => Ok(Self::Sequential),
            other => Err(Error::Usage(format!(
                "unknown task '{other}' (expected pointwise, pairwise or sequential)"
            ))),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pointwise => "pointwise",
            Self::Pairwise => "pairwise",
            Self::Sequential => "sequential",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    Point { user: i64, item: i64, label: f64 },
    Pair { user: i64, positive: i64, negative: i64 },
    Sequence { user: i64, items: Vec<i64> },
}

const NEGATIVE_SEED: u64 = 42;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDataset {
    task: Task,
    samples: Vec<Sample>,
}

fn codes(data: &DataRec, role: Role) -> Result<Vec<i64>> {
    data.role_values(role)?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_i64().ok_or_else(|| {
                Error::Schema(format!(
                    "row {i}: {} {v:?} is not an integer code",
                    role.canonical()
                ))
            })
        })
        .collect()
}

impl TaskDataset {
    /// Build samples from a dataset whose user and item columns hold integer codes.
    ///
    /// # Errors
    /// Returns a schema error if a user or item cell is not an integer.
    pub fn build(data: &DataRec, task: Task) -> Result<Self> {
        let users = codes(data, Role::User)?;
        let items = codes(data, Role::Item)?;
        let samples = match task {
            Task::Pointwise => {
                let labels: Vec<f64> = match data.rating_col() {
                    Some(_) => data
                        .role_values(Role::Rating)?
                        .iter()
                        .map(|r| r.as_f64().unwrap_or(0.0))
                        .collect(),
                    None => vec![1.0; users.len()],
                };
                users
                    .iter()
                    .zip(&items)
                    .zip(labels)
                    .map(|((&user, &item), label)| Sample::Point { user, item, label })
                    .collect()
            }
            Task::Pairwise => pairwise(&users, &items),
            Task::Sequential => sequential(data, &users, &items)?,
        };
        Ok(Self { task, samples })
    }

    #[must_use]
    pub const fn task(&self) -> Task {
        self.task
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

fn pairwise(users: &[i64], items: &[i64]) -> Vec<Sample> {
    let catalog: BTreeSet<i64> = items.iter().copied().collect();
    let mut seen: HashMap<i64, HashSet<i64>> = HashMap::new();
    for (&u, &i) in users.iter().zip(items) {
        seen.entry(u).or_default().insert(i);
    }
    let mut candidates: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(NEGATIVE_SEED);
    let mut out = Vec::with_capacity(users.len());
    for (&user, &positive) in users.iter().zip(items) {
        let pool = candidates.entry(user).or_insert_with(|| {
            let own = &seen[&user];
            catalog.iter().copied().filter(|i| !own.contains(i)).collect()
        });
        // users who interacted with every item have no negatives
        if let Some(&negative) = pool.choose(&mut rng) {
            out.push(Sample::Pair {
                user,
                positive,
                negative,
            });
        }
    }
    out
}

fn sequential(data: &DataRec, users: &[i64], items: &[i64]) -> Result<Vec<Sample>> {
    let mut order: Vec<usize> = (0..users.len()).collect();
    if data.timestamp_col().is_some() {
        let ts = data.role_values(Role::Timestamp)?;
        order.sort_by_key(|&i| OrderedFloat(ts[i].as_timestamp().unwrap_or(f64::NEG_INFINITY)));
    }
    let mut first_seen: Vec<i64> = Vec::new();
    let mut sequences: HashMap<i64, Vec<i64>> = HashMap::new();
    for &u in users {
        if let std::collections::hash_map::Entry::Vacant(e) = sequences.entry(u) {
            e.insert(Vec::new());
            first_seen.push(u);
        }
    }
    for i in order {
        if let Some(seq) = sequences.get_mut(&users[i]) {
            seq.push(items[i]);
        }
    }
    Ok(first_seen
        .into_iter()
        .map(|user| Sample::Sequence {
            items: sequences.remove(&user).unwrap_or_default(),
            user,
        })
        .collect())
}

impl<'a> IntoIterator for &'a TaskDataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
