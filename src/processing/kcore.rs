//! k-core filtering.

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::processing::{Processor, require_role};
use crate::rawdata::Roles;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One core for every column, or one per column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cores {
    One(usize),
    Many(Vec<usize>),
}

impl Cores {
    fn for_columns(&self, n: usize) -> Result<Vec<usize>> {
        match self {
            Self::One(c) => Ok(vec![*c; n]),
            Self::Many(cs) if cs.len() == n => Ok(cs.clone()),
            Self::Many(cs) => Err(Error::Usage(format!(
                "{} cores given for {n} columns",
                cs.len()
            ))),
        }
    }
}

impl From<usize> for Cores {
    fn from(c: usize) -> Self {
        Self::One(c)
    }
}

impl From<Vec<usize>> for Cores {
    fn from(cs: Vec<usize>) -> Self {
        Self::Many(cs)
    }
}

/// A column label, or a role name (`user`, `item`, ...) standing for its column.
fn resolve_column(data: &DataRec, name: &str) -> Result<String> {
    if data.frame().has_column(name) {
        return Ok(name.to_string());
    }
    let role = match name {
        "user" => Role::User,
        "item" => Role::Item,
        "rating" => Role::Rating,
        "timestamp" => Role::Timestamp,
        _ => {
            return Err(Error::Schema(format!(
                "column '{name}' not found (available: {})",
                data.frame().columns().join(", ")
            )));
        }
    };
    require_role(data, role, "k-core").map(str::to_string)
}

/// Mask of rows whose value in `col` occurs at least `core` times.
fn core_mask(frame: &Frame, col: &str, core: usize) -> Result<Vec<bool>> {
    let values = frame.require(col)?;
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    Ok(values.iter().map(|v| counts[v] >= core).collect())
}

/// Alternate per-column filters until a sweep removes nothing or `rounds` sweeps ran.
fn sweep(frame: &Frame, plan: &[(String, usize)], rounds: Option<usize>) -> Result<Frame> {
    let mut current = frame.clone();
    let mut round = 0usize;
    loop {
        if rounds.is_some_and(|r| round >= r) {
            break;
        }
        let before = current.n_rows();
        for (col, core) in plan {
            let mask = core_mask(&current, col, *core)?;
            current = current.filter(&mask);
        }
        round += 1;
        debug!(round, rows = current.n_rows(), "k-core sweep");
        if current.n_rows() == before {
            break;
        }
    }
    Ok(current)
}

fn plan(data: &DataRec, columns: &[String], cores: &Cores) -> Result<Vec<(String, usize)>> {
    let cores = cores.for_columns(columns.len())?;
    columns
        .iter()
        .zip(cores)
        .map(|(c, k)| Ok((resolve_column(data, c)?, k)))
        .collect()
}

/// Keep rows whose user has at least `core` interactions (single pass).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKCore {
    pub core: usize,
}

impl UserKCore {
    #[must_use]
    pub const fn new(core: usize) -> Self {
        Self { core }
    }
}

impl Processor for UserKCore {
    const NAME: &'static str = "UserKCore";

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let col = require_role(data, Role::User, Self::NAME)?;
        let mask = core_mask(data.frame(), col, self.core)?;
        Ok((data.frame().filter(&mask), data.roles().clone()))
    }
}

/// Keep rows whose item has at least `core` interactions (single pass).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemKCore {
    pub core: usize,
}

impl ItemKCore {
    #[must_use]
    pub const fn new(core: usize) -> Self {
        Self { core }
    }
}

impl Processor for ItemKCore {
    const NAME: &'static str = "ItemKCore";

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let col = require_role(data, Role::Item, Self::NAME)?;
        let mask = core_mask(data.frame(), col, self.core)?;
        Ok((data.frame().filter(&mask), data.roles().clone()))
    }
}

/// Alternate per-column k-core filters until a full sweep removes no row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterativeKCore {
    pub columns: Vec<String>,
    pub cores: Cores,
}

impl IterativeKCore {
    #[must_use]
    pub fn new(columns: Vec<String>, cores: impl Into<Cores>) -> Self {
        Self {
            columns,
            cores: cores.into(),
        }
    }
}

impl Processor for IterativeKCore {
    const NAME: &'static str = "IterativeKCore";

    fn validate(&self) -> Result<()> {
        self.cores.for_columns(self.columns.len()).map(|_| ())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let plan = plan(data, &self.columns, &self.cores)?;
        Ok((sweep(data.frame(), &plan, None)?, data.roles().clone()))
    }
}

/// Like [`IterativeKCore`], stopping after at most `rounds` sweeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NRoundsKCore {
    pub columns: Vec<String>,
    pub cores: Cores,
    pub rounds: usize,
}

impl NRoundsKCore {
    #[must_use]
    pub fn new(columns: Vec<String>, cores: impl Into<Cores>, rounds: usize) -> Self {
        Self {
            columns,
            cores: cores.into(),
            rounds,
        }
    }
}

impl Processor for NRoundsKCore {
    const NAME: &'static str = "NRoundsKCore";

    fn validate(&self) -> Result<()> {
        self.cores.for_columns(self.columns.len()).map(|_| ())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        let plan = plan(data, &self.columns, &self.cores)?;
        Ok((sweep(data.frame(), &plan, Some(self.rounds))?, data.roles().clone()))
    }
}

fn user_item_columns() -> Vec<String> {
    vec!["user".into(), "item".into()]
}

/// [`IterativeKCore`] over the user and item columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserItemIterativeKCore {
    pub cores: Cores,
}

impl UserItemIterativeKCore {
    #[must_use]
    pub fn new(cores: impl Into<Cores>) -> Self {
        Self {
            cores: cores.into(),
        }
    }
}

impl Processor for UserItemIterativeKCore {
    const NAME: &'static str = "UserItemIterativeKCore";

    fn validate(&self) -> Result<()> {
        self.cores.for_columns(2).map(|_| ())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        IterativeKCore::new(user_item_columns(), self.cores.clone()).transform(data)
    }
}

/// [`NRoundsKCore`] over the user and item columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserItemNRoundsKCore {
    pub cores: Cores,
    pub rounds: usize,
}

impl UserItemNRoundsKCore {
    #[must_use]
    pub fn new(cores: impl Into<Cores>, rounds: usize) -> Self {
        Self {
            cores: cores.into(),
            rounds,
        }
    }
}

impl Processor for UserItemNRoundsKCore {
    const NAME: &'static str = "UserItemNRoundsKCore";

    fn validate(&self) -> Result<()> {
        self.cores.for_columns(2).map(|_| ())
    }

    fn transform(&self, data: &DataRec) -> Result<(Frame, Roles)> {
        NRoundsKCore::new(user_item_columns(), self.cores.clone(), self.rounds).transform(data)
    }
}
