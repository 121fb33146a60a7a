//! Sinks that lay out a dataset the way a recommendation framework expects it.
//!
//! An exporter is a serde struct like processors and splitters, so an `export` step
//! can rebuild it from its `params`. Besides the framework files, every export writes
//! `pipeline.yml` next to them: the lineage of the exported data plus the export step.

use crate::datarec::{DataRec, Role};
use crate::error::{Error, Result};
use crate::io::tabular::{TabularWriteOptions, write_transactions_tabular};
use crate::pipeline::{Step, StepName, to_params};
use crate::splitters::{SplitKind, SplitResult};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// What an exporter receives: a whole dataset or the result of a splitter.
#[derive(Clone, Copy, Debug)]
pub enum ExportInput<'a> {
    Data(&'a DataRec),
    Splits(&'a SplitResult),
}

impl<'a> ExportInput<'a> {
    /// The dataset a split-agnostic exporter writes: the whole value, the train split,
    /// or the only split present.
    ///
    /// # Errors
    /// Returns a usage error for several splits without a train split.
    pub fn primary(&self) -> Result<&'a DataRec> {
        match *self {
            Self::Data(d) => Ok(d),
            Self::Splits(s) => {
                if let Some(train) = s.get(&SplitKind::Train) {
                    return Ok(train);
                }
                match s.values().collect::<Vec<_>>().as_slice() {
                    [only] => Ok(*only),
                    _ => Err(Error::Usage(
                        "split result has no train split to export".into(),
                    )),
                }
            }
        }
    }

    /// `(train, test, val)` of a split result.
    ///
    /// # Errors
    /// Returns a usage error for a whole dataset or a result without train or test.
    pub fn splits(&self) -> Result<(&'a DataRec, &'a DataRec, Option<&'a DataRec>)> {
        let Self::Splits(s) = *self else {
            return Err(Error::Usage("exporter requires a split dataset".into()));
        };
        let get = |kind: SplitKind| {
            s.get(&kind)
                .ok_or_else(|| Error::Usage(format!("split result has no {kind} split")))
        };
        Ok((get(SplitKind::Train)?, get(SplitKind::Test)?, s.get(&SplitKind::Val)))
    }

    #[must_use]
    pub const fn is_split(&self) -> bool {
        matches!(self, Self::Splits(_))
    }
}

pub trait Exporter: Serialize + DeserializeOwned {
    /// Operation name recorded in the pipeline.
    const NAME: &'static str;
    /// Whether the framework needs explicit train/test files.
    const REQUIRES_SPLIT: bool;

    /// Write the framework files under `folder`.
    ///
    /// # Errors
    /// Returns a usage error when `input` lacks what the framework needs, or an I/O
    /// error.
    fn emit(&self, input: &ExportInput<'_>, folder: &Path) -> Result<Vec<PathBuf>>;

    /// Directory holding the exported files.
    fn directory(&self, folder: &Path) -> PathBuf {
        folder.to_path_buf()
    }

    /// Emit the framework files and the extended lineage.
    ///
    /// # Errors
    /// Returns a usage error when a split-requiring exporter receives a whole dataset,
    /// then whatever [`Exporter::emit`] reports.
    fn export(&self, input: &ExportInput<'_>, folder: &Path) -> Result<Vec<PathBuf>> {
        if Self::REQUIRES_SPLIT && !input.is_split() {
            return Err(Error::Usage(format!(
                "{} export requires a split dataset",
                Self::NAME
            )));
        }
        let mut files = self.emit(input, folder)?;
        let lineage = input
            .primary()?
            .pipeline()
            .extended(Step::new(StepName::Export, Self::NAME, to_params(self)?))?;
        let path = self.directory(folder).join("pipeline.yml");
        lineage.to_yaml(&path)?;
        files.push(path);
        info!(exporter = Self::NAME, files = files.len(), "export complete");
        Ok(files)
    }
}

fn default_dataset_name() -> String {
    "datarec".into()
}

/// RecBole atomic files: `<dataset_name>/<dataset_name>.inter` with typed headers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecBole {
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
}

impl Default for RecBole {
    fn default() -> Self {
        Self {
            dataset_name: default_dataset_name(),
        }
    }
}

impl RecBole {
    #[must_use]
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
        }
    }
}

impl Exporter for RecBole {
    const NAME: &'static str = "recbole";
    const REQUIRES_SPLIT: bool = false;

    fn directory(&self, folder: &Path) -> PathBuf {
        folder.join(&self.dataset_name)
    }

    fn emit(&self, input: &ExportInput<'_>, folder: &Path) -> Result<Vec<PathBuf>> {
        let data = input.primary()?;
        let timestamp_type = match data.role_values(Role::Timestamp) {
            Ok(values) if values.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) => {
                "float"
            }
            _ => "token",
        };
        let opts = TabularWriteOptions {
            user_col: Some("user_id:token".into()),
            item_col: Some("item_id:token".into()),
            rating_col: Some("rating:float".into()),
            timestamp_col: Some(format!("timestamp:{timestamp_type}")),
            ..TabularWriteOptions::default()
        };
        let path = self
            .directory(folder)
            .join(format!("{}.inter", self.dataset_name));
        Ok(vec![write_transactions_tabular(data, path, &opts)?])
    }
}

/// Elliot fixed splits: headerless `train.tsv`, `test.tsv` and optionally `val.tsv`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elliot {
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
}

impl Default for Elliot {
    fn default() -> Self {
        Self {
            dataset_name: default_dataset_name(),
        }
    }
}

impl Elliot {
    #[must_use]
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
        }
    }
}

impl Exporter for Elliot {
    const NAME: &'static str = "elliot";
    const REQUIRES_SPLIT: bool = true;

    fn directory(&self, folder: &Path) -> PathBuf {
        folder.join(&self.dataset_name)
    }

    fn emit(&self, input: &ExportInput<'_>, folder: &Path) -> Result<Vec<PathBuf>> {
        let (train, test, val) = input.splits()?;
        let dir = self.directory(folder);
        let opts = TabularWriteOptions {
            header: false,
            ..TabularWriteOptions::default()
        };
        let mut files = vec![
            write_transactions_tabular(train, dir.join("train.tsv"), &opts)?,
            write_transactions_tabular(test, dir.join("test.tsv"), &opts)?,
        ];
        if let Some(val) = val {
            files.push(write_transactions_tabular(val, dir.join("val.tsv"), &opts)?);
        }
        Ok(files)
    }
}
