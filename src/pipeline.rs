//! Serializable lineage of a dataset.
//!
//! A [`Pipeline`] is the ordered list of [`Step`]s that produced a
//! [`DataRec`](crate::DataRec). Readers, processors and splitters each append one step,
//! so the descriptor can be written to YAML and replayed later with
//! [`Pipeline::apply`] to rebuild the same artifact.
//!
//! ```yaml
//! pipeline:
//!   - name: load
//!     operation: registry_dataset
//!     params: { dataset_name: movielens, version: 100k }
//!   - name: process
//!     operation: Binarize
//!     params: { threshold: 4.0 }
//! ```

mod operations;
mod replay;

pub use operations::{
    ExportFn, ExporterEntry, OperationTable, ProcessFn, REGISTRY_DATASET, SplitFn, operation_table,
};
pub use replay::Replayed;

use crate::error::{Error, IoContext, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, create_dir_all};
use std::path::Path;

/// Step parameters: a YAML-serializable mapping.
pub type Params = BTreeMap<String, serde_yaml::Value>;

/// Kind of a pipeline step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Load,
    Read,
    Process,
    Split,
    Export,
    Write,
}

impl StepName {
    /// `export` and `write` end a pipeline.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Export | Self::Write)
    }

    /// `load` and `read` start a pipeline.
    #[must_use]
    pub const fn is_origin(self) -> bool {
        matches!(self, Self::Load | Self::Read)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Read => "read",
            Self::Process => "process",
            Self::Split => "split",
            Self::Export => "export",
            Self::Write => "write",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: StepName,
    pub operation: String,
    #[serde(default)]
    pub params: Params,
}

impl Step {
    #[must_use]
    pub fn new(name: StepName, operation: impl Into<String>, params: Params) -> Self {
        Self {
            name,
            operation: operation.into(),
            params,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(rename = "pipeline", default)]
    steps: Vec<Step>,
}

impl Pipeline {
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step.
    ///
    /// # Errors
    /// Returns a usage error if the pipeline already ends with `export` or `write`.
    pub fn add_step(
        &mut self,
        name: StepName,
        operation: impl Into<String>,
        params: Params,
    ) -> Result<()> {
        if let Some(last) = self.steps.last()
            && last.name.is_terminal()
        {
            return Err(Error::Usage(format!(
                "cannot add a '{name}' step after terminal step '{}'",
                last.name
            )));
        }
        self.steps.push(Step::new(name, operation, params));
        Ok(())
    }

    /// A copy of this pipeline with one more step.
    ///
    /// # Errors
    /// See [`Pipeline::add_step`].
    pub fn extended(&self, step: Step) -> Result<Self> {
        let mut p = self.clone();
        p.add_step(step.name, step.operation, step.params)?;
        Ok(p)
    }

    /// Check the structural rules replay relies on.
    ///
    /// # Errors
    /// Returns a replay error for an empty pipeline, a first step that is not
    /// `load`/`read`, or a step after a terminal one.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.steps.first() else {
            return Err(Error::Replay("pipeline is empty".into()));
        };
        if !first.name.is_origin() {
            return Err(Error::Replay(format!(
                "first step must be 'load' or 'read', found '{}'",
                first.name
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.name.is_origin() && i > 0 {
                return Err(Error::Replay(format!(
                    "step #{i} '{}' may only appear first",
                    step.name
                )));
            }
            if step.name.is_terminal() && i + 1 != self.steps.len() {
                return Err(Error::Replay(format!(
                    "step #{i} '{}' is terminal but is followed by more steps",
                    step.name
                )));
            }
        }
        Ok(())
    }

    /// Serialize to a YAML string.
    ///
    /// # Errors
    /// Returns a YAML error if a parameter cannot be serialized.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the pipeline as YAML, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).io_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).io_context(|| format!("create {}", path.display()))?;
        serde_yaml::to_writer(f, self)?;
        Ok(())
    }

    /// Parse a pipeline from a YAML string.
    ///
    /// # Errors
    /// Returns a YAML error on malformed input.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Read a pipeline from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file is missing or malformed.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let f = File::open(path).io_context(|| format!("open {}", path.display()))?;
        Ok(serde_yaml::from_reader(f)?)
    }
}

/// Serialize a typed parameter struct into step parameters.
///
/// # Errors
/// Returns a configuration error if `value` does not serialize to a mapping.
pub fn to_params<T: Serialize>(value: &T) -> Result<Params> {
    match serde_yaml::to_value(value)? {
        serde_yaml::Value::Mapping(m) => m
            .into_iter()
            .map(|(k, v)| match k {
                serde_yaml::Value::String(k) => Ok((k, v)),
                other => Err(Error::Config(format!("non-string parameter key {other:?}"))),
            })
            .collect(),
        serde_yaml::Value::Null => Ok(Params::new()),
        other => Err(Error::Config(format!(
            "parameters must serialize to a mapping, got {other:?}"
        ))),
    }
}

/// Deserialize step parameters into a typed struct.
///
/// # Errors
/// Returns a configuration error naming the offending parameters.
pub fn from_params<T: DeserializeOwned>(params: &Params) -> Result<T> {
    let mapping: serde_yaml::Mapping = params
        .iter()
        .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
        .collect();
    serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
        .map_err(|e| Error::Config(format!("invalid parameters: {e}")))
}

/// Serde adapter storing a pipeline as its YAML text, for binary formats that cannot
/// carry self-describing parameter values.
pub(crate) mod as_yaml {
    use super::Pipeline;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pipeline: &Pipeline, s: S) -> Result<S::Ok, S::Error> {
        let text = serde_yaml::to_string(pipeline).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pipeline, D::Error> {
        let text = String::deserialize(d)?;
        serde_yaml::from_str(&text).map_err(D::Error::custom)
    }
}
