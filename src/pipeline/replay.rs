//! Re-running a pipeline descriptor.

use super::operations::{REGISTRY_DATASET, operation_table};
use super::{Params, Pipeline, Step, StepName};
use crate::datarec::DataRec;
use crate::error::{Error, Result};
use crate::export::ExportInput;
use crate::io::Format;
use crate::registry::load_dataset;
use crate::splitters::{SplitKind, SplitResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FILENAME: &str = "filename";
const FILEPATH: &str = "filepath";
const SPLIT: &str = "split";

/// The value a replay ends with.
#[derive(Clone, Debug)]
pub enum Replayed {
    Data(DataRec),
    Splits(SplitResult),
    /// Files produced by a terminal `write` or `export` step.
    Written(Vec<PathBuf>),
}

impl Replayed {
    #[must_use]
    pub fn into_data(self) -> Option<DataRec> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_splits(self) -> Option<SplitResult> {
        match self {
            Self::Splits(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Self::Written(f) => f,
            _ => &[],
        }
    }
}

fn str_param<'a>(step: &'a Step, key: &str) -> Result<Option<&'a str>> {
    match step.params.get(key) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(Error::Replay(format!(
            "{} step '{}': parameter '{key}' must be a string, got {other:?}",
            step.name, step.operation
        ))),
    }
}

fn required_str<'a>(step: &'a Step, key: &str) -> Result<&'a str> {
    str_param(step, key)?.ok_or_else(|| {
        Error::Replay(format!(
            "{} step '{}' requires parameter '{key}'",
            step.name, step.operation
        ))
    })
}

/// `params` without the replay control keys.
fn options(params: &Params) -> Params {
    params
        .iter()
        .filter(|(k, _)| ![FILENAME, FILEPATH, SPLIT].contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `out.tsv` -> `out_train.tsv`. The suffix goes before the first `.` of the file
/// name, so `out.tsv.gz` becomes `out_train.tsv.gz` and keeps its compression suffix,
/// while a dotted stem is split too: `my.data.tsv` becomes `my_train.data.tsv`.
fn with_split_suffix(path: &Path, kind: SplitKind) -> PathBuf {
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.split_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{kind}.{ext}"),
        _ => format!("{name}_{kind}"),
    };
    path.with_file_name(renamed)
}

impl Pipeline {
    /// Replay every step.
    ///
    /// `read` steps resolve `filename` against `input_folder` and `write` steps resolve
    /// it against `output_folder`, so a descriptor can be moved between machines.
    /// Operations are resolved before anything runs.
    ///
    /// # Errors
    /// Returns a replay error for a structurally invalid pipeline, an unknown
    /// operation, a missing folder or a forbidden parameter combination, then
    /// whatever the steps report.
    pub fn apply(&self, input_folder: Option<&Path>, output_folder: Option<&Path>) -> Result<Replayed> {
        self.validate()?;
        let table = operation_table();
        for step in &self.steps {
            table.check(step)?;
        }

        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return Err(Error::Replay("pipeline is empty".into()));
        };
        let mut current = Replayed::Data(origin(first, input_folder)?);

        for step in steps {
            info!(step = %step.name, operation = %step.operation, "replaying");
            current = match (step.name, current) {
                (StepName::Process, Replayed::Data(d)) => Replayed::Data(process(step, &d)?),
                (StepName::Process, Replayed::Splits(s)) => {
                    let mut out = SplitResult::new();
                    for (kind, d) in s {
                        out.insert(kind, process(step, &d)?);
                    }
                    Replayed::Splits(out)
                }
                (StepName::Split, Replayed::Data(d)) => Replayed::Splits(split(step, &d)?),
                (StepName::Split, Replayed::Splits(_)) => {
                    return Err(Error::Replay(format!(
                        "split step '{}' cannot be applied to data that is already split",
                        step.operation
                    )));
                }
                (StepName::Export, value) => Replayed::Written(export(step, &value, output_folder)?),
                (StepName::Write, value) => Replayed::Written(write(step, &value, output_folder)?),
                (StepName::Load | StepName::Read, _) | (_, Replayed::Written(_)) => {
                    return Err(Error::Replay(format!(
                        "unexpected {} step '{}'",
                        step.name, step.operation
                    )));
                }
            };
        }
        Ok(current)
    }
}

fn origin(step: &Step, input_folder: Option<&Path>) -> Result<DataRec> {
    info!(step = %step.name, operation = %step.operation, "replaying");
    match step.name {
        StepName::Load => {
            if step.operation != REGISTRY_DATASET {
                return Err(Error::Replay(format!(
                    "unknown load operation '{}'",
                    step.operation
                )));
            }
            let name = required_str(step, "dataset_name")?;
            let version = required_str(step, "version")?;
            load_dataset(name, version)
        }
        StepName::Read => {
            if step.params.contains_key(FILEPATH) {
                return Err(Error::Replay(format!(
                    "read step '{}' must use '{FILENAME}', not '{FILEPATH}'",
                    step.operation
                )));
            }
            let folder = input_folder.ok_or_else(|| {
                Error::Replay(format!(
                    "read step '{}' requires an input folder",
                    step.operation
                ))
            })?;
            let filename = required_str(step, FILENAME)?;
            let format = Format::from_reader_operation(&step.operation).ok_or_else(|| {
                Error::Replay(format!("unknown read operation '{}'", step.operation))
            })?;
            format.read(&folder.join(filename), &options(&step.params))
        }
        other => Err(Error::Replay(format!(
            "first step must be 'load' or 'read', found '{other}'"
        ))),
    }
}

fn process(step: &Step, data: &DataRec) -> Result<DataRec> {
    let f = operation_table()
        .processor(&step.operation)
        .ok_or_else(|| Error::Replay(format!("unknown process operation '{}'", step.operation)))?;
    f(data, &step.params)
}

fn split(step: &Step, data: &DataRec) -> Result<SplitResult> {
    let f = operation_table()
        .splitter(&step.operation)
        .ok_or_else(|| Error::Replay(format!("unknown split operation '{}'", step.operation)))?;
    f(data, &step.params)
}

fn export(step: &Step, value: &Replayed, output_folder: Option<&Path>) -> Result<Vec<PathBuf>> {
    let entry = operation_table()
        .exporter(&step.operation)
        .ok_or_else(|| Error::Replay(format!("unknown export operation '{}'", step.operation)))?;
    let input = match value {
        Replayed::Data(d) => ExportInput::Data(d),
        Replayed::Splits(s) => ExportInput::Splits(s),
        Replayed::Written(_) => {
            return Err(Error::Replay("nothing left to export".into()));
        }
    };
    if entry.requires_split && !input.is_split() {
        return Err(Error::Replay(format!(
            "export '{}' requires a split dataset",
            step.operation
        )));
    }
    let folder = output_folder.ok_or_else(|| {
        Error::Replay(format!(
            "export step '{}' requires an output folder",
            step.operation
        ))
    })?;
    (entry.run)(&input, folder, &step.params)
}

fn write(step: &Step, value: &Replayed, output_folder: Option<&Path>) -> Result<Vec<PathBuf>> {
    let format = Format::from_writer_operation(&step.operation)
        .ok_or_else(|| Error::Replay(format!("unknown write operation '{}'", step.operation)))?;
    let path = match (str_param(step, FILENAME)?, str_param(step, FILEPATH)?) {
        (Some(_), Some(_)) => {
            return Err(Error::Replay(format!(
                "write step '{}' accepts '{FILENAME}' or '{FILEPATH}', not both",
                step.operation
            )));
        }
        (Some(name), None) => output_folder
            .ok_or_else(|| {
                Error::Replay(format!(
                    "write step '{}' with '{FILENAME}' requires an output folder",
                    step.operation
                ))
            })?
            .join(name),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => {
            return Err(Error::Replay(format!(
                "write step '{}' requires '{FILENAME}' or '{FILEPATH}'",
                step.operation
            )));
        }
    };
    let opts = options(&step.params);
    match value {
        Replayed::Data(d) => Ok(vec![format.write(d, &path, &opts)?]),
        Replayed::Splits(splits) => match str_param(step, SPLIT)? {
            Some(selector) => {
                let data = splits
                    .iter()
                    .find(|(k, _)| k.as_str() == selector)
                    .map(|(_, d)| d)
                    .ok_or_else(|| {
                        Error::Replay(format!("split result has no '{selector}' split"))
                    })?;
                Ok(vec![format.write(data, &path, &opts)?])
            }
            None => splits
                .iter()
                .map(|(kind, d)| {
                    let target = with_split_suffix(&path, *kind);
                    debug!(split = %kind, path = %target.display(), "writing split");
                    format.write(d, &target, &opts)
                })
                .collect(),
        },
        Replayed::Written(_) => Err(Error::Replay("nothing left to write".into())),
    }
}
