//! Parseable artifacts bound to a source.
//!
//! An interactions resource goes through `declared -> linked -> prepared -> loaded`,
//! and a loaded dataset can be cached as a snapshot under the dataset's version
//! directory. A later load with `use_cache` reads the snapshot and never touches the
//! source.

use crate::datarec::{DataRec, from_snapshot};
use crate::error::{Error, IoContext, Result};
use crate::io::Format;
use crate::paths;
use crate::pipeline::{Params, Pipeline, StepName};
use crate::sources::SourceSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Interactions,
    Content,
    #[serde(alias = "doc", alias = "docs")]
    Documentation,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interactions => "interactions",
            Self::Content => "content",
            Self::Documentation => "documentation",
        })
    }
}

/// A resource declaration from a version descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Reader options for `format`.
    #[serde(default)]
    pub schema: Params,
}

#[derive(Clone, Debug)]
pub struct Resource {
    name: String,
    decl: ResourceDecl,
    dataset_name: String,
    version_name: String,
    path: Option<PathBuf>,
    prepared: bool,
}

impl Resource {
    /// # Errors
    /// Returns a configuration error for an interactions resource without a format.
    pub fn new(
        name: impl Into<String>,
        decl: ResourceDecl,
        dataset_name: impl Into<String>,
        version_name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if decl.kind == ResourceKind::Interactions && decl.format.is_none() {
            return Err(Error::Config(format!(
                "interactions resource '{name}' declares no format"
            )));
        }
        Ok(Self {
            name,
            decl,
            dataset_name: dataset_name.into(),
            version_name: version_name.into(),
            path: None,
            prepared: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.decl.kind
    }

    #[must_use]
    pub const fn format(&self) -> Option<Format> {
        self.decl.format
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.decl.source_name
    }

    #[must_use]
    pub const fn required(&self) -> bool {
        self.decl.required
    }

    #[must_use]
    pub const fn schema(&self) -> &Params {
        &self.decl.schema
    }

    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Resolve the file path through the owning source.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown source.
    pub fn link(&mut self, sources: &SourceSet) -> Result<()> {
        let source = sources.get(&self.decl.source_name).ok_or_else(|| {
            Error::Config(format!(
                "resource '{}' references unknown source '{}'",
                self.name, self.decl.source_name
            ))
        })?;
        self.path = Some(source.resource_path(&self.name)?);
        Ok(())
    }

    /// Path of the parseable file.
    ///
    /// # Errors
    /// Returns a configuration error before [`Resource::link`].
    pub fn path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| Error::Config(format!("resource '{}' is not linked", self.name)))
    }

    /// Snapshot location of the parsed dataset.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        paths::snapshot_path(&self.dataset_name, &self.version_name)
    }

    fn cache_hit(&self, use_cache: bool) -> bool {
        use_cache && self.decl.kind == ResourceKind::Interactions && self.snapshot_path().is_file()
    }

    /// Make the file available: a snapshot hit counts as prepared, otherwise the source
    /// is prepared and unpacked.
    ///
    /// # Errors
    /// Propagates source preparation failures.
    pub fn prepare(&mut self, sources: &mut SourceSet, use_cache: bool) -> Result<()> {
        if self.cache_hit(use_cache) {
            self.prepared = true;
            return Ok(());
        }
        sources.prepare(&self.decl.source_name)?;
        sources.get_resources(&self.decl.source_name, false)?;
        let path = self.path()?;
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        self.prepared = true;
        Ok(())
    }

    /// Parse the interactions into a dataset tagged with this resource's dataset and
    /// version, whose lineage is a single `load` step.
    ///
    /// # Errors
    /// Returns a usage error for non-interaction resources, an unsupported-format error
    /// for an unknown tag, or whatever the reader reports.
    pub fn load(&mut self, sources: &mut SourceSet, use_cache: bool, to_cache: bool) -> Result<DataRec> {
        if self.decl.kind != ResourceKind::Interactions {
            return Err(Error::Usage(format!(
                "resource '{}' is {} and cannot be loaded as interactions",
                self.name, self.decl.kind
            )));
        }
        if self.cache_hit(use_cache) {
            match from_snapshot(self.snapshot_path()) {
                Ok(data) => {
                    info!(dataset = %self.dataset_name, version = %self.version_name, "loaded from cache");
                    self.prepared = true;
                    return Ok(data);
                }
                Err(e) => warn!(error = %e, "cached snapshot unreadable; reloading from source"),
            }
        }
        if !self.prepared || !self.path()?.exists() {
            self.prepare(sources, false)?;
        }
        let format = self
            .decl
            .format
            .ok_or_else(|| Error::UnsupportedFormat(String::new()))?;
        let raw = format.read_raw(self.path()?, &self.decl.schema)?;
        let data = DataRec::new(raw, Some(self.load_pipeline()?))?
            .with_dataset(&self.dataset_name, &self.version_name);
        info!(
            dataset = %self.dataset_name,
            version = %self.version_name,
            rows = data.len(),
            "interactions loaded"
        );
        if to_cache {
            data.to_snapshot(None)?;
        }
        Ok(data)
    }

    fn load_pipeline(&self) -> Result<Pipeline> {
        let mut params = Params::new();
        params.insert(
            "dataset_name".into(),
            serde_yaml::Value::String(self.dataset_name.clone()),
        );
        params.insert(
            "version".into(),
            serde_yaml::Value::String(self.version_name.clone()),
        );
        let mut pipeline = Pipeline::new();
        pipeline.add_step(StepName::Load, "registry_dataset", params)?;
        Ok(pipeline)
    }

    /// Delete the cached snapshot; returns whether one existed.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be removed.
    pub fn free_cache(&mut self) -> Result<bool> {
        let path = self.snapshot_path();
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).io_context(|| format!("remove {}", path.display()))?;
        info!(path = %path.display(), "snapshot removed");
        Ok(true)
    }
}
