//! Dataset descriptors.
//!
//! The registry directory holds three YAML families:
//!
//! - `datasets/<name>.yml`: available versions, the latest one, provenance;
//! - `versions/<name>_<version>.yml`: sources and resources of one version;
//! - `metrics/<name>_<version>.yml`: precomputed characteristics.
//!
//! [`Registry::version`] turns a version descriptor into a [`DatasetVersion`]: sources
//! are instantiated with their output folder under the cache, nested sources are linked
//! to their parents and every resource is linked to its source.

use crate::characteristics::Metric;
use crate::datarec::DataRec;
use crate::error::{Error, IoContext, Result};
use crate::paths;
use crate::resources::{Resource, ResourceDecl, ResourceKind};
use crate::sources::{SourceDecl, SourceSet, transport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Alias accepted wherever a version is expected.
pub const LATEST: &str = "latest";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub versions: Vec<String>,
    pub latest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Pointers to the sources and resources that matter most.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesInfo {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceDecl>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDecl>,
    #[serde(default)]
    pub sources_info: SourcesInfo,
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).io_context(|| format!("read {}", path.display()))?;
    serde_yaml::from_str(&text)
        .map_err(|e| Error::Config(format!("invalid descriptor {}: {e}", path.display())))
}

/// A registry rooted at a descriptor directory.
#[derive(Clone, Debug)]
pub struct Registry {
    root: PathBuf,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(paths::registry_root())
    }
}

impl Registry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every dataset with a descriptor, sorted.
    ///
    /// # Errors
    /// Returns an I/O error if the descriptor directory cannot be listed.
    pub fn available_datasets(&self) -> Result<Vec<String>> {
        let dir = self.root.join("datasets");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)
            .io_context(|| format!("read_dir {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "yml" || x == "yaml"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// # Errors
    /// Returns a configuration error for an unknown dataset.
    pub fn dataset(&self, name: &str) -> Result<DatasetDescriptor> {
        let path = paths::registry_dataset_path(&self.root, name);
        read_yaml(&path).map_err(|e| match e {
            Error::NotFound(_) => Error::Config(format!("unknown dataset '{name}'")),
            other => other,
        })
    }

    /// # Errors
    /// See [`Registry::dataset`].
    pub fn versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.dataset(name)?.versions)
    }

    /// Map `"latest"` to the current latest version and check that the version exists.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown dataset or version.
    pub fn resolve_version(&self, name: &str, version: &str) -> Result<String> {
        let desc = self.dataset(name)?;
        let resolved = if version == LATEST {
            desc.latest.clone()
        } else {
            version.to_string()
        };
        if !desc.versions.contains(&resolved) {
            return Err(Error::Config(format!(
                "dataset '{name}' has no version '{resolved}' (available: {})",
                desc.versions.join(", ")
            )));
        }
        Ok(resolved)
    }

    /// Instantiate the sources and resources of `name`/`version`.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown version or an invalid descriptor.
    pub fn version(&self, name: &str, version: &str) -> Result<DatasetVersion> {
        let version = self.resolve_version(name, version)?;
        let path = paths::registry_version_path(&self.root, name, &version);
        let desc: VersionDescriptor = read_yaml(&path).map_err(|e| match e {
            Error::NotFound(p) => Error::Config(format!(
                "missing version descriptor {} for '{name}' {version}",
                p.display()
            )),
            other => other,
        })?;
        DatasetVersion::from_descriptor(name, &version, desc)
    }

    /// Precomputed characteristics, if a metrics descriptor exists.
    ///
    /// # Errors
    /// Returns a configuration error for a malformed descriptor.
    pub fn metrics(&self, name: &str, version: &str) -> Result<Option<BTreeMap<String, Metric>>> {
        let version = self.resolve_version(name, version)?;
        let path = paths::registry_metrics_path(&self.root, name, &version);
        if !path.is_file() {
            return Ok(None);
        }
        read_yaml(&path).map(Some)
    }

    /// Download a version descriptor and build it the same way as a local one.
    ///
    /// # Errors
    /// Returns a network error on fetch failure or a configuration error for an
    /// invalid descriptor.
    pub fn fetch_remote_version(url: &str, name: &str, version: &str) -> Result<DatasetVersion> {
        info!(url, name, version, "fetching remote descriptor");
        let text = transport::fetch_text(url)?;
        let desc: VersionDescriptor = serde_yaml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid remote descriptor {url}: {e}")))?;
        DatasetVersion::from_descriptor(name, version, desc)
    }
}

/// The sources and resources of one dataset version, linked and ready to prepare.
#[derive(Clone, Debug)]
pub struct DatasetVersion {
    name: String,
    version: String,
    sources: SourceSet,
    resources: BTreeMap<String, Resource>,
    info: SourcesInfo,
}

impl DatasetVersion {
    /// Build from a parsed descriptor; sources land in the version's `raw` directory.
    ///
    /// # Errors
    /// Returns a configuration error for invalid sources, unknown parents or resources
    /// referencing unknown sources.
    pub fn from_descriptor(name: &str, version: &str, desc: VersionDescriptor) -> Result<Self> {
        Self::with_output_folder(name, version, desc, &paths::dataset_raw_directory(name, version))
    }

    /// Like [`DatasetVersion::from_descriptor`] with an explicit download folder.
    ///
    /// # Errors
    /// See [`DatasetVersion::from_descriptor`].
    pub fn with_output_folder(
        name: &str,
        version: &str,
        desc: VersionDescriptor,
        output_folder: &Path,
    ) -> Result<Self> {
        let sources = SourceSet::new(desc.sources, output_folder)?;
        let mut resources = BTreeMap::new();
        for (rname, decl) in desc.resources {
            let mut r = Resource::new(rname.clone(), decl, name, version)?;
            r.link(&sources)?;
            resources.insert(rname, r);
        }
        for s in &desc.sources_info.required {
            if sources.get(s).is_none() {
                return Err(Error::Config(format!(
                    "sources_info.required names unknown source '{s}'"
                )));
            }
        }
        debug!(name, version, sources = sources.len(), resources = resources.len(), "version linked");
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            sources,
            resources,
            info: desc.sources_info,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn sources(&self) -> &SourceSet {
        &self.sources
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    #[must_use]
    pub fn resources_of(&self, kind: ResourceKind) -> Vec<&Resource> {
        self.resources.values().filter(|r| r.kind() == kind).collect()
    }

    pub fn find_resource(&self, pred: impl Fn(&Resource) -> bool) -> Option<&Resource> {
        self.resources.values().find(|r| pred(r))
    }

    /// Name of the interactions resource: the declared pointer, else the first one.
    ///
    /// # Errors
    /// Returns a configuration error when the version has no interactions resource.
    pub fn interactions_name(&self) -> Result<String> {
        if let Some(n) = &self.info.interactions {
            return Ok(n.clone());
        }
        self.resources_of(ResourceKind::Interactions)
            .first()
            .map(|r| r.name().to_string())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} {} declares no interactions resource",
                    self.name, self.version
                ))
            })
    }

    /// Prepare every required resource and every source listed as required.
    ///
    /// # Errors
    /// Propagates the first preparation failure.
    pub fn prepare(&mut self, use_cache: bool) -> Result<()> {
        for s in self.info.required.clone() {
            self.sources.prepare(&s)?;
        }
        let sources = &mut self.sources;
        for r in self.resources.values_mut().filter(|r| r.required()) {
            r.prepare(sources, use_cache)?;
        }
        Ok(())
    }

    /// Load the interactions resource.
    ///
    /// # Errors
    /// See [`Resource::load`].
    pub fn load(&mut self, use_cache: bool, to_cache: bool) -> Result<DataRec> {
        let name = self.interactions_name()?;
        let resource = self.resources.get_mut(&name).ok_or_else(|| {
            Error::Config(format!("unknown interactions resource '{name}'"))
        })?;
        resource.load(&mut self.sources, use_cache, to_cache)
    }

    /// Remove the cached snapshot of this version.
    ///
    /// # Errors
    /// See [`Resource::free_cache`].
    pub fn free_cache(&mut self) -> Result<bool> {
        let name = self.interactions_name()?;
        match self.resources.get_mut(&name) {
            Some(r) => r.free_cache(),
            None => Ok(false),
        }
    }
}

/// Prepare and load the interactions of a registry dataset, using the snapshot cache.
///
/// `version` may be `"latest"`.
///
/// # Errors
/// Returns a configuration error for an unknown dataset or version, then whatever
/// acquisition or parsing reports.
pub fn load_dataset(name: &str, version: &str) -> Result<DataRec> {
    let registry = Registry::default();
    let mut v = registry.version(name, version)?;
    v.load(true, true)
}
