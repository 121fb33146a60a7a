//! Acquisition units declared by the registry.
//!
//! A [`Source`] knows where its file comes from (its [`SourceType`]), where it lands
//! (the output folder the registry assigns), how to verify it and how to unpack it.
//! [`Source::prepare`] moves it from declared to prepared and is safe to repeat: the
//! prepared flag is set only after the file is on disk and its checksum matched.
//!
//! Nested sources live inside another source's archive. [`SourceSet`] owns every
//! source of a dataset version and prepares parents before their nested children.

pub mod archive;
pub mod checksum;
pub mod transport;

pub use archive::{ArchiveKind, unpack};
pub use checksum::{ChecksumAlgorithm, file_digest, verify_file};

use crate::error::{Error, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::create_dir_all;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Transport variant of a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Plain HTTP stream.
    Http,
    /// HTTP with a browser user agent.
    Browser,
    /// Drive-hosted file; `url` holds the file id or share link.
    Drive,
    /// The operator places the file by hand.
    Manual,
    /// A file inside another source's archive.
    Nested,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Browser => "browser",
            Self::Drive => "drive",
            Self::Manual => "manual",
            Self::Nested => "nested",
        })
    }
}

/// Constructor arguments of a source, as written in a version descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArgs {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveKind>,
    /// Resource name to path relative to the unpacked bundle.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inner_paths: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Expected file size in bytes, used to skip re-downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_source_name: Option<String>,
    /// Instructions shown by manual sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A source declaration: `{ source_type, args }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDecl {
    pub source_type: SourceType,
    pub args: SourceArgs,
}

#[derive(Clone, Debug)]
pub struct Source {
    name: String,
    source_type: SourceType,
    args: SourceArgs,
    output_folder: Option<PathBuf>,
    prepared: bool,
}

impl Source {
    /// Build a source from its declaration.
    ///
    /// # Errors
    /// Returns a configuration error when a field required by the transport is missing.
    pub fn new(name: impl Into<String>, decl: SourceDecl) -> Result<Self> {
        let name = name.into();
        let SourceDecl { source_type, args } = decl;
        if args.filename.is_empty() {
            return Err(Error::Config(format!("source '{name}' has no filename")));
        }
        match source_type {
            SourceType::Http | SourceType::Browser | SourceType::Drive if args.url.is_none() => {
                return Err(Error::Config(format!(
                    "{source_type} source '{name}' requires a url"
                )));
            }
            SourceType::Nested if args.parent_source_name.is_none() => {
                return Err(Error::Config(format!(
                    "nested source '{name}' requires parent_source_name"
                )));
            }
            _ => {}
        }
        Ok(Self {
            name,
            source_type,
            args,
            output_folder: None,
            prepared: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn source_type(&self) -> SourceType {
        self.source_type
    }

    #[must_use]
    pub const fn args(&self) -> &SourceArgs {
        &self.args
    }

    #[must_use]
    pub fn output_folder(&self) -> Option<&Path> {
        self.output_folder.as_deref()
    }

    pub fn set_output_folder(&mut self, folder: impl Into<PathBuf>) {
        self.output_folder = Some(folder.into());
        self.prepared = false;
    }

    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn folder(&self) -> Result<&Path> {
        self.output_folder.as_deref().ok_or_else(|| {
            Error::Config(format!("source '{}' has no output folder assigned", self.name))
        })
    }

    /// Where the downloaded (or placed) file lives.
    ///
    /// # Errors
    /// Returns a configuration error before an output folder is assigned.
    pub fn file_path(&self) -> Result<PathBuf> {
        Ok(self.folder()?.join(&self.args.filename))
    }

    /// Whether the target file already exists.
    #[must_use]
    pub fn is_locally_available(&self) -> bool {
        self.file_path().is_ok_and(|p| p.is_file())
    }

    fn has_expected_size(&self, path: &Path) -> bool {
        match (self.args.size, path.metadata()) {
            (Some(expected), Ok(meta)) => meta.len() == expected,
            (None, Ok(meta)) => meta.is_file(),
            (_, Err(_)) => false,
        }
    }

    /// Acquire the file. A no-op when it is already present with the expected size.
    ///
    /// # Errors
    /// Returns a network error on transfer failure, a configuration error for nested
    /// sources (prepared through their parent), or [`Error::NotFound`] when a manual
    /// source's file is still missing after confirmation.
    pub fn download(&self) -> Result<()> {
        let target = self.file_path()?;
        if self.has_expected_size(&target) {
            debug!(source = %self.name, "already downloaded");
            return Ok(());
        }
        let url = self.args.url.as_deref().unwrap_or_default();
        match self.source_type {
            SourceType::Http => transport::download(url, &target, None).map(|_| ()),
            SourceType::Browser => {
                transport::download(url, &target, Some(transport::BROWSER_USER_AGENT)).map(|_| ())
            }
            SourceType::Drive => {
                transport::download(&transport::drive_url(url), &target, None).map(|_| ())
            }
            SourceType::Manual => self.await_manual_placement(&target),
            SourceType::Nested => Err(Error::Config(format!(
                "nested source '{}' is materialized by its parent",
                self.name
            ))),
        }
    }

    fn await_manual_placement(&self, target: &Path) -> Result<()> {
        let folder = self.folder()?;
        create_dir_all(folder).io_context(|| format!("mkdir -p {}", folder.display()))?;
        println!("Manual download required for source '{}'.", self.name);
        if let Some(msg) = &self.args.message {
            println!("{msg}");
        }
        if let Some(url) = &self.args.url {
            println!("Download from: {url}");
        }
        println!("Place the file at: {}", target.display());
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            print!("Press Enter once the file is in place... ");
            std::io::stdout().flush().io_context(|| "flush stdout")?;
            let mut line = String::new();
            stdin
                .lock()
                .read_line(&mut line)
                .io_context(|| "read confirmation")?;
        }
        if !target.is_file() {
            return Err(Error::NotFound(target.to_path_buf()));
        }
        Ok(())
    }

    /// Compare the file's digest with the declared checksum. Sources without a
    /// checksum pass unchecked.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] on mismatch.
    pub fn verify_checksum(&self) -> Result<()> {
        let Some(expected) = &self.args.checksum else {
            debug!(source = %self.name, "no checksum declared");
            return Ok(());
        };
        verify_file(&self.file_path()?, expected, self.args.checksum_algorithm)
    }

    /// Resolve the inner paths of this source to absolute paths, unpacking the archive
    /// when any of them is missing or `force` is set.
    ///
    /// # Errors
    /// Returns an integrity error if unpacking fails, or a configuration error if an
    /// inner path is still missing afterwards.
    pub fn get_resources(&self, force: bool) -> Result<BTreeMap<String, PathBuf>> {
        let folder = self.folder()?;
        let resolved: BTreeMap<String, PathBuf> = self
            .args
            .inner_paths
            .iter()
            .map(|(k, v)| (k.clone(), folder.join(v)))
            .collect();
        if !force && resolved.values().all(|p| p.exists()) {
            return Ok(resolved);
        }
        if let Some(kind) = self.args.archive {
            unpack(&self.file_path()?, kind, folder)?;
        }
        if let Some((name, path)) = resolved.iter().find(|(_, p)| !p.exists()) {
            return Err(Error::Config(format!(
                "source '{}': inner path for '{name}' not found at {}",
                self.name,
                path.display()
            )));
        }
        Ok(resolved)
    }

    /// Path of one resource inside this source: its inner path, or the file itself
    /// when the source declares none.
    ///
    /// # Errors
    /// Returns a configuration error before an output folder is assigned.
    pub fn resource_path(&self, resource: &str) -> Result<PathBuf> {
        let folder = self.folder()?;
        Ok(self
            .args
            .inner_paths
            .get(resource)
            .map_or_else(|| folder.join(&self.args.filename), |p| folder.join(p)))
    }

    /// Download unless present, verify, mark prepared. Repeat calls are no-ops.
    ///
    /// # Errors
    /// See [`Source::download`] and [`Source::verify_checksum`]; on error the source
    /// stays unprepared.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        if self.source_type == SourceType::Nested {
            if !self.is_locally_available() {
                return Err(Error::Config(format!(
                    "nested source '{}' missing at {}; prepare its parent first",
                    self.name,
                    self.file_path()?.display()
                )));
            }
        } else if !self.is_locally_available() {
            self.download()?;
        }
        self.verify_checksum()?;
        self.prepared = true;
        info!(source = %self.name, "source prepared");
        Ok(())
    }

    /// Place a nested source inside its parent's unpacked layout.
    ///
    /// # Errors
    /// Returns a configuration error if the parent has no output folder or no inner
    /// path for this source.
    pub fn link_parent(&mut self, parent: &Self) -> Result<()> {
        let inner = parent.args.inner_paths.get(&self.name).ok_or_else(|| {
            Error::Config(format!(
                "parent source '{}' has no inner path for nested source '{}'",
                parent.name, self.name
            ))
        })?;
        let base = parent.folder()?;
        let dir = Path::new(inner).parent().unwrap_or_else(|| Path::new(""));
        self.set_output_folder(base.join(dir));
        Ok(())
    }
}

/// Every source of one dataset version, by name.
#[derive(Clone, Debug, Default)]
pub struct SourceSet {
    sources: BTreeMap<String, Source>,
}

impl SourceSet {
    /// Build sources from declarations, assigning `output_folder` to all non-nested
    /// ones and linking nested sources to their parents.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid declaration, an unknown parent or
    /// an unresolved inner path.
    pub fn new(decls: BTreeMap<String, SourceDecl>, output_folder: &Path) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for (name, decl) in decls {
            let mut s = Source::new(name.clone(), decl)?;
            if s.source_type != SourceType::Nested {
                s.set_output_folder(output_folder);
            }
            sources.insert(name, s);
        }
        let mut set = Self { sources };
        set.link_nested()?;
        Ok(set)
    }

    fn link_nested(&mut self) -> Result<()> {
        let nested: Vec<String> = self
            .sources
            .values()
            .filter(|s| s.args.parent_source_name.is_some())
            .map(|s| s.name.clone())
            .collect();
        for child in nested {
            self.check_acyclic(&child)?;
            self.link_one(&child)?;
        }
        Ok(())
    }

    /// Link `name` to its parent, linking nested ancestors first.
    fn link_one(&mut self, name: &str) -> Result<()> {
        let Some(parent_name) = self
            .sources
            .get(name)
            .and_then(|s| s.args.parent_source_name.clone())
        else {
            return Ok(());
        };
        if self
            .sources
            .get(&parent_name)
            .is_some_and(|p| p.output_folder.is_none())
        {
            self.link_one(&parent_name)?;
        }
        let parent = self
            .sources
            .get(&parent_name)
            .ok_or_else(|| {
                Error::Config(format!(
                    "nested source '{name}' references unknown parent '{parent_name}'"
                ))
            })?
            .clone();
        if let Some(child) = self.sources.get_mut(name) {
            child.link_parent(&parent)?;
        }
        Ok(())
    }

    fn check_acyclic(&self, start: &str) -> Result<()> {
        let mut current = start.to_string();
        for _ in 0..=self.sources.len() {
            match self
                .sources
                .get(&current)
                .and_then(|s| s.args.parent_source_name.clone())
            {
                Some(p) => current = p,
                None => return Ok(()),
            }
        }
        Err(Error::Config(format!(
            "nested source '{start}' has a cyclic parent chain"
        )))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn source(&self, name: &str) -> Result<&Source> {
        self.sources
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown source '{name}'")))
    }

    /// Prepare `name`, preparing and unpacking its parent chain first.
    ///
    /// # Errors
    /// Propagates the first failure along the chain.
    pub fn prepare(&mut self, name: &str) -> Result<()> {
        let parent = self.source(name)?.args.parent_source_name.clone();
        if let Some(parent) = parent {
            self.check_acyclic(name)?;
            self.prepare(&parent)?;
            self.source(&parent)?.get_resources(false)?;
        }
        self.sources
            .get_mut(name)
            .ok_or_else(|| Error::Config(format!("unknown source '{name}'")))?
            .prepare()
    }

    /// Resolved inner paths of `name`, unpacking as needed.
    ///
    /// # Errors
    /// See [`Source::get_resources`].
    pub fn get_resources(&self, name: &str, force: bool) -> Result<BTreeMap<String, PathBuf>> {
        self.source(name)?.get_resources(force)
    }
}
