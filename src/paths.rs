//! Deterministic filesystem layout.
//!
//! Pure path arithmetic: nothing here touches the filesystem or creates directories.
//!
//! ```text
//! <cache root>/<dataset>/<version>/raw/...                 downloaded and unpacked bytes
//! <cache root>/<dataset>/<version>/processed/...
//! <cache root>/<dataset>/<version>/<dataset>_<version>.pkl dataset snapshot
//! <registry root>/datasets/<name>.yml
//! <registry root>/versions/<name>_<version>.yml
//! <registry root>/metrics/<name>_<version>.yml
//! ```

use crate::cache::get_cache_dir;
use std::path::{Path, PathBuf};

/// Environment variable overriding the registry descriptor directory.
pub const REGISTRY_ENV_VAR: &str = "DATAREC_REGISTRY_DIR";

const RAW_DIR: &str = "raw";
const PROCESSED_DIR: &str = "processed";
const SNAPSHOT_EXT: &str = "pkl";

/// `<root>/<dataset>/<version>`
#[must_use]
pub fn dataset_directory(dataset: &str, version: &str) -> PathBuf {
    get_cache_dir().join(dataset).join(version)
}

/// `<root>/<dataset>/<version>/raw`
#[must_use]
pub fn dataset_raw_directory(dataset: &str, version: &str) -> PathBuf {
    dataset_directory(dataset, version).join(RAW_DIR)
}

/// `<root>/<dataset>/<version>/processed`
#[must_use]
pub fn dataset_processed_directory(dataset: &str, version: &str) -> PathBuf {
    dataset_directory(dataset, version).join(PROCESSED_DIR)
}

/// `<root>/<dataset>/<version>/<dataset>_<version>.pkl`
#[must_use]
pub fn snapshot_path(dataset: &str, version: &str) -> PathBuf {
    dataset_directory(dataset, version).join(format!("{dataset}_{version}.{SNAPSHOT_EXT}"))
}

/// Directory holding the registry descriptors.
#[must_use]
pub fn registry_root() -> PathBuf {
    std::env::var_os(REGISTRY_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map_or_else(
            || Path::new(env!("CARGO_MANIFEST_DIR")).join("registry"),
            PathBuf::from,
        )
}

#[must_use]
pub fn registry_dataset_path(root: &Path, name: &str) -> PathBuf {
    root.join("datasets").join(format!("{name}.yml"))
}

#[must_use]
pub fn registry_version_path(root: &Path, name: &str, version: &str) -> PathBuf {
    root.join("versions").join(format!("{name}_{version}.yml"))
}

#[must_use]
pub fn registry_metrics_path(root: &Path, name: &str, version: &str) -> PathBuf {
    root.join("metrics").join(format!("{name}_{version}.yml"))
}
