//! Scratch directories and an isolated cache root for tests.

use crate::cache::{CacheDirGuard, use_cache_dir};
use crate::error::{IoContext, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

static CACHE_LOCK: Mutex<()> = Mutex::new(());

/// A temporary directory for input and output files, deleted when dropped.
#[derive(Debug)]
pub struct TempDataDir {
    dir: TempDir,
}

impl TempDataDir {
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().io_context(|| "create temporary directory")?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name` inside the directory, creating subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn write(&self, name: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).io_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        fs::write(&path, contents).io_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Read a file inside the directory as text.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn read(&self, name: impl AsRef<Path>) -> Result<String> {
        let path = self.join(name);
        fs::read_to_string(&path).io_context(|| format!("read {}", path.display()))
    }
}

/// A fresh cache root in a temporary directory, active until dropped.
///
/// Holding a `TempCache` also holds a process-wide test lock, so two tests never
/// swap the cache root under each other.
pub struct TempCache {
    guard: CacheDirGuard,
    _dir: TempDir,
    _lock: MutexGuard<'static, ()>,
}

impl TempCache {
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created, or a permission error
    /// if it cannot be used as a cache root.
    pub fn new() -> Result<Self> {
        let lock = CACHE_LOCK.lock();
        let dir = TempDir::new().io_context(|| "create temporary cache")?;
        let guard = use_cache_dir(dir.path())?;
        Ok(Self {
            guard,
            _dir: dir,
            _lock: lock,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.guard.path()
    }
}
