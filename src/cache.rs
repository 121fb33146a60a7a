//! Process-wide cache root management.
//!
//! The cache root is resolved with this precedence:
//!
//! 1. an explicitly set path ([`set_cache_dir`], sticky until [`reset_cache_dir`]),
//! 2. the `DATAREC_CACHE_DIR` environment variable,
//! 3. the OS cache directory (`dirs::cache_dir()/datarec`).
//!
//! All operations hold a reentrant lock for their whole duration, so a `clear_cache`
//! never observes a root that changes halfway through. The cache is not coordinated
//! across processes.
//!
//! ```no_run
//! use datarec::cache::{get_cache_dir, use_cache_dir};
//!
//! # fn main() -> datarec::Result<()> {
//! {
//!     let _guard = use_cache_dir("/tmp/datarec-scratch")?;
//!     assert_eq!(get_cache_dir(), std::path::PathBuf::from("/tmp/datarec-scratch"));
//! } // previous root restored here
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, IoContext, Result};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the default cache root.
pub const CACHE_ENV_VAR: &str = "DATAREC_CACHE_DIR";

const APP_NAME: &str = "datarec";
const PROBE_FILE: &str = ".datarec_write_probe";

static CACHE_ROOT: ReentrantMutex<RefCell<Option<PathBuf>>> =
    parking_lot::const_reentrant_mutex(RefCell::new(None));

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Current cache root.
#[must_use]
pub fn get_cache_dir() -> PathBuf {
    let guard = CACHE_ROOT.lock();
    let explicit = guard.borrow().clone();
    explicit.unwrap_or_else(|| {
        std::env::var_os(CACHE_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map_or_else(default_cache_dir, |v| absolute(Path::new(&v)))
    })
}

/// Create `dir` if needed and check that a file can be created in it.
fn ensure_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::PermissionDenied {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let probe = dir.join(PROBE_FILE);
    File::create(&probe).map_err(|e| Error::PermissionDenied {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    fs::remove_file(&probe).map_err(|e| Error::PermissionDenied {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Set the cache root explicitly.
///
/// With `persist_env`, `DATAREC_CACHE_DIR` is also set for the current process so
/// child processes inherit the choice.
///
/// # Errors
/// Returns [`Error::PermissionDenied`] if the directory cannot be created or written.
pub fn set_cache_dir(path: impl AsRef<Path>, persist_env: bool) -> Result<PathBuf> {
    let path = absolute(path.as_ref());
    ensure_writable(&path)?;
    let guard = CACHE_ROOT.lock();
    *guard.borrow_mut() = Some(path.clone());
    if persist_env {
        // SAFETY: the cache lock is held and the crate never spawns threads that read
        // the environment concurrently.
        unsafe { std::env::set_var(CACHE_ENV_VAR, &path) };
    }
    info!(root = %path.display(), "cache root set");
    Ok(path)
}

/// Drop the explicit override; the environment or OS default applies again.
pub fn reset_cache_dir() -> PathBuf {
    let guard = CACHE_ROOT.lock();
    *guard.borrow_mut() = None;
    get_cache_dir()
}

/// Re-resolve the root from the environment, discarding any explicit override.
///
/// # Errors
/// Returns [`Error::PermissionDenied`] if the environment points at an unwritable directory.
pub fn reload_cache_dir_from_env() -> Result<PathBuf> {
    let guard = CACHE_ROOT.lock();
    *guard.borrow_mut() = None;
    let root = get_cache_dir();
    if std::env::var_os(CACHE_ENV_VAR).is_some() {
        ensure_writable(&root)?;
    }
    Ok(root)
}

/// Scoped cache root override; restores the previous root when dropped.
#[must_use = "the override ends when the guard is dropped"]
pub struct CacheDirGuard {
    previous: Option<PathBuf>,
    root: PathBuf,
}

impl CacheDirGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl Drop for CacheDirGuard {
    fn drop(&mut self) {
        let guard = CACHE_ROOT.lock();
        *guard.borrow_mut() = self.previous.take();
        debug!(root = %self.root.display(), "cache root override ended");
    }
}

/// Use `path` as the cache root until the returned guard is dropped.
///
/// # Errors
/// Returns [`Error::PermissionDenied`] if the directory cannot be created or written.
pub fn use_cache_dir(path: impl AsRef<Path>) -> Result<CacheDirGuard> {
    let root = absolute(path.as_ref());
    ensure_writable(&root)?;
    let guard = CACHE_ROOT.lock();
    let previous = guard.replace(Some(root.clone()));
    Ok(CacheDirGuard { previous, root })
}

/// Lexically normalize `path` (no filesystem access).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `subpath` against `root`, refusing anything that escapes it.
fn resolve_under(root: &Path, subpath: Option<&Path>) -> Result<PathBuf> {
    let root = normalize(root);
    let target = match subpath {
        None => root.clone(),
        Some(p) if p.is_absolute() => normalize(p),
        Some(p) => normalize(&root.join(p)),
    };
    match target.strip_prefix(&root) {
        Ok(rel) if !rel.components().any(|c| matches!(c, Component::ParentDir)) => Ok(target),
        _ => Err(Error::OutsideCache { path: target, root }),
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    fs::canonicalize(root).io_context(|| format!("canonicalize {}", root.display()))
}

/// Where `path` physically lives. With `unlinking`, a symlink is resolved through its
/// parent only: removing it unlinks the link and leaves its target alone.
fn physical(path: &Path, unlinking: bool) -> Result<PathBuf> {
    let is_link =
        unlinking && fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    let resolved = match (is_link, path.parent(), path.file_name()) {
        (true, Some(parent), Some(name)) => fs::canonicalize(parent).map(|p| p.join(name)),
        _ => fs::canonicalize(path),
    };
    resolved.io_context(|| format!("canonicalize {}", path.display()))
}

/// Refuse an existing `path` that reaches outside `real_root` through a symlink.
fn ensure_inside(real_root: &Path, path: &Path, unlinking: bool) -> Result<()> {
    let real = physical(path, unlinking)?;
    if real.starts_with(real_root) {
        Ok(())
    } else {
        Err(Error::OutsideCache {
            path: real,
            root: real_root.to_path_buf(),
        })
    }
}

/// One entry of a cache listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub size_bytes: u64,
}

/// Recursive size of `path`, skipping symlinks and entries that vanish mid-walk.
fn dir_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.file_type().is_symlink() {
        return 0;
    }
    if meta.is_file() {
        return meta.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .map(|e| dir_size(&e.path()))
        .sum()
}

/// Breadth-first listing of the cache (or `subpath`) up to `max_depth` levels.
///
/// # Errors
/// Returns [`Error::OutsideCache`] if `subpath` escapes the root.
pub fn list_cache(subpath: Option<&Path>, max_depth: usize) -> Result<Vec<CacheEntry>> {
    let _guard = CACHE_ROOT.lock();
    let root = get_cache_dir();
    let start = resolve_under(&root, subpath)?;
    let mut out = Vec::new();
    if !start.is_dir() {
        return Ok(out);
    }
    ensure_inside(&canonical_root(&root)?, &start, false)?;
    let mut queue = VecDeque::from([(start, 0usize)]);
    while let Some((dir, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Ok(rd) = fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<PathBuf> = rd.filter_map(|e| e.ok().map(|e| e.path())).collect();
        children.sort();
        for path in children {
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };
            let is_dir = meta.is_dir();
            out.push(CacheEntry {
                size_bytes: if is_dir { dir_size(&path) } else { meta.len() },
                is_dir,
                path: path.clone(),
            });
            if is_dir {
                queue.push_back((path, depth + 1));
            }
        }
    }
    Ok(out)
}

/// Total size in bytes of the cache (or `subpath`).
///
/// # Errors
/// Returns [`Error::OutsideCache`] if `subpath` escapes the root.
pub fn cache_size(subpath: Option<&Path>) -> Result<u64> {
    let _guard = CACHE_ROOT.lock();
    let root = get_cache_dir();
    let target = resolve_under(&root, subpath)?;
    if !target.exists() {
        return Ok(0);
    }
    ensure_inside(&canonical_root(&root)?, &target, false)?;
    Ok(dir_size(&target))
}

/// [`cache_size`] formatted for humans (`"12.3 MiB"`).
///
/// # Errors
/// See [`cache_size`].
#[allow(clippy::cast_precision_loss)]
pub fn cache_size_human(subpath: Option<&Path>) -> Result<String> {
    cache_size(subpath).map(|b| human_bytes::human_bytes(b as f64))
}

/// Ask the operator to confirm a destructive action. `None` when stdin is not a terminal.
fn confirm(prompt: &str) -> Option<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return None;
    }
    print!("{prompt} [y/N] ");
    std::io::stdout().flush().ok()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer).ok()?;
    Some(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

/// Delete cache content.
///
/// * `subpath` - directory or file under the root to clear; the whole root when `None`.
/// * `patterns` - optional glob patterns, relative to the target, restricting what is removed.
/// * `force` - skip the interactive confirmation.
///
/// Without `force`, a preview is printed and the operator must confirm; if stdin is not
/// interactive nothing is deleted and an empty list is returned.
///
/// # Errors
/// Returns [`Error::OutsideCache`] before touching the filesystem if the target or any
/// match escapes the root, lexically or through a symlink, or an I/O error if a
/// deletion fails. A symlink inside the root is unlinked, never followed.
pub fn clear_cache(subpath: Option<&Path>, patterns: &[&str], force: bool) -> Result<Vec<PathBuf>> {
    let _guard = CACHE_ROOT.lock();
    let root = normalize(&get_cache_dir());
    let target = resolve_under(&root, subpath)?;
    if !target.exists() {
        return Ok(Vec::new());
    }
    let real_root = canonical_root(&root)?;

    let mut victims: Vec<PathBuf> = Vec::new();
    if patterns.is_empty() {
        if target == root {
            let rd = fs::read_dir(&target).io_context(|| format!("read {}", target.display()))?;
            victims.extend(rd.filter_map(|e| e.ok().map(|e| e.path())));
        } else {
            victims.push(target.clone());
        }
    } else {
        for pattern in patterns {
            let full = target.join(pattern);
            let full = full.to_string_lossy();
            let matches = glob::glob(&full)
                .map_err(|e| Error::Usage(format!("invalid glob pattern '{pattern}': {e}")))?;
            for path in matches.filter_map(std::result::Result::ok) {
                resolve_under(&root, Some(&path))?;
                victims.push(path);
            }
        }
    }
    victims.sort();
    victims.dedup();
    for v in &victims {
        ensure_inside(&real_root, v, true)?;
    }
    if victims.is_empty() {
        return Ok(victims);
    }

    if !force {
        println!("The following cache entries will be deleted:");
        for v in &victims {
            println!("  {}", v.display());
        }
        match confirm("Proceed?") {
            Some(true) => {}
            Some(false) => return Ok(Vec::new()),
            None => {
                warn!("cache clear aborted: confirmation required but stdin is not interactive");
                return Ok(Vec::new());
            }
        }
    }

    for v in &victims {
        let Ok(meta) = fs::symlink_metadata(v) else {
            continue;
        };
        if meta.is_dir() {
            fs::remove_dir_all(v).io_context(|| format!("rm -r {}", v.display()))?;
        } else {
            fs::remove_file(v).io_context(|| format!("rm {}", v.display()))?;
        }
    }
    info!(count = victims.len(), root = %root.display(), "cache entries removed");
    Ok(victims)
}

/// Sort order for [`cache_summary`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummarySort {
    #[default]
    Size,
    Name,
}

/// Print and return the top-level cache entries.
///
/// # Errors
/// Propagates listing errors.
#[allow(clippy::cast_precision_loss)]
pub fn cache_summary(sort_by: SummarySort) -> Result<Vec<CacheEntry>> {
    let _guard = CACHE_ROOT.lock();
    let root = get_cache_dir();
    let mut entries = list_cache(None, 1)?;
    match sort_by {
        SummarySort::Size => entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
        SummarySort::Name => entries.sort_by(|a, b| a.path.cmp(&b.path)),
    }
    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!("\n========== Cache: {} ==========", root.display());
    for e in &entries {
        let name = e
            .path
            .file_name()
            .map_or_else(|| e.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let suffix = if e.is_dir { "/" } else { "" };
        println!(
            "{:>12}  {name}{suffix}",
            human_bytes::human_bytes(e.size_bytes as f64)
        );
    }
    println!("--------------------------------------");
    println!("{:>12}  total", human_bytes::human_bytes(total as f64));
    Ok(entries)
}
