//! Byte acquisition over HTTP.
//!
//! Downloads stream into `<target>.part` and are renamed into place only after the
//! last byte arrives, so an interrupted transfer never leaves a file that looks
//! complete. Progress goes to an `indicatif` bar on a terminal and to `tracing`
//! otherwise.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// A browser user agent for hosts that refuse unknown clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DRIVE_ENDPOINT: &str = "https://drive.usercontent.google.com/download";

/// File id in a share link: `/file/d/<id>/view` or `?id=<id>&...`.
static DRIVE_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/d/([^/?#]+)|[?&]id=([^&#]+)").ok());

/// Direct download URL for a drive file id or share link.
#[must_use]
pub fn drive_url(id_or_url: &str) -> String {
    let id = DRIVE_ID
        .as_ref()
        .and_then(|re| re.captures(id_or_url))
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map_or(id_or_url, |m| m.as_str());
    format!("{DRIVE_ENDPOINT}?id={id}&export=download&confirm=t")
}

#[cfg(feature = "download")]
mod http {
    use super::{Error, Path, Result};
    use crate::error::IoContext;
    use human_bytes::human_bytes;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::fs::{self, File, create_dir_all};
    use std::io::{IsTerminal, Read, Write};
    use tracing::info;

    const CHUNK: usize = 64 * 1024;

    fn progress(total: Option<u64>) -> Option<ProgressBar> {
        if !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = total.map_or_else(ProgressBar::new_spinner, ProgressBar::new);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:50.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        Some(pb)
    }

    pub fn download(url: &str, target: &Path, user_agent: Option<&str>) -> Result<u64> {
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).io_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Network(format!("client setup: {e}")))?;
        let mut resp = client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::Network(format!("GET {url}: {e}")))?;
        let total = resp.content_length();
        info!(url, path = %target.display(), bytes = ?total, "downloading");

        let part = target.with_extension(
            target
                .extension()
                .map_or_else(|| "part".to_string(), |e| format!("{}.part", e.to_string_lossy())),
        );
        let mut out = File::create(&part).io_context(|| format!("create {}", part.display()))?;
        let pb = progress(total);
        let mut buf = vec![0u8; CHUNK];
        let mut written = 0u64;
        loop {
            let n = resp
                .read(&mut buf)
                .map_err(|e| Error::Network(format!("GET {url}: {e}")))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .io_context(|| format!("write {}", part.display()))?;
            written += n as u64;
            if let Some(pb) = &pb {
                pb.set_position(written);
            }
        }
        out.flush().io_context(|| format!("flush {}", part.display()))?;
        drop(out);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        if let Some(expected) = total
            && expected != written
        {
            let _ = fs::remove_file(&part);
            return Err(Error::Network(format!(
                "GET {url}: received {written} of {expected} bytes"
            )));
        }
        fs::rename(&part, target)
            .io_context(|| format!("rename {} -> {}", part.display(), target.display()))?;
        #[allow(clippy::cast_precision_loss)]
        let size = human_bytes(written as f64);
        info!(path = %target.display(), size, "download complete");
        Ok(written)
    }
}

/// Stream `url` into `target`, returning the number of bytes written.
///
/// # Errors
/// Returns [`Error::Network`] on a failed request or a truncated body, and
/// [`Error::Dependency`] when the `download` feature is disabled.
pub fn download(url: &str, target: &Path, user_agent: Option<&str>) -> Result<u64> {
    #[cfg(feature = "download")]
    {
        http::download(url, target, user_agent)
    }
    #[cfg(not(feature = "download"))]
    {
        let _ = (url, target, user_agent);
        Err(Error::Dependency(
            "downloading requires the `download` feature".into(),
        ))
    }
}

/// Fetch a small text document such as a remote registry descriptor.
///
/// # Errors
/// Same as [`download`].
pub fn fetch_text(url: &str) -> Result<String> {
    #[cfg(feature = "download")]
    {
        reqwest::blocking::get(url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|e| Error::Network(format!("GET {url}: {e}")))
    }
    #[cfg(not(feature = "download"))]
    {
        let _ = url;
        Err(Error::Dependency(
            "fetching remote descriptors requires the `download` feature".into(),
        ))
    }
}
