//! Transparent (de)compression of data files.
//!
//! Readers open their inputs through [`open_input`] and writers through
//! [`create_output`]; both pick a codec from the file extension, and inputs fall back
//! to magic-byte sniffing. Codecs are feature-gated:
//!
//! - **gzip** (`.gz`) via `flate2` (feature `compression-gzip`)
//! - **zstd** (`.zst`) via `zstd` (feature `compression-zstd`)
//! - **bzip2** (`.bz2`) via `bzip2` (feature `compression-bzip2`)
//! - **xz** (`.xz`) via `xz2` (feature `compression-xz`)
//!
//! Additional codecs can be installed with [`register_codec`].

use crate::error::{Error, IoContext, Result};
use parking_lot::RwLock;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn builtin_codecs() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn codecs() -> Vec<Arc<dyn CompressionCodec>> {
    if let Some(list) = CODEC_REGISTRY.read().as_ref() {
        return list.clone();
    }
    CODEC_REGISTRY
        .write()
        .get_or_insert_with(builtin_codecs)
        .clone()
}

/// Install a custom codec alongside the built-in ones.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    CODEC_REGISTRY
        .write()
        .get_or_insert_with(builtin_codecs)
        .push(codec);
}

/// A stream compression algorithm.
pub trait CompressionCodec: Send + Sync {
    fn name(&self) -> &str;

    /// Lowercase extensions including the leading dot, e.g. `&[".gz"]`.
    fn extensions(&self) -> &[&str];

    /// Leading bytes identifying the format, if it has any.
    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>>;
}

fn detect_from_extension(path: &Path) -> Option<Arc<dyn CompressionCodec>> {
    let name = path.to_string_lossy().to_lowercase();
    codecs()
        .into_iter()
        .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    codecs()
        .into_iter()
        .find(|c| c.magic_bytes().is_some_and(|m| buf.starts_with(m)))
}

/// Wrap `reader` with the decompressor matching `path_hint`, if any.
///
/// # Errors
/// Returns an I/O error if the codec fails to initialize.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let path_hint = path_hint.as_ref();
    if let Some(codec) = detect_from_extension(path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .io_context(|| format!("wrap reader with {} codec", codec.name()));
    }
    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader_dyn(Box::new(buffered))
            .io_context(|| format!("wrap reader with {} codec", codec.name()));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with the compressor matching the extension of `path_hint`, if any.
///
/// # Errors
/// Returns an I/O error if the codec fails to initialize.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write>> {
    let path_hint = path_hint.as_ref();
    if let Some(codec) = detect_from_extension(path_hint) {
        return codec
            .wrap_writer_dyn(Box::new(writer))
            .io_context(|| format!("wrap writer with {} codec", codec.name()));
    }
    Ok(Box::new(BufWriter::new(writer)))
}

/// Open a reader input, failing early with [`Error::NotFound`].
///
/// # Errors
/// Returns `NotFound` for a missing file or an I/O error if it cannot be opened.
pub fn open_input(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let f = File::open(path).io_context(|| format!("open {}", path.display()))?;
    Ok(BufReader::new(auto_detect_reader(f, path)?))
}

/// Create a writer output, making parent directories as needed.
///
/// # Errors
/// Returns an I/O error if directories or the file cannot be created.
pub fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).io_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).io_context(|| format!("create {}", path.display()))?;
    auto_detect_writer(f, path)
}

/// Read a whole input into a string, decompressing as needed.
///
/// # Errors
/// See [`open_input`].
pub fn read_to_string(path: &Path) -> Result<String> {
    let mut s = String::new();
    open_input(path)?
        .read_to_string(&mut s)
        .io_context(|| format!("read {}", path.display()))?;
    Ok(s)
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(e.auto_finish()) as Box<dyn Write>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(xz2::read::XzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(Box::new(xz2::write::XzEncoder::new(writer, 6)))
    }
}
