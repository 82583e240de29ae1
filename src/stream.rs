//! Named byte streams.
//!
//! A [`Stream`] is a single open handle with a display name and a direction.
//! Read streams can peek their leading bytes without consuming them, which is
//! what magic-byte identification runs on.
//!
//! # Compression
//! Compression is transparent at this layer. On read, a gzip or zstd
//! signature is detected by content and the stream decodes on the fly. On
//! write there is no content to sniff, so a `.gz` / `.zst` name suffix selects
//! the encoder. The display name always keeps the suffix; callers matching
//! names against file extensions use [`strip_compression_suffix`].
//!
//! # Release
//! [`Stream::close`] flushes and finalises encoders. It runs at most once;
//! a stream dropped without being closed is released on drop and any
//! finalisation error is logged.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;

use crate::error::{Error, Result};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Name suffixes handled by the transparent compression layer.
pub const COMPRESSION_SUFFIXES: &[&str] = &["gz", "zst"];

/// Strip one known compression suffix, case-insensitively.
pub fn strip_compression_suffix(name: &str) -> &str {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if COMPRESSION_SUFFIXES.iter().any(|s| s.eq_ignore_ascii_case(ext)) {
            return stem;
        }
    }
    name
}

// ── Mode ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" | "read"  => Ok(Mode::Read),
            "w" | "write" => Ok(Mode::Write),
            _ => Err(Error::config(format!("Unsupported mode '{s}'."))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Read  => "r",
            Mode::Write => "w",
        })
    }
}

// ── Sinks ────────────────────────────────────────────────────────────────────

/// Destination of a write stream.
///
/// `finish` is called exactly once when the owning stream is closed and must
/// flush everything down to the underlying resource.
pub trait Sink: Write {
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Adapter for any plain writer; finishing only flushes it.
pub struct WriterSink<W: Write>(pub W);

impl<W: Write> Write for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn flush(&mut self) -> io::Result<()> { self.0.flush() }
}

impl<W: Write> Sink for WriterSink<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

struct GzipSink(GzEncoder<Box<dyn Sink>>);

impl Write for GzipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn flush(&mut self) -> io::Result<()> { self.0.flush() }
}

impl Sink for GzipSink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.0.finish()?.finish()
    }
}

struct ZstdSink(zstd::stream::write::Encoder<'static, Box<dyn Sink>>);

impl Write for ZstdSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.0.write(buf) }
    fn flush(&mut self) -> io::Result<()> { self.0.flush() }
}

impl Sink for ZstdSink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.0.finish()?.finish()
    }
}

/// Wrap `sink` in the encoder selected by `name`'s suffix, if any.
fn encode_for_name(name: &str, sink: Box<dyn Sink>) -> io::Result<Box<dyn Sink>> {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    Ok(match ext.as_deref() {
        Some("gz")  => Box::new(GzipSink(GzEncoder::new(sink, Compression::default()))),
        Some("zst") => Box::new(ZstdSink(zstd::stream::write::Encoder::new(
            sink,
            crate::codec::DEFAULT_LEVEL,
        )?)),
        _ => sink,
    })
}

// ── Peekable source ──────────────────────────────────────────────────────────

struct Source {
    head:  Vec<u8>,
    pos:   usize,
    inner: Box<dyn Read>,
}

impl Source {
    fn new(inner: Box<dyn Read>) -> Self {
        Self { head: Vec::new(), pos: 0, inner }
    }

    fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.head.len() - self.pos < n {
            let mut chunk = vec![0u8; n - (self.head.len() - self.pos)];
            let got = self.inner.read(&mut chunk)?;
            if got == 0 {
                break;
            }
            self.head.extend_from_slice(&chunk[..got]);
        }
        let end = self.head.len().min(self.pos + n);
        Ok(&self.head[self.pos..end])
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.head.len() {
            let n = buf.len().min(self.head.len() - self.pos);
            buf[..n].copy_from_slice(&self.head[self.pos..self.pos + n]);
            self.pos += n;
            if self.pos == self.head.len() {
                self.head.clear();
                self.pos = 0;
            }
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

/// Detect a compression signature and stack the matching decoder.
fn decode_by_content(mut source: Source) -> io::Result<Source> {
    let (is_gzip, is_zstd) = {
        let head = source.peek(ZSTD_MAGIC.len())?;
        (head.starts_with(GZIP_MAGIC), head.starts_with(ZSTD_MAGIC))
    };
    if is_gzip {
        return Ok(Source::new(Box::new(MultiGzDecoder::new(source))));
    }
    if is_zstd {
        return Ok(Source::new(Box::new(zstd::stream::read::Decoder::new(source)?)));
    }
    Ok(source)
}

// ── Stream ───────────────────────────────────────────────────────────────────

enum Inner {
    Reader(Source),
    Writer(Box<dyn Sink>),
    Closed,
}

pub struct Stream {
    name:  String,
    mode:  Mode,
    inner: Inner,
}

impl Stream {
    /// Open a file on the filesystem.
    ///
    /// In write mode without `overwrite`, an existing file is an
    /// `AlreadyExists` error.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode, overwrite: bool) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        match mode {
            Mode::Read => Stream::from_reader(name, File::open(path)?),
            Mode::Write => {
                let file = if overwrite {
                    File::create(path)?
                } else {
                    OpenOptions::new().write(true).create_new(true).open(path)?
                };
                Stream::from_sink(name, Box::new(WriterSink(BufWriter::new(file))))
            }
        }
    }

    /// Read stream over any reader; compressed content is decoded.
    pub fn from_reader<R: Read + 'static>(name: impl Into<String>, reader: R) -> io::Result<Self> {
        let source = decode_by_content(Source::new(Box::new(reader)))?;
        Ok(Self { name: name.into(), mode: Mode::Read, inner: Inner::Reader(source) })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> io::Result<Self> {
        Stream::from_reader(name, io::Cursor::new(bytes))
    }

    /// Write stream into `sink`; a `.gz` / `.zst` name selects an encoder.
    pub fn from_sink(name: impl Into<String>, sink: Box<dyn Sink>) -> io::Result<Self> {
        let name = name.into();
        let sink = encode_for_name(&name, sink)?;
        Ok(Self { name, mode: Mode::Write, inner: Inner::Writer(sink) })
    }

    pub fn from_writer<W: Write + 'static>(name: impl Into<String>, writer: W) -> io::Result<Self> {
        Stream::from_sink(name, Box::new(WriterSink(writer)))
    }

    pub fn stdin() -> io::Result<Self> {
        Stream::from_reader("<stdin>", io::stdin())
    }

    pub fn stdout() -> io::Result<Self> {
        Stream::from_writer("<stdout>", io::stdout())
    }

    /// Display name, as given when opened.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final path component of the display name.
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn can_peek(&self) -> bool {
        matches!(self.inner, Inner::Reader(_))
    }

    /// Up to `n` leading bytes, left in place for the next read.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        match &mut self.inner {
            Inner::Reader(source) => source.peek(n),
            _ => Err(not_readable(&self.name)),
        }
    }

    /// Read the rest of the stream as text.
    ///
    /// Content that is not valid UTF-8 is taken as Latin-1, which is what
    /// older bitmap font files tend to be written in.
    pub fn read_text(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
        })
    }

    pub fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner, Inner::Closed)
    }

    /// Flush and release. Closing an already closed stream does nothing.
    pub fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Writer(sink) => sink.finish(),
            Inner::Reader(_) | Inner::Closed => Ok(()),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Reader(source) => source.read(buf),
            _ => Err(not_readable(&self.name)),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Writer(sink) => sink.write(buf),
            _ => Err(not_writable(&self.name)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Writer(sink) => sink.flush(),
            _ => Ok(()),
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error releasing `{}`: {e}", self.name);
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn not_readable(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, format!("`{name}` is not open for reading"))
}

fn not_writable(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, format!("`{name}` is not open for writing"))
}
