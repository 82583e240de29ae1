//! `.fpk` font bundles: many font files in one checksummed archive.
//!
//! ```no_run
//! use bitfont::container::{BundleOptions, BundleWriter, Container};
//! use bitfont::stream::{Mode, Stream};
//! use std::io::Write;
//!
//! let out = Stream::open("fonts.fpk", Mode::Write, true)?;
//! let mut bundle = BundleWriter::new(out, BundleOptions::default());
//! let mut member = bundle.open_stream("tiny.yaff", Mode::Write, false)?;
//! member.write_all(b"name: tiny\n")?;
//! member.close()?;
//! bundle.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! A reader holds the whole archive in memory; members decode on open. A
//! writer collects members as their streams close and writes the archive
//! once, when the bundle itself is closed. A writer may start from the
//! members of an existing bundle, which is how bundles are appended to.

mod format;

use std::borrow::BorrowMut;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, warn};
use thiserror::Error;

pub use format::{BundleIndex, IndexRecord, MAGIC};

use crate::codec::{CodecError, CodecId, DEFAULT_LEVEL};
use crate::container::Container;
use crate::error::Result;
use crate::stream::{Mode, Sink, Stream};

/// File extension of bundles, without the dot.
pub const EXTENSION: &str = "fpk";

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),
    #[error("No block header at offset {0}")]
    BadBlock(u64),
    #[error("Checksum mismatch in block at offset {0}")]
    Checksum(u64),
    #[error("Block at offset {offset} declares {declared} bytes but decodes to {actual}")]
    SizeMismatch { offset: u64, declared: u32, actual: usize },
    #[error("Superblock declares {declared} members but index lists {actual}")]
    CountMismatch { declared: u32, actual: usize },
    #[error("Member of {0} bytes is too large for a bundle")]
    TooLarge(usize),
    #[error("Member not found: {0}")]
    NotFound(String),
    #[error("Member already exists: {0}")]
    Exists(String),
    #[error("Bundle `{0}` is open for reading only")]
    ReadOnly(String),
    #[error("Bundle `{0}` is open for writing only")]
    WriteOnly(String),
    #[error("Index error: {0}")]
    Index(#[from] serde_json::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for [`BundleWriter`].
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub codec: CodecId,
    pub level: i32,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self { codec: CodecId::Zstd, level: DEFAULT_LEVEL }
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct BundleReader {
    name:  String,
    data:  Vec<u8>,
    index: BundleIndex,
}

impl BundleReader {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> std::result::Result<Self, BundleError> {
        let index = format::read_index(&data)?;
        Ok(Self { name: name.into(), data, index })
    }

    pub fn index(&self) -> &BundleIndex {
        &self.index
    }

    /// Codec of the first member; an empty bundle has none.
    pub fn codec(&self) -> Option<CodecId> {
        self.index.records.first().and_then(|r| CodecId::from_name(&r.codec))
    }

    /// Every member, decoded, in index order.
    pub fn into_members(self) -> std::result::Result<Vec<(String, Vec<u8>)>, BundleError> {
        self.index
            .records
            .iter()
            .map(|r| Ok((r.name.clone(), format::read_block(&self.data, r.offset)?)))
            .collect()
    }
}

impl Container for BundleReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        Mode::Read
    }

    fn members(&self) -> Result<Vec<String>> {
        Ok(self.index.records.iter().map(|r| r.name.clone()).collect())
    }

    fn open_stream(&mut self, name: &str, mode: Mode, _overwrite: bool) -> Result<Stream> {
        if mode == Mode::Write {
            return Err(BundleError::ReadOnly(self.name.clone()).into());
        }
        let record = self.index.find(name)
            .ok_or_else(|| BundleError::NotFound(name.to_owned()))?;
        let bytes = format::read_block(&self.data, record.offset)?;
        Ok(Stream::from_bytes(format!("{}/{}", self.name, name), bytes)?)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

type Pending = Rc<RefCell<Vec<(String, Vec<u8>)>>>;

/// Buffers one member; hands it to the bundle when its stream closes.
struct MemberSink {
    name:    String,
    buf:     Vec<u8>,
    pending: Pending,
}

impl Write for MemberSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for MemberSink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let MemberSink { name, buf, pending } = *self;
        let mut entries = RefCell::borrow_mut(&pending);
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = buf,
            None => entries.push((name, buf)),
        }
        Ok(())
    }
}

/// Where a bundle is written. An owned stream is closed along with the
/// bundle; a borrowed one is only flushed and stays with its owner.
pub trait BundleOutput: BorrowMut<Stream> {
    fn release(&mut self) -> io::Result<()>;
}

impl BundleOutput for Stream {
    fn release(&mut self) -> io::Result<()> {
        self.close()
    }
}

impl BundleOutput for &mut Stream {
    fn release(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Write-mode bundle over an output stream, owned or borrowed.
pub struct BundleWriter<S: BundleOutput> {
    name:    String,
    out:     S,
    options: BundleOptions,
    pending: Pending,
    closed:  bool,
}

impl<S: BundleOutput> BundleWriter<S> {
    pub fn new(out: S, options: BundleOptions) -> Self {
        let stream: &Stream = std::borrow::Borrow::borrow(&out);
        let name = stream.name().to_owned();
        Self { name, out, options, pending: Rc::default(), closed: false }
    }

    /// Start with `members` already in the bundle.
    pub fn with_members(self, members: Vec<(String, Vec<u8>)>) -> Self {
        *RefCell::borrow_mut(&self.pending) = members;
        self
    }

    fn finalize(&mut self) -> Result<()> {
        let entries = RefCell::borrow(&self.pending);
        debug!("Writing {} member(s) to bundle `{}`.", entries.len(), self.name);
        let bytes = format::write_bundle(&entries, &self.options)?;
        let out: &mut Stream = BorrowMut::borrow_mut(&mut self.out);
        out.write_all(&bytes)?;
        self.out.release()?;
        Ok(())
    }
}

impl<S: BundleOutput> Container for BundleWriter<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        Mode::Write
    }

    fn members(&self) -> Result<Vec<String>> {
        Ok(RefCell::borrow(&self.pending).iter().map(|(n, _)| n.clone()).collect())
    }

    fn open_stream(&mut self, name: &str, mode: Mode, overwrite: bool) -> Result<Stream> {
        if mode == Mode::Read {
            return Err(BundleError::WriteOnly(self.name.clone()).into());
        }
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "bundle already closed").into());
        }
        if !overwrite && self.contains(name)? {
            return Err(BundleError::Exists(name.to_owned()).into());
        }
        let sink = MemberSink {
            name:    name.to_owned(),
            buf:     Vec::new(),
            pending: Rc::clone(&self.pending),
        };
        Ok(Stream::from_sink(name, Box::new(sink))?)
    }

    fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.finalize()
    }
}

impl<S: BundleOutput> Drop for BundleWriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error writing bundle `{}`: {e}", self.name);
        }
    }
}
