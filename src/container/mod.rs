//! Containers: named namespaces of streams.
//!
//! Two kinds ship with the crate: filesystem [`Directory`] trees and `.fpk`
//! font bundles ([`bundle`]). Whether a location is a container is decided
//! by trying, never by its name alone, except when writing a location that
//! has no content yet.
//!
//! The probe functions classify a candidate three ways ([`Probe`]) instead of
//! failing on "not a container", so callers branch on a value.

pub mod bundle;
pub mod directory;

use std::borrow::{Borrow, BorrowMut};
use std::collections::HashSet;
use std::path::{Path, MAIN_SEPARATOR};

use log::debug;

use crate::error::{Error, Result};
use crate::stream::{strip_compression_suffix, Mode, Stream};

pub use bundle::{BundleOptions, BundleOutput, BundleReader, BundleWriter};
pub use directory::Directory;

/// A hierarchical namespace of named streams.
pub trait Container {
    /// Display name.
    fn name(&self) -> &str;

    fn mode(&self) -> Mode;

    /// Member names, in an order that is stable between calls.
    fn members(&self) -> Result<Vec<String>>;

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.members()?.iter().any(|m| m == name))
    }

    /// Open a member as a stream. `overwrite` only matters in write mode.
    fn open_stream(&mut self, name: &str, mode: Mode, overwrite: bool) -> Result<Stream>;

    /// Open a member as a nested container.
    fn open_container(&mut self, name: &str, mode: Mode) -> Result<Box<dyn Container>> {
        let stream = self.open_stream(name, mode, true)?;
        match probe_stream(stream, mode) {
            Probe::Container(container) => Ok(container),
            Probe::PlainFile(_) => Err(Error::format(format!("`{name}` is not a container"))),
            Probe::Invalid(e) => Err(e),
        }
    }

    /// A member name built from `stem` and `ext` that no current member has.
    fn unused_name(&self, stem: &str, ext: &str) -> Result<String> {
        let taken: HashSet<String> = self.members()?.into_iter().collect();
        Ok(unused_name_in(&taken, stem, ext))
    }

    /// Filesystem location backing this container, for plugins that need
    /// to reach files next to the one they are reading.
    fn root(&self) -> Option<&Path> {
        None
    }

    /// Commit pending writes and release. Must be safe to call twice.
    fn close(&mut self) -> Result<()>;
}

/// `stem.ext`, or `stem.N.ext` for the smallest `N` not in `taken`.
pub fn unused_name_in(taken: &HashSet<String>, stem: &str, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    let candidate = |n: usize| match (n, ext.is_empty()) {
        (0, true)  => stem.to_owned(),
        (0, false) => format!("{stem}.{ext}"),
        (n, true)  => format!("{stem}.{n}"),
        (n, false) => format!("{stem}.{n}.{ext}"),
    };
    let mut n = 0;
    loop {
        let name = candidate(n);
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}

// ── Probing ──────────────────────────────────────────────────────────────────

/// Outcome of asking whether a location is a container.
pub enum Probe<'a, T> {
    /// It is; here it is, opened.
    Container(Box<dyn Container + 'a>),
    /// It is not; the candidate is handed back untouched.
    PlainFile(T),
    /// Something went wrong looking.
    Invalid(Error),
}

impl<T> std::fmt::Debug for Probe<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Probe::Container(c) => write!(f, "Container({})", c.name()),
            Probe::PlainFile(_) => f.write_str("PlainFile"),
            Probe::Invalid(e)   => write!(f, "Invalid({e})"),
        }
    }
}

/// True if the name (compression suffix aside) carries the bundle extension.
fn has_bundle_suffix(name: &str) -> bool {
    strip_compression_suffix(name)
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(bundle::EXTENSION))
}

/// Classify a filesystem path.
///
/// Read: a directory, or a file whose content is a bundle. Write: an existing
/// directory, a path ending in a separator (created as a directory), or a
/// `.fpk` name (a bundle, appended to if it exists).
pub fn probe_path(path: &Path, mode: Mode, overwrite: bool) -> Probe<'static, ()> {
    if path.is_dir() {
        return match Directory::open(path, mode) {
            Ok(dir) => Probe::Container(Box::new(dir)),
            Err(e)  => Probe::Invalid(e.into()),
        };
    }
    let text = path.to_string_lossy();
    match mode {
        Mode::Read => {
            if !path.is_file() {
                return Probe::PlainFile(());
            }
            match Stream::open(path, Mode::Read, false) {
                Ok(stream) => match probe_stream(stream, Mode::Read) {
                    Probe::Container(c) => Probe::Container(c),
                    Probe::PlainFile(_) => Probe::PlainFile(()),
                    Probe::Invalid(e)   => Probe::Invalid(e),
                },
                Err(e) => Probe::Invalid(e.into()),
            }
        }
        Mode::Write if text.ends_with(MAIN_SEPARATOR) || text.ends_with('/') => {
            match Directory::open(path, Mode::Write) {
                Ok(dir) => Probe::Container(Box::new(dir)),
                Err(e)  => Probe::Invalid(e.into()),
            }
        }
        Mode::Write if has_bundle_suffix(&text) => match append_bundle(path, overwrite) {
            Ok(writer) => Probe::Container(Box::new(writer)),
            Err(e)     => Probe::Invalid(e),
        },
        Mode::Write => Probe::PlainFile(()),
    }
}

/// Open a bundle for writing without losing what it already holds.
///
/// The members of an existing bundle are carried over, in the bundle's own
/// codec, and the file is rewritten on close. A file at `path` that is not a
/// bundle is only replaced if `overwrite` is set.
fn append_bundle(path: &Path, overwrite: bool) -> Result<BundleWriter<Stream>> {
    let mut options = BundleOptions::default();
    let mut members = Vec::new();
    let mut replace = overwrite;
    if path.is_file() {
        let bytes = Stream::open(path, Mode::Read, false)?.read_bytes()?;
        match BundleReader::from_bytes(path.to_string_lossy(), bytes) {
            Ok(existing) => {
                options.codec = existing.codec().unwrap_or(options.codec);
                members = existing.into_members()?;
                debug!("Appending to `{}` with {} member(s).", path.display(), members.len());
                replace = true;
            }
            Err(e) => debug!("`{}` is not a bundle: {e}", path.display()),
        }
    }
    let out = Stream::open(path, Mode::Write, replace)?;
    Ok(BundleWriter::new(out, options).with_members(members))
}

/// Classify an open stream: is it itself a bundle?
///
/// Reading decides by magic bytes; writing by the `.fpk` name suffix. A plain
/// stream is handed back unread.
pub fn probe_stream<'a, S>(mut stream: S, mode: Mode) -> Probe<'a, S>
where
    S: BundleOutput + 'a,
{
    match mode {
        Mode::Read => {
            let s: &mut Stream = stream.borrow_mut();
            let is_bundle = match s.peek(bundle::MAGIC.len()) {
                Ok(head) => head == bundle::MAGIC,
                Err(e)   => return Probe::Invalid(e.into()),
            };
            if !is_bundle {
                return Probe::PlainFile(stream);
            }
            let s: &mut Stream = stream.borrow_mut();
            let name = s.name().to_owned();
            match s.read_bytes() {
                Ok(bytes) => match BundleReader::from_bytes(name, bytes) {
                    Ok(reader) => Probe::Container(Box::new(reader)),
                    Err(e)     => Probe::Invalid(e.into()),
                },
                Err(e) => Probe::Invalid(e.into()),
            }
        }
        Mode::Write => {
            let s: &Stream = stream.borrow();
            if has_bundle_suffix(s.name()) {
                Probe::Container(Box::new(BundleWriter::new(stream, BundleOptions::default())))
            } else {
                Probe::PlainFile(stream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unused_name_counts_up() {
        let taken: HashSet<String> =
            ["Fixed.yaff", "Fixed.1.yaff"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unused_name_in(&taken, "Fixed", "yaff"), "Fixed.2.yaff");
        assert_eq!(unused_name_in(&taken, "Other", ".yaff"), "Other.yaff");
        assert_eq!(unused_name_in(&taken, "bare", ""), "bare");
    }

    #[test]
    fn bundle_suffix_ignores_compression() {
        assert!(has_bundle_suffix("fonts.fpk"));
        assert!(has_bundle_suffix("fonts.FPK.gz"));
        assert!(!has_bundle_suffix("fonts.flf"));
    }

    #[test]
    fn plain_stream_is_handed_back_unread() {
        let stream = Stream::from_bytes("a.flf", b"flf2a$ 1 1 3 0 0\n".to_vec()).unwrap();
        match probe_stream(stream, Mode::Read) {
            Probe::PlainFile(mut s) => assert_eq!(s.peek(5).unwrap(), b"flf2a"),
            other => panic!("expected plain file, got {other:?}"),
        }
    }

    #[test]
    fn missing_path_is_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let probe = probe_path(&dir.path().join("nope.flf"), Mode::Read, false);
        assert!(matches!(probe, Probe::PlainFile(())));
    }

    #[test]
    fn directory_path_is_container() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(probe_path(dir.path(), Mode::Read, false), Probe::Container(_)));
    }

    proptest! {
        #[test]
        fn unused_name_is_never_taken(
            names in proptest::collection::hash_set("[a-c]{1,2}(\\.[0-3])?\\.yaff", 0..24),
            stem in "[a-c]{1,2}",
        ) {
            let name = unused_name_in(&names, &stem, "yaff");
            prop_assert!(!names.contains(&name));
            prop_assert!(name.starts_with(stem.as_str()));
        }
    }
}
