//! Resolve a user-supplied location into a stream and the container it lives in.
//!
//! A location pair is a `file` (a path, an open stream, or nothing) and a
//! `place` (a container, a path, or nothing). [`open_location`] works out
//! which of these is really a plain file, a directory or a bundle, opens
//! what it needs, runs the caller's body, and releases everything it opened
//! in reverse order. Anything lent by the caller is left open.
//!
//! Opening a place never destroys it: directories and bundles are appended
//! to. Only the leaf file obeys the caller's `overwrite` flag.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::container::{probe_path, probe_stream, Container, Directory, Probe};
use crate::error::{Error, Result};
use crate::stream::{Mode, Stream};

/// Where to find (or put) fonts. Describes intent only; owns no handles.
pub enum Location<'a> {
    Empty,
    Path(PathBuf),
    Stream(&'a mut Stream),
    Container(&'a mut dyn Container),
}

impl Location<'_> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Location::Empty)
    }
}

impl fmt::Debug for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Empty        => f.write_str("Empty"),
            Location::Path(p)      => write!(f, "Path({})", p.display()),
            Location::Stream(s)    => write!(f, "Stream({})", s.name()),
            Location::Container(c) => write!(f, "Container({})", c.name()),
        }
    }
}

impl From<PathBuf> for Location<'_> {
    fn from(path: PathBuf) -> Self {
        if path.as_os_str().is_empty() { Location::Empty } else { Location::Path(path) }
    }
}

impl From<&Path> for Location<'_> {
    fn from(path: &Path) -> Self {
        path.to_path_buf().into()
    }
}

impl From<&str> for Location<'_> {
    fn from(path: &str) -> Self {
        PathBuf::from(path).into()
    }
}

impl From<String> for Location<'_> {
    fn from(path: String) -> Self {
        PathBuf::from(path).into()
    }
}

impl<'a> From<&'a mut Stream> for Location<'a> {
    fn from(stream: &'a mut Stream) -> Self {
        Location::Stream(stream)
    }
}

// ── Decision ─────────────────────────────────────────────────────────────────

/// First stage of resolution; decided without opening anything.
#[derive(Debug)]
pub(crate) enum Step<'a> {
    /// Operate on every member of this container location.
    Whole(Location<'a>),
    /// A bare path: maybe itself a container, else a file in its parent.
    ProbeFile(PathBuf),
    /// A leaf inside a place.
    Member { file: Location<'a>, place: Location<'a> },
}

pub(crate) fn plan<'a>(file: Location<'a>, place: Location<'a>) -> Result<Step<'a>> {
    Ok(match (file, place) {
        (Location::Empty, Location::Empty) => {
            return Err(Error::config("No location provided."));
        }
        (Location::Path(path), _) if path.is_dir() => Step::Whole(Location::Path(path)),
        (Location::Container(c), _)                => Step::Whole(Location::Container(c)),
        (Location::Empty, place)                   => Step::Whole(place),
        (Location::Path(path), Location::Empty)    => Step::ProbeFile(path),
        (file, place)                              => Step::Member { file, place },
    })
}

// ── Held resources ───────────────────────────────────────────────────────────

trait Release {
    fn release(&mut self) -> Result<()>;
}

impl Release for Stream {
    fn release(&mut self) -> Result<()> {
        Ok(self.close()?)
    }
}

impl Release for dyn Container + '_ {
    fn release(&mut self) -> Result<()> {
        self.close()
    }
}

/// A handle opened here, or one lent by the caller.
enum Held<'a, T: ?Sized> {
    Owned(Box<T>),
    Lent(&'a mut T),
}

impl<T: ?Sized + Release> Held<'_, T> {
    fn get(&mut self) -> &mut T {
        match self {
            Held::Owned(b) => &mut **b,
            Held::Lent(r)  => &mut **r,
        }
    }

    /// Close it if it is ours. Dropping instead also releases, but loses
    /// the error.
    fn close(self) -> Result<()> {
        match self {
            Held::Owned(mut b) => b.release(),
            Held::Lent(_)      => Ok(()),
        }
    }
}

fn not_a_container(name: &str) -> Error {
    Error::format(format!("`{name}` is not a container"))
}

/// Open the place as a container. Always permissive about overwriting.
fn open_place<'a>(place: Location<'a>, mode: Mode) -> Result<Held<'a, dyn Container + 'a>> {
    match place {
        Location::Container(c) => Ok(Held::Lent(c)),
        Location::Empty => {
            let dir: Box<dyn Container + 'a> = Box::new(Directory::open(".", mode)?);
            Ok(Held::Owned(dir))
        }
        Location::Path(path) => match probe_path(&path, mode, false) {
            Probe::Container(c) => Ok(Held::Owned(c)),
            Probe::Invalid(e) => Err(e),
            Probe::PlainFile(()) if mode == Mode::Write => {
                let dir: Box<dyn Container + 'a> = Box::new(Directory::open(&path, Mode::Write)?);
                Ok(Held::Owned(dir))
            }
            Probe::PlainFile(()) if !path.exists() => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("`{}` not found", path.display()),
            )
            .into()),
            Probe::PlainFile(()) => Err(not_a_container(&path.to_string_lossy())),
        },
        Location::Stream(stream) => match probe_stream(stream, mode) {
            Probe::Container(c) => Ok(Held::Owned(c)),
            Probe::Invalid(e) => Err(e),
            Probe::PlainFile(s) => Err(not_a_container(s.name())),
        },
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Resolve `file` and `place`, then run `body` with the leaf stream (if the
/// location is a single file) and its container.
///
/// `body` receives no stream when the location turned out to be a container
/// as a whole: a directory, a bundle, or a file that is itself a bundle. The
/// caller then works on every member.
///
/// Every handle opened here is released before returning, on success and on
/// error, innermost first.
pub fn open_location<'a, T, F>(
    file:      Location<'a>,
    place:     Location<'a>,
    mode:      Mode,
    overwrite: bool,
    body:      F,
) -> Result<T>
where
    F: FnOnce(Option<&mut Stream>, &mut dyn Container) -> Result<T>,
{
    match plan(file, place)? {
        Step::Whole(place) => {
            let mut container = open_place(place, mode)?;
            let value = body(None, container.get())?;
            container.close()?;
            Ok(value)
        }
        Step::ProbeFile(path) => match probe_path(&path, mode, overwrite) {
            Probe::Container(mut container) => {
                let value = body(None, container.as_mut())?;
                container.close()?;
                Ok(value)
            }
            Probe::Invalid(e) => Err(e),
            Probe::PlainFile(()) => {
                let name = path.file_name().ok_or_else(|| {
                    Error::config(format!("`{}` does not name a file", path.display()))
                })?;
                let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
                debug!("`{}` is a plain file in `{}`.", path.display(), parent.display());
                let file = Location::Path(PathBuf::from(name));
                open_member(file, parent.into(), mode, overwrite, body)
            }
        },
        Step::Member { file, place } => open_member(file, place, mode, overwrite, body),
    }
}

fn open_member<'a, T, F>(
    file:      Location<'a>,
    place:     Location<'a>,
    mode:      Mode,
    overwrite: bool,
    body:      F,
) -> Result<T>
where
    F: FnOnce(Option<&mut Stream>, &mut dyn Container) -> Result<T>,
{
    let mut container = open_place(place, mode)?;
    let mut stream: Held<'a, Stream> = match file {
        Location::Stream(s) => Held::Lent(s),
        Location::Path(p) => {
            let name = p.to_string_lossy();
            Held::Owned(Box::new(container.get().open_stream(&name, mode, overwrite)?))
        }
        Location::Empty | Location::Container(_) => {
            return Err(Error::config("No file location provided."));
        }
    };

    // The stream itself may be a bundle.
    let value = match probe_stream(stream.get(), mode) {
        Probe::Container(mut nested) => {
            let value = body(None, nested.as_mut())?;
            nested.close()?;
            value
        }
        Probe::PlainFile(s) => body(Some(s), container.get())?,
        Probe::Invalid(e) => return Err(e),
    };
    stream.close()?;
    container.close()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;
    use std::rc::Rc;

    use crate::stream::Sink;

    #[test]
    fn plan_decision_table() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.flf");

        assert!(matches!(plan(Location::Empty, Location::Empty), Err(Error::Config(_))));
        assert!(matches!(
            plan(dir.path().into(), "ignored".into()).unwrap(),
            Step::Whole(Location::Path(p)) if p == dir.path()
        ));
        assert!(matches!(plan(Location::Empty, "x".into()).unwrap(), Step::Whole(_)));
        assert!(matches!(plan(file.clone().into(), Location::Empty).unwrap(), Step::ProbeFile(_)));
        assert!(matches!(
            plan(file.into(), dir.path().into()).unwrap(),
            Step::Member { file: Location::Path(_), place: Location::Path(_) }
        ));

        let mut s = Stream::from_bytes("s.flf", Vec::new()).unwrap();
        assert!(matches!(
            plan((&mut s).into(), Location::Empty).unwrap(),
            Step::Member { file: Location::Stream(_), place: Location::Empty }
        ));
    }

    #[test]
    fn empty_path_is_empty_location() {
        assert!(Location::from("").is_empty());
        assert!(!Location::from("a").is_empty());
    }

    #[test]
    fn plain_file_yields_stream_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flf");
        std::fs::write(&path, b"flf2a$ 1 1 1 0 0\n").unwrap();

        let (base, root) = open_location(path.into(), Location::Empty, Mode::Read, false, |s, c| {
            let s = s.expect("leaf stream");
            Ok((s.base_name().to_owned(), c.root().map(Path::to_path_buf)))
        })
        .unwrap();
        assert_eq!(base, "a.flf");
        assert_eq!(root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn directory_yields_container_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.yaff"), b"").unwrap();
        let members = open_location(dir.path().into(), Location::Empty, Mode::Read, false, |s, c| {
            assert!(s.is_none());
            c.members()
        })
        .unwrap();
        assert_eq!(members, vec!["x.yaff"]);
    }

    #[test]
    fn leaf_honours_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaff");
        std::fs::write(&path, b"old").unwrap();
        let result = open_location(path.clone().into(), Location::Empty, Mode::Write, false, |_, _| Ok(()));
        assert!(result.is_err());
        open_location(path.clone().into(), Location::Empty, Mode::Write, true, |s, _| {
            Ok(s.expect("leaf stream").write_all(b"new")?)
        })
        .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    // ── Handle accounting ────────────────────────────────────────────────────

    struct CountingSink(Rc<Cell<i32>>);

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink for CountingSink {
        fn finish(self: Box<Self>) -> io::Result<()> {
            self.0.set(self.0.get() - 1);
            Ok(())
        }
    }

    /// Hands out write streams and counts the ones not yet released.
    struct Tracker {
        open: Rc<Cell<i32>>,
    }

    impl Container for Tracker {
        fn name(&self) -> &str {
            "tracker"
        }
        fn mode(&self) -> Mode {
            Mode::Write
        }
        fn members(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn open_stream(&mut self, name: &str, _mode: Mode, _overwrite: bool) -> Result<Stream> {
            self.open.set(self.open.get() + 1);
            Ok(Stream::from_sink(name, Box::new(CountingSink(Rc::clone(&self.open))))?)
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_body_leaks_nothing() {
        for name in ["plain.yaff", "nested.fpk"] {
            let mut tracker = Tracker { open: Rc::default() };
            let result: Result<()> = open_location(
                name.into(),
                Location::Container(&mut tracker),
                Mode::Write,
                false,
                |_, _| Err(Error::format("boom")),
            );
            assert!(matches!(result, Err(Error::Format(_))));
            assert_eq!(tracker.open.get(), 0, "{name} left a handle open");
        }
    }

    #[test]
    fn lent_stream_stays_open() {
        let mut out = Stream::from_writer("lent.yaff", Vec::new()).unwrap();
        open_location((&mut out).into(), Location::Empty, Mode::Write, false, |s, _| {
            assert!(s.is_some());
            Ok(())
        })
        .unwrap();
        assert!(!out.is_closed());
    }

    #[test]
    fn lent_bundle_stream_stays_open() {
        let mut out = Stream::from_writer("lent.fpk", Vec::new()).unwrap();
        open_location((&mut out).into(), Location::Empty, Mode::Write, false, |s, c| {
            assert!(s.is_none());
            assert_eq!(c.name(), "lent.fpk");
            Ok(())
        })
        .unwrap();
        assert!(!out.is_closed());
    }
}
