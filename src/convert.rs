//! Load and save fonts at any location.
//!
//! [`Formats`] pairs a loader registry with a saver registry and drives both
//! through [`open_location`]. A location that resolves to a single file is
//! handed to one plugin. A location that resolves to a container is walked
//! member by member; a member that fails is logged and skipped so that one
//! bad file never sinks the batch.

use log::{debug, error, info};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Pack};
use crate::location::{open_location, Location};
use crate::plugin::{FontLoader, FontSaver, Options};
use crate::registry::Registry;
use crate::stream::{Mode, Stream};
use crate::CONVERTER_NAME;

/// How to load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Format name; empty means identify each file.
    pub format:  String,
    /// Raw `key=value` plugin options, validated against the plugin's schema.
    pub options: Vec<(String, String)>,
}

/// How to save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Format name; empty means go by file extension, else the default.
    pub format:    String,
    pub options:   Vec<(String, String)>,
    /// Replace an existing leaf file. Containers are always appended to.
    pub overwrite: bool,
}

pub struct Formats {
    loaders: Registry<dyn FontLoader>,
    savers:  Registry<dyn FontSaver>,
}

impl Formats {
    pub fn new(loaders: Registry<dyn FontLoader>, savers: Registry<dyn FontSaver>) -> Self {
        Self { loaders, savers }
    }

    pub fn loaders(&self) -> &Registry<dyn FontLoader> {
        &self.loaders
    }

    pub fn savers(&self) -> &Registry<dyn FontSaver> {
        &self.savers
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Load every font found at `file` within `place`.
    ///
    /// Fails if nothing at all could be loaded, including when every member
    /// of a container failed.
    pub fn load<'a>(&self, file: Location<'a>, place: Location<'a>, opts: &LoadOptions) -> Result<Pack> {
        let fonts = self.load_fonts(file, place, opts)?;
        if fonts.is_empty() {
            return Err(Error::format("No fonts found."));
        }
        Ok(Pack::new(fonts))
    }

    /// Like [`Formats::load`] but an empty container is not an error.
    fn load_fonts<'a>(&self, file: Location<'a>, place: Location<'a>, opts: &LoadOptions) -> Result<Vec<Font>> {
        open_location(file, place, Mode::Read, false, |stream, container| match stream {
            Some(stream) => self.load_stream(stream, container, opts),
            None => self.load_all(container, opts),
        })
    }

    fn load_stream(
        &self,
        stream:    &mut Stream,
        container: &mut dyn Container,
        opts:      &LoadOptions,
    ) -> Result<Vec<Font>> {
        let loader = self
            .loaders
            .get_plugin(stream, &opts.format, true)
            .ok_or_else(|| Error::format(format!("Cannot load from format `{}`.", opts.format)))?;
        let desc = loader.descriptor();
        let options = Options::parse(desc.options, &opts.options)?;
        info!("Loading `{}` on `{}` as {}.", stream.name(), container.name(), desc.name);

        let fonts = loader.load(stream, container, &options)?;
        if fonts.is_empty() {
            return Err(Error::format(format!("No fonts found in `{}`.", stream.name())));
        }
        let source_name = stream.base_name().to_owned();
        Ok(fonts
            .into_iter()
            .map(|font| {
                font.set_property_if_absent("converter", CONVERTER_NAME)
                    .set_property_if_absent("source_format", desc.name)
                    .set_property_if_absent("source_name", source_name.as_str())
            })
            .collect())
    }

    fn load_all(&self, container: &mut dyn Container, opts: &LoadOptions) -> Result<Vec<Font>> {
        info!("Reading all from `{}`.", container.name());
        let mut fonts = Vec::new();
        for name in container.members()? {
            debug!("Trying `{name}` on `{}`.", container.name());
            match self.load_member(container, &name, opts) {
                Ok(loaded) => fonts.extend(loaded),
                Err(e) => debug!("Could not load `{name}`: {e}"),
            }
        }
        Ok(fonts)
    }

    /// A member may itself be a bundle, so it goes through the resolver again.
    fn load_member(&self, container: &mut dyn Container, name: &str, opts: &LoadOptions) -> Result<Vec<Font>> {
        let mut stream = container.open_stream(name, Mode::Read, false)?;
        let fonts = self.load_fonts(Location::Stream(&mut stream), Location::Container(&mut *container), opts)?;
        stream.close()?;
        Ok(fonts)
    }

    // ── Saving ───────────────────────────────────────────────────────────────

    /// Save `pack` to `file` within `place`.
    ///
    /// A single-file location receives the whole pack. A container receives
    /// one new member per font.
    pub fn save<'a>(&self, pack: &Pack, file: Location<'a>, place: Location<'a>, opts: &SaveOptions) -> Result<()> {
        open_location(file, place, Mode::Write, opts.overwrite, |stream, container| match stream {
            Some(stream) => self.save_stream(pack, stream, container, opts),
            None => self.save_all(pack, container, opts),
        })
    }

    fn save_stream(
        &self,
        pack:      &Pack,
        stream:    &mut Stream,
        container: &mut dyn Container,
        opts:      &SaveOptions,
    ) -> Result<()> {
        // Nothing to sniff when writing: name or extension only.
        let saver = self
            .savers
            .get_plugin(stream, &opts.format, false)
            .ok_or_else(|| Error::format(format!("Cannot save to format `{}`.", opts.format)))?;
        let desc = saver.descriptor();
        let options = Options::parse(desc.options, &opts.options)?;
        info!("Saving `{}` on `{}` as {}.", stream.name(), container.name(), desc.name);
        saver.save(pack, stream, container, &options)
    }

    fn save_all(&self, pack: &Pack, container: &mut dyn Container, opts: &SaveOptions) -> Result<()> {
        info!("Writing all to `{}`.", container.name());
        // No file names to go by yet, so an unnamed format means the default.
        let saver = if opts.format.is_empty() {
            self.savers.default_plugin()
        } else {
            self.savers.get(&opts.format)
        };
        let desc = saver
            .ok_or_else(|| Error::format(format!("Cannot save to format `{}`.", opts.format)))?
            .descriptor();
        let ext = desc.default_extension();
        let single = SaveOptions { format: desc.name.to_owned(), ..opts.clone() };

        for font in pack {
            let mut stem = font.name().split_whitespace().collect::<Vec<_>>().join("_");
            if stem.is_empty() {
                stem.push_str("font");
            }
            let name = container.unused_name(&stem, ext)?;
            match self.save_member(font, container, &name, &single) {
                Ok(()) => {}
                Err(e) if e.is_broken_pipe() => {
                    debug!("Output closed; not writing `{name}` or anything after it.");
                    break;
                }
                Err(e) => error!("Could not save `{name}`: {e}"),
            }
        }
        Ok(())
    }

    fn save_member(&self, font: &Font, container: &mut dyn Container, name: &str, opts: &SaveOptions) -> Result<()> {
        let mut stream = container.open_stream(name, Mode::Write, false)?;
        self.save_stream(&Pack::from(font.clone()), &mut stream, container, opts)?;
        stream.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Directory;
    use crate::font::Glyph;
    use crate::plugin::{require_single_font, Descriptor, Plugin};
    use std::io::{self, Write};

    const LINE: Descriptor = Descriptor {
        name:       "line",
        extensions: &["line"],
        magic:      &[b"LINE "],
        options:    &[],
        linked:     None,
    };
    const LINE_SAVER: Descriptor = Descriptor::saver_for(&LINE, &[]);

    /// `LINE <name>`: one font per file, one blank glyph.
    struct Line;

    impl Plugin for Line {
        fn descriptor(&self) -> &Descriptor {
            &LINE
        }
    }

    impl FontLoader for Line {
        fn load(&self, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<Vec<Font>> {
            let text = stream.read_text()?;
            let name = text
                .strip_prefix("LINE ")
                .ok_or_else(|| Error::format("not a line font"))?;
            Ok(vec![Font::new(vec![Glyph::empty(1, 1)]).with_property("name", name.trim())])
        }
    }

    struct LineSaver;

    impl Plugin for LineSaver {
        fn descriptor(&self) -> &Descriptor {
            &LINE_SAVER
        }
    }

    impl FontSaver for LineSaver {
        fn save(&self, pack: &Pack, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<()> {
            let font = require_single_font(pack, "line")?;
            write!(stream, "LINE {}", font.name())?;
            Ok(())
        }
    }

    fn formats() -> Formats {
        let loaders = Registry::<dyn FontLoader>::builder().register(Box::new(Line)).unwrap().build();
        let savers = Registry::<dyn FontSaver>::builder()
            .register(Box::new(LineSaver))
            .unwrap()
            .default_format("line")
            .build();
        Formats::new(loaders, savers)
    }

    fn pack(names: &[&str]) -> Pack {
        names
            .iter()
            .map(|n| Font::new(vec![Glyph::empty(1, 1)]).with_property("name", *n))
            .collect()
    }

    #[test_log::test]
    fn provenance_is_stamped_once() {
        let formats = formats();
        let mut s = Stream::from_bytes("a.line", b"LINE alpha".to_vec()).unwrap();
        let loaded = formats.load((&mut s).into(), Location::Empty, &LoadOptions::default()).unwrap();
        let font = &loaded.fonts()[0];
        assert_eq!(font.property("source_format"), Some("line"));
        assert_eq!(font.property("source_name"), Some("a.line"));
        assert_eq!(font.property("converter"), Some(CONVERTER_NAME));

        let relabelled = font.clone().set_property_if_absent("source_name", "b.line");
        assert_eq!(relabelled.property("source_name"), Some("a.line"));
    }

    #[test_log::test]
    fn bad_members_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.line"), "LINE one").unwrap();
        std::fs::write(dir.path().join("2.line"), "garbage").unwrap();
        std::fs::write(dir.path().join("3.line"), "LINE three").unwrap();

        let loaded = formats()
            .load(dir.path().into(), Location::Empty, &LoadOptions::default())
            .unwrap();
        let names: Vec<_> = loaded.iter().map(Font::name).collect();
        assert_eq!(names, ["one", "three"]);
    }

    #[test_log::test]
    fn all_members_failing_is_an_error_at_the_top() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.line"), "garbage").unwrap();
        let result = formats().load(dir.path().into(), Location::Empty, &LoadOptions::default());
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test_log::test]
    fn bulk_save_names_members_uniquely() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let pack = pack(&["Fixed Bold", "Fixed Bold", "Other"]);
        formats().save(&pack, out.as_path().into(), Location::Empty, &SaveOptions::default()).unwrap();

        let members = Directory::open(&out, Mode::Read).unwrap().members().unwrap();
        assert_eq!(members, ["Fixed_Bold.1.line", "Fixed_Bold.line", "Other.line"]);
        let text = std::fs::read_to_string(out.join("Fixed_Bold.1.line")).unwrap();
        assert_eq!(text, "LINE Fixed Bold");
    }

    #[test]
    fn single_font_saver_rejects_larger_pack() {
        let mut out = Stream::from_writer("x.line", Vec::new()).unwrap();
        let result = formats().save(&pack(&["a", "b"]), (&mut out).into(), Location::Empty, &SaveOptions::default());
        assert!(matches!(result, Err(Error::Format(_))));
        let mut out = Stream::from_writer("x.line", Vec::new()).unwrap();
        assert!(formats().save(&pack(&["a"]), (&mut out).into(), Location::Empty, &SaveOptions::default()).is_ok());
    }

    /// Accepts `limit` writes, then reports a closed pipe.
    struct Pipe {
        limit:   usize,
        opened:  usize,
        members: Vec<String>,
    }

    struct PipeSink(bool);

    impl Write for PipeSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Container for Pipe {
        fn name(&self) -> &str {
            "pipe"
        }
        fn mode(&self) -> Mode {
            Mode::Write
        }
        fn members(&self) -> Result<Vec<String>> {
            Ok(self.members.clone())
        }
        fn open_stream(&mut self, name: &str, _: Mode, _: bool) -> Result<Stream> {
            let closed = self.opened >= self.limit;
            self.opened += 1;
            self.members.push(name.to_owned());
            Ok(Stream::from_writer(name, PipeSink(closed))?)
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test_log::test]
    fn broken_pipe_stops_the_batch_quietly() {
        let mut pipe = Pipe { limit: 1, opened: 0, members: Vec::new() };
        let result = formats().save(
            &pack(&["a", "b", "c"]),
            Location::Empty,
            Location::Container(&mut pipe),
            &SaveOptions::default(),
        );
        assert!(result.is_ok());
        assert_eq!(pipe.members, ["a.line", "b.line"]);
    }

    #[test]
    fn unknown_format_name_is_a_format_error() {
        let mut s = Stream::from_bytes("a.line", b"LINE alpha".to_vec()).unwrap();
        let opts = LoadOptions { format: "nope".into(), ..LoadOptions::default() };
        let result = formats().load((&mut s).into(), Location::Empty, &opts);
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
