//! yaff: a human-readable text format for bitmap fonts.
//!
//! ```text
//! # comment
//! name: Tiny
//! ascent: 2
//!
//! 0x41:
//! u+0041:
//!     .@.
//!     @.@
//!
//! "space":
//!     -
//! ```
//!
//! Properties are `key: value` lines; a long value may continue on indented
//! lines below a bare `key:`. A glyph is one or more label lines followed
//! by its indented rows of `.` (paper) and `@` (ink), or a single `-` for a
//! glyph without pixels. Labels are codepoints (`0x41`, `65`), characters
//! (`u+0041` or `'A'`) or quoted tags (`"space"`).

use std::io::Write;

use log::info;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Glyph, Pack};
use crate::plugin::{require_single_font, Descriptor, FontLoader, FontSaver, Options, Plugin};
use crate::stream::Stream;

const PAPER: char = '.';
const INK: char = '@';
const EMPTY: &str = "-";
const INDENT: &str = "    ";

pub const LOADER: Descriptor = Descriptor {
    name:       "yaff",
    extensions: &["yaff", "yaffs"],
    magic:      &[],
    options:    &[],
    linked:     None,
}
.linked();

pub const SAVER: Descriptor = Descriptor::saver_for(&LOADER, &[]);

// ── Labels ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Codepoint(u32),
    Chars(String),
    Tag(String),
}

impl Label {
    fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
            return Some(Label::Tag(key[1..key.len() - 1].to_owned()));
        }
        if key.len() >= 2 && key.starts_with('\'') && key.ends_with('\'') {
            return Some(Label::Chars(key[1..key.len() - 1].to_owned()));
        }
        let lower = key.to_ascii_lowercase();
        if lower.starts_with("u+") {
            return lower
                .split(',')
                .map(|part| {
                    let hex = part.trim().strip_prefix("u+")?;
                    char::from_u32(u32::from_str_radix(hex, 16).ok()?)
                })
                .collect::<Option<String>>()
                .map(Label::Chars);
        }
        if !lower.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let value = if let Some(hex) = lower.strip_prefix("0x") {
            u32::from_str_radix(hex, 16).ok()?
        } else if let Some(oct) = lower.strip_prefix("0o") {
            u32::from_str_radix(oct, 8).ok()?
        } else {
            lower.parse().ok()?
        };
        Some(Label::Codepoint(value))
    }

    fn apply(self, glyph: Glyph) -> Glyph {
        match self {
            Label::Codepoint(cp) => glyph.with_codepoint(cp),
            Label::Chars(s)      => glyph.with_chars(s),
            Label::Tag(t)        => glyph.with_tag(t),
        }
    }
}

fn chars_label(chars: &str) -> String {
    chars
        .chars()
        .map(|c| format!("u+{:04x}", u32::from(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Reader {
    keys:       Vec<String>,
    rows:       Vec<String>,
    glyphs:     Vec<Glyph>,
    properties: Vec<(String, String)>,
    comments:   Vec<String>,
}

impl Reader {
    /// Close the pending `key:` block.
    fn flush(&mut self) -> Result<()> {
        let keys = std::mem::take(&mut self.keys);
        let rows = std::mem::take(&mut self.rows);
        if keys.is_empty() {
            return Ok(());
        }
        if rows.is_empty() {
            return Err(Error::format(format!("`{}` has no value.", keys.join(", "))));
        }
        let labels: Option<Vec<Label>> = keys.iter().map(|k| Label::parse(k)).collect();
        match labels {
            Some(labels) => {
                let glyph = parse_rows(&rows, &keys)?;
                self.glyphs.push(labels.into_iter().fold(glyph, |g, l| l.apply(g)));
            }
            None if keys.len() == 1 => {
                self.properties.push((keys[0].clone(), rows.join("\n")));
            }
            None => {
                return Err(Error::format(format!("`{}` are not glyph labels.", keys.join(", "))));
            }
        }
        Ok(())
    }

    fn line(&mut self, raw: &str) -> Result<()> {
        let line = raw.trim_end();
        if line.is_empty() {
            return Ok(());
        }
        if let Some(comment) = line.strip_prefix('#') {
            self.comments.push(comment.strip_prefix(' ').unwrap_or(comment).to_owned());
            return Ok(());
        }
        if raw.starts_with(char::is_whitespace) {
            if self.keys.is_empty() {
                return Err(Error::format(format!("Indented line without a label: `{}`.", line.trim())));
            }
            self.rows.push(line.trim().to_owned());
            return Ok(());
        }
        if !self.rows.is_empty() {
            self.flush()?;
        }
        if let Some(key) = line.strip_suffix(':') {
            self.keys.push(key.trim().to_owned());
            return Ok(());
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::format(format!("Expected `key: value`, found `{line}`.")))?;
        if !self.keys.is_empty() {
            return Err(Error::format(format!("`{}` has no value.", self.keys.join(", "))));
        }
        self.properties.push((key.trim().to_owned(), value.trim().to_owned()));
        Ok(())
    }

    fn finish(mut self) -> Result<Font> {
        self.flush()?;
        let mut font = Font::new(self.glyphs);
        for (key, value) in self.properties {
            font = font.with_property(&key, value);
        }
        for line in self.comments {
            font = font.with_comment(line);
        }
        Ok(font)
    }
}

fn parse_rows(rows: &[String], keys: &[String]) -> Result<Glyph> {
    if rows.len() == 1 && rows[0] == EMPTY {
        return Ok(Glyph::default());
    }
    if let Some(bad) = rows.iter().flat_map(|r| r.chars()).find(|c| *c != PAPER && *c != INK) {
        return Err(Error::format(format!(
            "Unexpected character {bad:?} in glyph `{}`.",
            keys.join(", ")
        )));
    }
    Ok(Glyph::from_matrix(rows, &[PAPER]))
}

fn read_yaff(text: &str) -> Result<Font> {
    let mut reader = Reader::default();
    for line in text.lines() {
        reader.line(line)?;
    }
    reader.finish()
}

pub struct YaffLoader;

impl Plugin for YaffLoader {
    fn descriptor(&self) -> &Descriptor {
        &LOADER
    }
}

impl FontLoader for YaffLoader {
    fn load(&self, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<Vec<Font>> {
        let font = read_yaff(&stream.read_text()?)?;
        info!("yaff: {} glyphs from `{}`.", font.glyphs().len(), stream.name());
        Ok(vec![font])
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

fn write_yaff<W: Write>(mut out: W, font: &Font) -> Result<()> {
    for line in font.comments() {
        if line.is_empty() {
            writeln!(out, "#")?;
        } else {
            writeln!(out, "# {line}")?;
        }
    }
    if !font.comments().is_empty() {
        writeln!(out)?;
    }
    // yaff has no way to spell an empty value.
    for (key, value) in font.properties().iter().filter(|(_, v)| !v.trim().is_empty()) {
        let key = key.replace('_', "-");
        if value.contains('\n') {
            writeln!(out, "{key}:")?;
            for line in value.lines() {
                writeln!(out, "{INDENT}{line}")?;
            }
        } else {
            writeln!(out, "{key}: {value}")?;
        }
    }
    for (i, glyph) in font.glyphs().iter().enumerate() {
        writeln!(out)?;
        let mut labelled = false;
        if let Some(cp) = glyph.codepoint() {
            writeln!(out, "{cp:#04x}:")?;
            labelled = true;
        }
        if !glyph.chars().is_empty() {
            writeln!(out, "{}:", chars_label(glyph.chars()))?;
            labelled = true;
        }
        for tag in glyph.tags() {
            writeln!(out, "\"{tag}\":")?;
            labelled = true;
        }
        if !labelled {
            writeln!(out, "\"{i}\":")?;
        }
        if glyph.width() == 0 || glyph.height() == 0 {
            writeln!(out, "{INDENT}{EMPTY}")?;
        } else {
            for row in glyph.to_rows(INK, PAPER) {
                writeln!(out, "{INDENT}{row}")?;
            }
        }
    }
    Ok(())
}

pub struct YaffSaver;

impl Plugin for YaffSaver {
    fn descriptor(&self) -> &Descriptor {
        &SAVER
    }
}

impl FontSaver for YaffSaver {
    fn save(&self, pack: &Pack, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<()> {
        write_yaff(stream, require_single_font(pack, "yaff")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = "\
# a tiny font
name: Tiny
notice:
    first line
    second line

0x41:
u+0041:
    .@.
    @.@

\"blank\":
    -
";

    #[test]
    fn labels() {
        assert_eq!(Label::parse("0x41"), Some(Label::Codepoint(0x41)));
        assert_eq!(Label::parse("65"), Some(Label::Codepoint(65)));
        assert_eq!(Label::parse("u+0041"), Some(Label::Chars("A".into())));
        assert_eq!(Label::parse("u+0065, u+0301"), Some(Label::Chars("e\u{301}".into())));
        assert_eq!(Label::parse("'A'"), Some(Label::Chars("A".into())));
        assert_eq!(Label::parse("\"space\""), Some(Label::Tag("space".into())));
        assert_eq!(Label::parse("name"), None);
    }

    #[test]
    fn reads_properties_glyphs_and_comments() {
        let font = read_yaff(TINY).unwrap();
        assert_eq!(font.name(), "Tiny");
        assert_eq!(font.property("notice"), Some("first line\nsecond line"));
        assert_eq!(font.comments(), ["a tiny font"]);
        assert_eq!(font.glyphs().len(), 2);
        let a = &font.glyphs()[0];
        assert_eq!((a.codepoint(), a.chars()), (Some(0x41), "A"));
        assert_eq!(a.to_rows('@', '.'), vec![".@.", "@.@"]);
        assert_eq!(font.glyphs()[1].tags(), ["blank"]);
        assert_eq!(font.glyphs()[1].height(), 0);
    }

    #[test]
    fn rejects_stray_characters() {
        let err = read_yaff("0x41:\n    .x.\n").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(read_yaff("    @@\n").is_err());
        assert!(read_yaff("just some words\n").is_err());
    }

    #[test]
    fn write_then_read() {
        let font = read_yaff(TINY).unwrap().with_property("source_format", "yaff");
        let mut out = Vec::new();
        write_yaff(&mut out, &font).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("source-format: yaff\n"), "{text}");
        assert_eq!(read_yaff(&text).unwrap(), font);
    }

    #[test]
    fn empty_properties_are_left_out() {
        let font = read_yaff(TINY).unwrap();
        let mut out = Vec::new();
        write_yaff(&mut out, &font.clone().with_property("copyright", "").with_property("notes", " ")).unwrap();
        assert_eq!(read_yaff(&String::from_utf8(out).unwrap()).unwrap(), font);
    }
}
