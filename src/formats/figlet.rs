//! FIGlet `.flf` fonts.
//!
//! ```text
//! flf2a$ 6 5 20 15 3 0 143 229
//!   |  | | | |  |  | |  |   |
//!   |  | | | |  |  | |  |   codetag count
//!   |  | | | |  |  | |  full layout
//!   |  | | | |  |  | print direction
//!   |  | | | |  |  comment lines
//!   |  | | | |  old layout
//!   |  | | | max line length
//!   |  | | baseline
//!   |  | height
//!   |  hardblank
//!   signature
//! ```
//!
//! After the header and comment lines come the glyphs of the fixed default
//! repertoire, then any number of code-tagged glyphs, each introduced by a
//! `code description` line. Every glyph row ends in one or more endmark
//! characters, conventionally `@`, doubled on the last row.
//!
//! FIGlet "sub-characters" have no meaning for a monochrome bitmap: every
//! character that is not a space or the hardblank is ink. A font drawn with
//! more than one such character needs the `ink` option to say which.

use std::collections::BTreeSet;
use std::io::Write;

use log::{debug, info};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Glyph, Pack};
use crate::plugin::{
    require_single_font, Descriptor, FontLoader, FontSaver, OptionKind, OptionSpec, Options,
    Plugin,
};
use crate::stream::Stream;

const SIGNATURE: &str = "flf2a";
const ENDMARK: char = '@';
const HARDBLANK: char = '$';
const INK: char = '#';

const LOAD_OPTIONS: &[OptionSpec] = &[OptionSpec::new(
    "ink",
    OptionKind::Str,
    "characters to read as ink; all others are paper",
)];

pub const LOADER: Descriptor = Descriptor {
    name:       "figlet",
    extensions: &["flf"],
    magic:      &[b"flf2a"],
    options:    LOAD_OPTIONS,
    linked:     None,
}
.linked();

pub const SAVER: Descriptor = Descriptor::saver_for(&LOADER, &[]);

/// ASCII 32..=126, then the seven German letters every FIGfont carries.
fn default_codepoints() -> impl Iterator<Item = u32> {
    (32..127).chain([196, 214, 220, 228, 246, 252, 223])
}

fn direction_name(code: i64) -> &'static str {
    if code == 1 { "right-to-left" } else { "left-to-right" }
}

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    hardblank:       char,
    height:          usize,
    baseline:        usize,
    max_length:      usize,
    old_layout:      i64,
    comment_lines:   usize,
    print_direction: i64,
    full_layout:     i64,
    codetag_count:   usize,
}

impl Header {
    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let signature = fields.first().copied().unwrap_or_default();
        if !signature.starts_with(SIGNATURE) {
            return Err(Error::format(
                "Not a FIGlet .flf file: does not start with `flf2a` signature.",
            ));
        }
        if fields.len() < 6 {
            return Err(Error::format(format!(
                "FIGlet header has {} fields, needs at least 6.",
                fields.len()
            )));
        }
        let hardblank = signature.chars().last().unwrap_or(HARDBLANK);
        let field = |i: usize| -> Result<i64> {
            match fields.get(i) {
                None => Ok(0),
                Some(s) => s
                    .parse()
                    .map_err(|_| Error::format(format!("Bad FIGlet header field `{s}`."))),
            }
        };
        let count = |i: usize| -> Result<usize> {
            usize::try_from(field(i)?)
                .map_err(|_| Error::format(format!("Negative FIGlet header field `{}`.", fields[i])))
        };
        Ok(Self {
            hardblank,
            height:          count(1)?,
            baseline:        count(2)?,
            max_length:      count(3)?,
            old_layout:      field(4)?,
            comment_lines:   count(5)?,
            print_direction: field(6)?,
            full_layout:     field(7)?,
            codetag_count:   count(8)?,
        })
    }

    fn write<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(
            out,
            "{SIGNATURE}{} {} {} {} {} {} {} {} {}",
            self.hardblank,
            self.height,
            self.baseline,
            self.max_length,
            self.old_layout,
            self.comment_lines,
            self.print_direction,
            self.full_layout,
            self.codetag_count,
        )
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// Strip the trailing run of endmarks from one glyph row.
fn strip_endmarks(row: &str) -> &str {
    let row = row.trim_end();
    match row.chars().last() {
        Some(mark) => row.trim_end_matches(mark),
        None => row,
    }
}

fn parse_glyph(rows: &[&str], hardblank: char, ink: &str) -> Result<Glyph> {
    let rows: Vec<&str> = rows.iter().map(|r| strip_endmarks(r)).collect();
    let mut paper = vec![' ', hardblank];
    let inks: BTreeSet<char> = rows.iter().flat_map(|r| r.chars()).filter(|c| !paper.contains(c)).collect();
    if inks.len() > 1 {
        if ink.is_empty() {
            let found: Vec<String> = inks.iter().map(|c| format!("'{c}'")).collect();
            return Err(Error::format(format!(
                "Multiple ink characters not supported: encountered [{}].",
                found.join(", ")
            )));
        }
        paper.extend(inks.iter().filter(|c| !ink.contains(**c)));
    }
    Ok(Glyph::from_matrix(&rows, &paper))
}

/// Python-style integer literal: decimal, `0x`, `0o` or `0b`, maybe negative.
fn parse_code(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse().ok()?
    };
    Some(if negative { -value } else { value })
}

fn label(glyph: Glyph, code: i64) -> Glyph {
    match u32::try_from(code) {
        Ok(cp) => {
            let glyph = glyph.with_codepoint(cp);
            match char::from_u32(cp).filter(|_| cp != 0) {
                Some(c) => glyph.with_chars(c),
                None => glyph,
            }
        }
        // Negative codes are FIGlet-internal and map to no character.
        Err(_) => glyph,
    }
}

fn read_flf(text: &str, ink: &str) -> Result<Font> {
    let mut lines = text.lines();
    let header = Header::parse(lines.next().unwrap_or_default())?;
    debug!("figlet header: {header:?}");

    let comments: Vec<String> = lines
        .by_ref()
        .take(header.comment_lines)
        .map(|l| l.trim_end().to_owned())
        .collect();

    let mut glyphs = Vec::new();
    for cp in default_codepoints() {
        let rows: Vec<&str> = lines.by_ref().take(header.height).collect();
        if rows.is_empty() {
            break;
        }
        glyphs.push(label(parse_glyph(&rows, header.hardblank, ink)?, i64::from(cp)));
    }
    while let Some(line) = lines.next() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let (code, tag) = line.split_once(' ').unwrap_or((line, ""));
        let code = parse_code(code)
            .ok_or_else(|| Error::format(format!("Bad FIGlet code tag `{line}`.")))?;
        let rows: Vec<&str> = lines.by_ref().take(header.height).collect();
        let glyph = parse_glyph(&rows, header.hardblank, ink)?.with_tag(tag.trim());
        glyphs.push(label(glyph, code));
    }

    let descent = header.height.saturating_sub(header.baseline);
    let mut font = Font::new(glyphs)
        .with_property("ascent", header.baseline.to_string())
        .with_property("descent", descent.to_string())
        .with_property("direction", direction_name(header.print_direction))
        .with_property("encoding", "unicode")
        .with_property("default_char", "0")
        .with_property("figlet.old_layout", header.old_layout.to_string())
        .with_property("figlet.full_layout", header.full_layout.to_string());
    for line in comments {
        font = font.with_comment(line);
    }
    Ok(font)
}

pub struct FigletLoader;

impl Plugin for FigletLoader {
    fn descriptor(&self) -> &Descriptor {
        &LOADER
    }
}

impl FontLoader for FigletLoader {
    fn load(&self, stream: &mut Stream, _: &mut dyn Container, options: &Options) -> Result<Vec<Font>> {
        let text = stream.read_text()?;
        let font = read_flf(&text, options.str("ink").unwrap_or_default())?;
        info!("figlet: {} glyphs from `{}`.", font.glyphs().len(), stream.name());
        Ok(vec![font])
    }
}

// ── Saver ────────────────────────────────────────────────────────────────────

/// The code a glyph is filed under: its character if it has exactly one,
/// else its codepoint.
fn code_of(glyph: &Glyph) -> Option<u32> {
    let mut chars = glyph.chars().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(u32::from(c)),
        _ => glyph.codepoint(),
    }
}

fn format_glyph<W: Write>(mut out: W, glyph: &Glyph, paper: char) -> std::io::Result<()> {
    let rows = glyph.to_rows(INK, paper);
    let last = rows.len().saturating_sub(1);
    for (i, row) in rows.iter().enumerate() {
        if i == last {
            writeln!(out, "{row}{ENDMARK}{ENDMARK}")?;
        } else {
            writeln!(out, "{row}{ENDMARK}")?;
        }
    }
    Ok(())
}

fn write_flf<W: Write>(mut out: W, font: &Font) -> Result<()> {
    let height = font.pixel_size();
    let by_code = |code: u32| font.glyphs().iter().find(|g| code_of(g) == Some(code));
    // Rows are padded at the top so every glyph shares the baseline.
    let fit = |g: &Glyph| g.expand(0, height - g.height(), 0, 0);

    let defaults: Vec<u32> = default_codepoints().collect();
    let mut tagged: Vec<&Glyph> = font
        .glyphs()
        .iter()
        .filter(|g| code_of(g).is_some_and(|c| c != 0 && !defaults.contains(&c)))
        .collect();
    tagged.sort_by_key(|g| code_of(g));
    let missing = font.glyph_for_codepoint(0);

    let header = Header {
        hardblank:       HARDBLANK,
        height,
        baseline:        font.property("ascent").and_then(|a| a.parse().ok()).unwrap_or(height),
        max_length:      2 + font.glyphs().iter().map(Glyph::width).max().unwrap_or(0),
        old_layout:      font.property("figlet.old_layout").and_then(|v| v.parse().ok()).unwrap_or(0),
        comment_lines:   font.comments().len(),
        print_direction: i64::from(font.property("direction") == Some("right-to-left")),
        full_layout:     font.property("figlet.full_layout").and_then(|v| v.parse().ok()).unwrap_or(0),
        codetag_count:   tagged.len() + usize::from(missing.is_some()),
    };
    debug!("figlet header: {header:?}");
    header.write(&mut out)?;
    for line in font.comments() {
        writeln!(out, "{line}")?;
    }

    for (i, &cp) in defaults.iter().enumerate() {
        let glyph = by_code(cp).map(fit).unwrap_or_else(|| Glyph::empty(0, height));
        // The space glyph keeps its width with hardblanks.
        let paper = if i == 0 { HARDBLANK } else { ' ' };
        format_glyph(&mut out, &glyph, paper)?;
    }
    for glyph in tagged.into_iter().chain(missing) {
        let code = code_of(glyph).unwrap_or(0);
        let tag = match glyph.tags().first() {
            Some(tag) => tag.clone(),
            None => format!("U+{code:04X}"),
        };
        writeln!(out, "{code:#x} {tag}")?;
        format_glyph(&mut out, &fit(glyph), ' ')?;
    }
    Ok(())
}

pub struct FigletSaver;

impl Plugin for FigletSaver {
    fn descriptor(&self) -> &Descriptor {
        &SAVER
    }
}

impl FontSaver for FigletSaver {
    fn save(&self, pack: &Pack, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<()> {
        let font = require_single_font(pack, "figlet")?;
        write_flf(stream, font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header plus `n` default glyphs of height 2, drawn with `ink`.
    fn sample(ink: &str, n: usize) -> String {
        let mut text = String::from("flf2a$ 2 1 4 0 1\na comment\n");
        for _ in 0..n {
            text.push_str(&format!("{ink} @\n $@@\n"));
        }
        text
    }

    #[test]
    fn header_fields() {
        let h = Header::parse("flf2a$ 6 5 20 15 3 0 143 229").unwrap();
        assert_eq!(h.hardblank, '$');
        assert_eq!((h.height, h.baseline, h.comment_lines, h.codetag_count), (6, 5, 3, 229));
        assert!(Header::parse("flf2a$ 6").is_err());
        assert!(Header::parse("tlf2a$ 6 5 20 15 3").is_err());
    }

    #[test]
    fn endmarks_are_stripped() {
        assert_eq!(strip_endmarks(" # @@"), " # ");
        assert_eq!(strip_endmarks("#  #"), "#  ");
        assert_eq!(strip_endmarks(""), "");
    }

    #[test]
    fn default_repertoire_and_tags() {
        let mut text = sample("#", 102);
        text.push_str("0x2603 SNOWMAN\n##@\n##@@\n");
        let font = read_flf(&text, "").unwrap();
        assert_eq!(font.glyphs().len(), 103);
        assert_eq!(font.comments(), ["a comment"]);
        assert_eq!(font.property("ascent"), Some("1"));
        assert_eq!(font.property("descent"), Some("1"));
        let a = font.glyph_for_char('A').unwrap();
        assert_eq!(a.to_rows('#', '.'), vec!["#.", ".."]);
        let snowman = font.glyph_for_char('\u{2603}').unwrap();
        assert_eq!(snowman.tags(), ["SNOWMAN"]);
        assert_eq!(snowman.width(), 2);
    }

    #[test]
    fn multiple_ink_characters_need_the_ink_option() {
        let text = "flf2a$ 1 1 4 0 0\n#*@@\n";
        let err = read_flf(text, "").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::Format(_)));
        assert!(msg.contains("'#'") && msg.contains("'*'"), "{msg}");

        let font = read_flf(text, "#").unwrap();
        assert_eq!(font.glyphs()[0].to_rows('#', '.'), vec!["#."]);
    }

    #[test]
    fn write_then_read() {
        let font = read_flf(&sample("#", 102), "").unwrap();
        let mut out = Vec::new();
        write_flf(&mut out, &font).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("flf2a$ 2 1 4 0 1 0 0 0\na comment\n"));

        let again = read_flf(&text, "").unwrap();
        assert_eq!(again.glyphs().len(), font.glyphs().len());
        for (a, b) in font.glyphs().iter().zip(again.glyphs()) {
            assert_eq!(a.pixels(), b.pixels());
        }
    }

    #[test]
    fn saver_takes_one_font_only() {
        let font = read_flf(&sample("#", 3), "").unwrap();
        let pack = Pack::new(vec![font.clone(), font]);
        let mut stream = Stream::from_writer("two.flf", Vec::new()).unwrap();
        let mut dir = crate::container::Directory::open(".", crate::stream::Mode::Read).unwrap();
        let result = FigletSaver.save(&pack, &mut stream, &mut dir, &Options::default());
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
