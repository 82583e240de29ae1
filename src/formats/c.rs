//! Bitmap fonts embedded in C or C++ source as an array of integers.
//!
//! ```c
//! static const unsigned char font8x8[] = {
//!     0x18, 0x3c, 0x66, 0x66, 0x7e, 0x66, 0x66, 0x00, // A
//!     ...
//! };
//! ```
//!
//! The source carries no metadata, so the glyph size comes from options and
//! the array from its identifier (or the first `{` in the file). Glyphs are
//! numbered from zero in array order. Loading only.

use log::{debug, info};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Glyph};
use crate::plugin::{Descriptor, FontLoader, OptionKind, OptionSpec, Options, Plugin};
use crate::stream::Stream;

const LOAD_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("identifier", OptionKind::Str, "name of the array; default: the first one")
        .with_default(""),
    OptionSpec::new("width", OptionKind::Int, "glyph width in pixels").with_default("8"),
    OptionSpec::new("height", OptionKind::Int, "glyph height in pixels").with_default("8"),
];

pub const LOADER: Descriptor = Descriptor {
    name:       "c",
    extensions: &["c", "cc", "cpp", "h"],
    magic:      &[],
    options:    LOAD_OPTIONS,
    linked:     None,
};

/// Source with `//` and `/* */` comments blanked out.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut last = '\0';
                for c in chars.by_ref() {
                    if last == '*' && c == '/' {
                        break;
                    }
                    last = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// A C integer literal: decimal, `0x` hex, `0b` binary or leading-zero
/// octal, with any `u`/`l` suffix.
fn parse_c_int(token: &str) -> Option<u8> {
    let lower = token.trim().to_ascii_lowercase();
    let digits = lower.trim_end_matches(['u', 'l']);
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse().ok()?
    };
    u8::try_from(value).ok()
}

/// The initialiser of the array named `identifier`, or of the first array.
fn find_array<'s>(source: &'s str, identifier: &str) -> Result<&'s str> {
    let start = if identifier.is_empty() {
        source.find('{')
    } else {
        source
            .match_indices(identifier)
            .map(|(at, _)| at)
            .find_map(|at| source[at..].find('{').map(|brace| at + brace))
    };
    let start = start.ok_or_else(|| match identifier {
        "" => Error::format("No array found in C source."),
        name => Error::format(format!("Array `{name}` not found in C source.")),
    })?;
    let body = &source[start + 1..];
    let end = body
        .find('}')
        .ok_or_else(|| Error::format("Unterminated array in C source."))?;
    Ok(&body[..end])
}

/// Largest glyph width or height accepted.
const MAX_DIMENSION: i64 = 4096;

fn dimension(options: &Options, name: &str) -> Result<usize> {
    match options.require_int(name)? {
        n @ 1..=MAX_DIMENSION => Ok(n as usize),
        n => Err(Error::config(format!(
            "Option `{name}` must be between 1 and {MAX_DIMENSION}, got {n}."
        ))),
    }
}

fn read_c(source: &str, identifier: &str, width: usize, height: usize) -> Result<Font> {
    let source = strip_comments(source);
    let array = find_array(&source, identifier)?;
    let bytes = array
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            parse_c_int(token)
                .ok_or_else(|| Error::format(format!("Not a byte value in C source: `{token}`.")))
        })
        .collect::<Result<Vec<u8>>>()?;

    let glyph_size = width
        .div_ceil(8)
        .checked_mul(height)
        .filter(|&size| size > 0)
        .ok_or_else(|| Error::config(format!("No glyph fits {width}x{height} pixels.")))?;
    if bytes.len() % glyph_size != 0 {
        debug!(
            "{} bytes is not a whole number of {glyph_size}-byte glyphs; padding the last.",
            bytes.len()
        );
    }
    let glyphs = bytes
        .chunks(glyph_size)
        .enumerate()
        .map(|(index, chunk)| {
            let mut cell = chunk.to_vec();
            cell.resize(glyph_size, 0);
            Glyph::from_bytes(&cell, width).with_codepoint(index as u32)
        })
        .collect();
    Ok(Font::new(glyphs))
}

pub struct CLoader;

impl Plugin for CLoader {
    fn descriptor(&self) -> &Descriptor {
        &LOADER
    }
}

impl FontLoader for CLoader {
    fn load(&self, stream: &mut Stream, _: &mut dyn Container, options: &Options) -> Result<Vec<Font>> {
        let width = dimension(options, "width")?;
        let height = dimension(options, "height")?;
        let identifier = options.str("identifier").unwrap_or_default();
        let font = read_c(&stream.read_text()?, identifier, width, height)?;
        info!("c: {} glyphs of {width}x{height} from `{}`.", font.glyphs().len(), stream.name());
        Ok(vec![font])
    }
}
