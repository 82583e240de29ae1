//! PC Screen Font, the Linux console format.
//!
//! Two versions exist. PSF1 has a 4-byte header, glyphs exactly 8 pixels
//! wide and 256 or 512 of them. PSF2 has a 32-byte little-endian header and
//! any glyph size. Both may append a Unicode table mapping each glyph to the
//! characters it represents: PSF1 as `u16` values, PSF2 as UTF-8, each
//! glyph's entry terminated by a marker and with a second marker introducing
//! multi-character sequences.
//!
//! Loaded glyphs keep their index as codepoint. Saving always writes PSF2.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Glyph, Pack};
use crate::plugin::{require_single_font, Descriptor, FontLoader, FontSaver, Options, Plugin};
use crate::stream::Stream;

const PSF1_MAGIC: &[u8] = &[0x36, 0x04];
const PSF2_MAGIC: &[u8] = &[0x72, 0xb5, 0x4a, 0x86];

const PSF1_MODE512: u8 = 0x01;
const PSF1_MODEHASTAB: u8 = 0x02;
const PSF1_MODESEQ: u8 = 0x04;
const PSF1_SEPARATOR: u16 = 0xffff;
const PSF1_STARTSEQ: u16 = 0xfffe;

const PSF2_HEADER_SIZE: u32 = 32;
const PSF2_HAS_UNICODE_TABLE: u32 = 0x01;
const PSF2_SEPARATOR: u8 = 0xff;
const PSF2_STARTSEQ: u8 = 0xfe;

pub const LOADER: Descriptor = Descriptor {
    name:       "psf",
    extensions: &["psf", "psfu"],
    magic:      &[PSF1_MAGIC, PSF2_MAGIC],
    options:    &[],
    linked:     None,
}
.linked();

pub const SAVER: Descriptor = Descriptor::saver_for(&LOADER, &[]);

// ── Reading ──────────────────────────────────────────────────────────────────

/// Glyph bitmaps and their Unicode table entries.
struct Raw {
    version: u32,
    width:   usize,
    height:  usize,
    glyphs:  Vec<Vec<u8>>,
    table:   Option<Vec<Vec<String>>>,
}

fn truncated(what: &str) -> Error {
    Error::format(format!("PSF file truncated in {what}."))
}

fn read_glyph_data(cur: &mut Cursor<&[u8]>, count: usize, size: usize) -> Result<Vec<Vec<u8>>> {
    (0..count)
        .map(|_| {
            let mut buf = vec![0u8; size];
            cur.read_exact(&mut buf).map_err(|_| truncated("glyph data"))?;
            Ok(buf)
        })
        .collect()
}

fn read_psf1(data: &[u8]) -> Result<Raw> {
    let mut cur = Cursor::new(data);
    cur.set_position(PSF1_MAGIC.len() as u64);
    let mode = cur.read_u8().map_err(|_| truncated("header"))?;
    let height = usize::from(cur.read_u8().map_err(|_| truncated("header"))?);
    if height == 0 {
        return Err(Error::format("PSF1 glyphs of height 0 have no bitmap."));
    }
    let count = if mode & PSF1_MODE512 != 0 { 512 } else { 256 };
    let glyphs = read_glyph_data(&mut cur, count, height)?;

    let table = if mode & (PSF1_MODEHASTAB | PSF1_MODESEQ) != 0 {
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let mut mappings = Vec::new();
            let mut current = String::new();
            let mut in_sequence = false;
            loop {
                let unit = cur.read_u16::<LittleEndian>().map_err(|_| truncated("unicode table"))?;
                match unit {
                    PSF1_SEPARATOR => break,
                    PSF1_STARTSEQ => {
                        if !current.is_empty() {
                            mappings.push(std::mem::take(&mut current));
                        }
                        in_sequence = true;
                    }
                    _ => {
                        let Some(c) = char::from_u32(u32::from(unit)) else {
                            debug!("Skipping unpaired surrogate {unit:#06x} in PSF1 table.");
                            continue;
                        };
                        current.push(c);
                        if !in_sequence {
                            mappings.push(std::mem::take(&mut current));
                        }
                    }
                }
            }
            if !current.is_empty() {
                mappings.push(current);
            }
            entries.push(mappings);
        }
        Some(entries)
    } else {
        None
    };
    Ok(Raw { version: 1, width: 8, height, glyphs, table })
}

fn read_psf2(data: &[u8]) -> Result<Raw> {
    let mut cur = Cursor::new(data);
    cur.set_position(PSF2_MAGIC.len() as u64);
    let mut header = [0u32; 7];
    cur.read_u32_into::<LittleEndian>(&mut header)
        .map_err(|_| truncated("header"))?;
    let [version, header_size, flags, length, charsize, height, width] = header;
    if version != 0 {
        return Err(Error::format(format!("Unsupported PSF2 version {version}.")));
    }
    if width == 0 || height == 0 {
        return Err(Error::format(format!("PSF2 glyphs of {width}x{height} pixels have no bitmap.")));
    }
    if u64::from(charsize) != u64::from(width.div_ceil(8)) * u64::from(height) {
        return Err(Error::format(format!(
            "PSF2 glyph size {charsize} does not fit {width}x{height} pixels."
        )));
    }
    // The glyph table must be present in full before anything is allocated.
    let available = (data.len() as u64).saturating_sub(u64::from(header_size));
    if header_size < PSF2_HEADER_SIZE || u64::from(length) * u64::from(charsize) > available {
        return Err(truncated("glyph data"));
    }
    let (height, width) = (height as usize, width as usize);
    cur.set_position(u64::from(header_size));
    let glyphs = read_glyph_data(&mut cur, length as usize, charsize as usize)?;

    let table = if flags & PSF2_HAS_UNICODE_TABLE != 0 {
        let pos = cur.position() as usize;
        let rest = data.get(pos..).unwrap_or_default();
        let mut entries: Vec<Vec<String>> = rest
            .split(|&b| b == PSF2_SEPARATOR)
            .take(length as usize)
            .map(parse_psf2_entry)
            .collect();
        if entries.len() < length as usize {
            debug!("PSF2 table has {} of {length} entries.", entries.len());
            entries.resize(length as usize, Vec::new());
        }
        Some(entries)
    } else {
        None
    };
    Ok(Raw { version: 2, width, height, glyphs, table })
}

/// Single characters first, then `0xfe`-introduced sequences.
fn parse_psf2_entry(entry: &[u8]) -> Vec<String> {
    let mut parts = entry.split(|&b| b == PSF2_STARTSEQ);
    let mut mappings: Vec<String> = parts
        .next()
        .map(|singles| String::from_utf8_lossy(singles).chars().map(String::from).collect())
        .unwrap_or_default();
    mappings.extend(
        parts
            .map(|seq| String::from_utf8_lossy(seq).into_owned())
            .filter(|s| !s.is_empty()),
    );
    mappings
}

fn read_psf(data: &[u8]) -> Result<Font> {
    let raw = if data.starts_with(PSF2_MAGIC) {
        read_psf2(data)?
    } else if data.starts_with(PSF1_MAGIC) {
        read_psf1(data)?
    } else {
        return Err(Error::format("Not a PSF file."));
    };
    let glyphs = raw
        .glyphs
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            let glyph = Glyph::from_bytes(bytes, raw.width).with_codepoint(index as u32);
            match raw.table.as_ref().and_then(|t| t[index].first()) {
                Some(chars) => glyph.with_chars(chars.clone()),
                None => glyph,
            }
        })
        .collect();
    let mut font = Font::new(glyphs)
        .with_property("psf.version", raw.version.to_string())
        .with_property("cell_size", format!("{}x{}", raw.width, raw.height));
    if raw.table.is_some() {
        font = font.with_property("encoding", "unicode");
    }
    Ok(font)
}

pub struct PsfLoader;

impl Plugin for PsfLoader {
    fn descriptor(&self) -> &Descriptor {
        &LOADER
    }
}

impl FontLoader for PsfLoader {
    fn load(&self, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<Vec<Font>> {
        let font = read_psf(&stream.read_bytes()?)?;
        info!("psf: {} glyphs from `{}`.", font.glyphs().len(), stream.name());
        Ok(vec![font])
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

fn write_psf2<W: Write>(mut out: W, font: &Font) -> Result<()> {
    let width = font.glyphs().iter().map(Glyph::width).max().unwrap_or(0);
    let height = font.pixel_size();
    if width == 0 || height == 0 {
        return Err(Error::format("Can't save a PSF file without pixels."));
    }
    let charsize = width.div_ceil(8) * height;
    let has_table = font.glyphs().iter().any(|g| !g.chars().is_empty());

    out.write_all(PSF2_MAGIC)?;
    for field in [
        0,
        PSF2_HEADER_SIZE,
        if has_table { PSF2_HAS_UNICODE_TABLE } else { 0 },
        font.glyphs().len() as u32,
        charsize as u32,
        height as u32,
        width as u32,
    ] {
        out.write_u32::<LittleEndian>(field)?;
    }
    for glyph in font.glyphs() {
        // Pad to the common cell, keeping glyphs anchored top left.
        let cell = glyph.expand(0, 0, width - glyph.width(), height - glyph.height());
        out.write_all(&cell.to_bytes())?;
    }
    if has_table {
        for glyph in font.glyphs() {
            let chars = glyph.chars();
            if chars.chars().count() > 1 {
                out.write_u8(PSF2_STARTSEQ)?;
            }
            out.write_all(chars.as_bytes())?;
            out.write_u8(PSF2_SEPARATOR)?;
        }
    }
    Ok(())
}

pub struct PsfSaver;

impl Plugin for PsfSaver {
    fn descriptor(&self) -> &Descriptor {
        &SAVER
    }
}

impl FontSaver for PsfSaver {
    fn save(&self, pack: &Pack, stream: &mut Stream, _: &mut dyn Container, _: &Options) -> Result<()> {
        write_psf2(stream, require_single_font(pack, "psf")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psf1(mode: u8, table: &[u16]) -> Vec<u8> {
        let count = if mode & PSF1_MODE512 != 0 { 512 } else { 256 };
        let mut data = vec![0x36, 0x04, mode, 2];
        for i in 0..count {
            data.extend_from_slice(&[i as u8, 0xff]);
        }
        for unit in table {
            data.write_u16::<LittleEndian>(*unit).unwrap();
        }
        data
    }

    #[test]
    fn psf1_without_table() {
        let font = read_psf(&psf1(0, &[])).unwrap();
        assert_eq!(font.glyphs().len(), 256);
        let g = &font.glyphs()[0x41];
        assert_eq!((g.width(), g.height()), (8, 2));
        assert_eq!(g.codepoint(), Some(0x41));
        assert_eq!(g.to_bytes(), vec![0x41, 0xff]);
        assert_eq!(font.property("encoding"), None);
    }

    #[test]
    fn psf1_unicode_table_with_sequences() {
        let mut table = vec![0x0041, 0x0391, PSF1_SEPARATOR];
        table.extend([PSF1_STARTSEQ, 0x0065, 0x0301, PSF1_SEPARATOR]);
        for _ in 2..256 {
            table.push(PSF1_SEPARATOR);
        }
        let font = read_psf(&psf1(PSF1_MODEHASTAB, &table)).unwrap();
        assert_eq!(font.glyphs()[0].chars(), "A");
        assert_eq!(font.glyphs()[1].chars(), "e\u{301}");
        assert_eq!(font.glyphs()[2].chars(), "");
        assert_eq!(font.property("encoding"), Some("unicode"));
    }

    #[test]
    fn psf1_truncated_table_is_an_error() {
        let err = read_psf(&psf1(PSF1_MODEHASTAB, &[0x41])).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn psf2_write_then_read() {
        let glyphs = vec![
            Glyph::from_matrix(&["@........@", "..........", ".@@@@@@@@."], &['.'])
                .with_chars("A"),
            Glyph::from_matrix(&["@@", "@@"], &['.']).with_chars("e\u{301}"),
            Glyph::empty(10, 3),
        ];
        let font = Font::new(glyphs);
        let mut out = Vec::new();
        write_psf2(&mut out, &font).unwrap();
        assert!(out.starts_with(PSF2_MAGIC));

        let back = read_psf(&out).unwrap();
        assert_eq!(back.property("cell_size"), Some("10x3"));
        assert_eq!(back.glyphs().len(), 3);
        assert_eq!(back.glyphs()[0].pixels(), font.glyphs()[0].pixels());
        assert_eq!(back.glyphs()[0].chars(), "A");
        assert_eq!(back.glyphs()[1].chars(), "e\u{301}");
        assert_eq!(back.glyphs()[1].to_rows('@', '.')[0], "@@........");
        assert_eq!(back.glyphs()[2].codepoint(), Some(2));
        assert!(back.glyphs()[2].is_blank());
    }

    fn psf2_header(fields: [u32; 7]) -> Vec<u8> {
        let mut data = PSF2_MAGIC.to_vec();
        for field in fields {
            data.write_u32::<LittleEndian>(field).unwrap();
        }
        data
    }

    #[test]
    fn bad_psf2_sizes_are_rejected() {
        let data = psf2_header([0, 32, 0, 1, 99, 8, 8]);
        assert!(matches!(read_psf(&data), Err(Error::Format(_))));
    }

    #[test]
    fn psf2_header_cannot_promise_more_than_the_file_holds() {
        // Zero-sized glyphs would otherwise make any count "fit".
        let empty_cells = psf2_header([0, 32, 0, 5_000_000, 0, 0, 0]);
        assert!(matches!(read_psf(&empty_cells), Err(Error::Format(_))));

        let huge_count = psf2_header([0, 32, 0, u32::MAX, 8, 8, 8]);
        assert!(matches!(read_psf(&huge_count), Err(Error::Format(_))));

        let mut short = psf2_header([0, 32, 0, 2, 8, 8, 8]);
        short.extend_from_slice(&[0xff; 12]);
        assert!(matches!(read_psf(&short), Err(Error::Format(_))));

        let small_header = psf2_header([0, 4, 0, 1, 8, 8, 8]);
        assert!(matches!(read_psf(&small_header), Err(Error::Format(_))));
    }

    #[test]
    fn psf1_needs_a_height() {
        let mut data = vec![0x36, 0x04, 0, 0];
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(read_psf(&data), Err(Error::Format(_))));
    }
}
