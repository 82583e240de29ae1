//! Monochrome glyph bitmaps and the pixel operations on them.

use std::fmt;

/// A row-major bitmap plus the labels that tie it to characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glyph {
    pixels:    Vec<Vec<bool>>,
    codepoint: Option<u32>,
    chars:     String,
    tags:      Vec<String>,
}

impl Glyph {
    /// Rows must all be the same length.
    pub fn new(pixels: Vec<Vec<bool>>) -> Self {
        debug_assert!(pixels.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { pixels, ..Self::default() }
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self::new(vec![vec![false; width]; height])
    }

    /// Build from text rows; any character not in `paper` is ink.
    /// Short rows are padded with paper.
    pub fn from_matrix<S: AsRef<str>>(rows: &[S], paper: &[char]) -> Self {
        let width = rows.iter().map(|r| r.as_ref().chars().count()).max().unwrap_or(0);
        let pixels = rows
            .iter()
            .map(|row| {
                let mut bits: Vec<bool> = row.as_ref().chars().map(|c| !paper.contains(&c)).collect();
                bits.resize(width, false);
                bits
            })
            .collect();
        Self::new(pixels)
    }

    /// Build from packed rows, most significant bit first, each row padded
    /// to a whole byte.
    pub fn from_bytes(bytes: &[u8], width: usize) -> Self {
        let stride = width.div_ceil(8);
        if stride == 0 {
            return Self::default();
        }
        let pixels = bytes
            .chunks(stride)
            .filter(|row| row.len() == stride)
            .map(|row| (0..width).map(|x| row[x / 8] & (0x80 >> (x % 8)) != 0).collect())
            .collect();
        Self::new(pixels)
    }

    /// Inverse of [`Glyph::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let stride = self.width().div_ceil(8);
        let mut out = vec![0u8; stride * self.height()];
        for (y, row) in self.pixels.iter().enumerate() {
            for (x, _) in row.iter().enumerate().filter(|(_, ink)| **ink) {
                out[y * stride + x / 8] |= 0x80 >> (x % 8);
            }
        }
        out
    }

    /// Text rows with the given ink and paper characters.
    pub fn to_rows(&self, ink: char, paper: char) -> Vec<String> {
        self.pixels
            .iter()
            .map(|row| row.iter().map(|&b| if b { ink } else { paper }).collect())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.pixels.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Vec<bool>] {
        &self.pixels
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().flatten().all(|&b| !b)
    }

    // ── Labels ───────────────────────────────────────────────────────────────

    pub fn codepoint(&self) -> Option<u32> {
        self.codepoint
    }

    /// Unicode text this glyph represents; usually one character.
    pub fn chars(&self) -> &str {
        &self.chars
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn with_codepoint(mut self, codepoint: u32) -> Self {
        self.codepoint = Some(codepoint);
        self
    }

    pub fn with_chars(mut self, chars: impl Into<String>) -> Self {
        self.chars = chars.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.is_empty() {
            self.tags.push(tag);
        }
        self
    }

    /// Short label for messages: the codepoint in hex, else the characters.
    pub fn label(&self) -> String {
        match (self.codepoint, self.chars.is_empty()) {
            (Some(cp), _) => format!("{cp:#04x}"),
            (None, false) => format!("{:?}", self.chars),
            (None, true)  => self.tags.first().cloned().unwrap_or_else(|| "?".into()),
        }
    }

    fn with_pixels(&self, pixels: Vec<Vec<bool>>) -> Self {
        Self { pixels, ..self.clone() }
    }

    // ── Pixel operations ─────────────────────────────────────────────────────

    /// Reverse horizontally.
    pub fn mirror(&self) -> Self {
        self.with_pixels(self.pixels.iter().map(|r| r.iter().rev().copied().collect()).collect())
    }

    /// Reverse vertically.
    pub fn flip(&self) -> Self {
        self.with_pixels(self.pixels.iter().rev().cloned().collect())
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        let pixels = (0..self.width())
            .map(|x| self.pixels.iter().map(|row| row[x]).collect())
            .collect();
        self.with_pixels(pixels)
    }

    /// Rotate by quarter turns; positive is clockwise.
    pub fn rotate(&self, turns: i32) -> Self {
        match turns.rem_euclid(4) {
            1 => self.transpose().mirror(),
            2 => self.flip().mirror(),
            3 => self.transpose().flip(),
            _ => self.clone(),
        }
    }

    /// Reverse video.
    pub fn invert(&self) -> Self {
        self.with_pixels(self.pixels.iter().map(|r| r.iter().map(|b| !b).collect()).collect())
    }

    /// Remove the given number of columns and rows from each side.
    pub fn crop(&self, left: usize, top: usize, right: usize, bottom: usize) -> Self {
        let (w, h) = (self.width(), self.height());
        let (x0, x1) = (left.min(w), w.saturating_sub(right).max(left.min(w)));
        let (y0, y1) = (top.min(h), h.saturating_sub(bottom).max(top.min(h)));
        self.with_pixels(self.pixels[y0..y1].iter().map(|r| r[x0..x1].to_vec()).collect())
    }

    /// Add blank columns and rows on each side.
    pub fn expand(&self, left: usize, top: usize, right: usize, bottom: usize) -> Self {
        let width = left + self.width() + right;
        let mut pixels = vec![vec![false; width]; top];
        for row in &self.pixels {
            let mut new_row = vec![false; left];
            new_row.extend_from_slice(row);
            new_row.resize(width, false);
            pixels.push(new_row);
        }
        pixels.extend(std::iter::repeat(vec![false; width]).take(bottom));
        self.with_pixels(pixels)
    }

    /// Repeat every column `factor_x` times and every row `factor_y` times.
    pub fn stretch(&self, factor_x: usize, factor_y: usize) -> Self {
        let pixels = self
            .pixels
            .iter()
            .flat_map(|row| {
                let wide: Vec<bool> = row.iter().flat_map(|&b| std::iter::repeat(b).take(factor_x)).collect();
                std::iter::repeat(wide).take(factor_y)
            })
            .collect();
        self.with_pixels(pixels)
    }

    /// Keep every `factor_x`-th column and `factor_y`-th row.
    pub fn shrink(&self, factor_x: usize, factor_y: usize) -> Self {
        let (fx, fy) = (factor_x.max(1), factor_y.max(1));
        let pixels = self
            .pixels
            .iter()
            .step_by(fy)
            .map(|row| row.iter().step_by(fx).copied().collect())
            .collect();
        self.with_pixels(pixels)
    }

    /// True if [`Glyph::shrink`] would drop ink that differs from what it keeps.
    pub fn shrink_is_lossy(&self, factor_x: usize, factor_y: usize) -> bool {
        let (fx, fy) = (factor_x.max(1), factor_y.max(1));
        let rows_differ = self.pixels.chunks(fy).any(|group| group.iter().any(|r| *r != group[0]));
        let cols_differ = self
            .pixels
            .iter()
            .any(|row| row.chunks(fx).any(|group| group.iter().any(|&b| b != group[0])));
        rows_differ || cols_differ
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.to_rows('@', '.') {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
