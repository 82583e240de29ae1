//! In-memory bitmap fonts.
//!
//! A [`Font`] is glyphs plus an ordered list of `key: value` properties. A
//! [`Pack`] is an ordered sequence of fonts, which is what every load returns
//! and every save accepts. Both are values: operations build new ones.

pub mod glyph;
pub mod ops;

pub use glyph::Glyph;
pub use ops::Operation;

use crate::error::Result;

/// Property keys compare with `-` and `_` treated alike and case folded.
fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Font {
    glyphs:     Vec<Glyph>,
    properties: Vec<(String, String)>,
    comments:   Vec<String>,
}

impl Font {
    pub fn new(glyphs: Vec<Glyph>) -> Self {
        Self { glyphs, ..Self::default() }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Properties in insertion order, keys normalised.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.properties.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    /// Free-text comments, one entry per line.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// The `name` property, else the `family`, else `"unnamed"`.
    pub fn name(&self) -> &str {
        self.property("name")
            .or_else(|| self.property("family"))
            .unwrap_or("unnamed")
    }

    /// Tallest glyph height; zero for a font without glyphs.
    pub fn pixel_size(&self) -> usize {
        self.glyphs.iter().map(Glyph::height).max().unwrap_or(0)
    }

    pub fn glyph_for_codepoint(&self, codepoint: u32) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.codepoint() == Some(codepoint))
    }

    pub fn glyph_for_char(&self, c: char) -> Option<&Glyph> {
        let mut buf = [0u8; 4];
        let s: &str = c.encode_utf8(&mut buf);
        self.glyphs.iter().find(|g| g.chars() == s)
    }

    // ── Builders ─────────────────────────────────────────────────────────────

    /// Set `key`, replacing any existing value.
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = normalize_key(key);
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    /// Set `key` only if it has no value yet.
    pub fn set_property_if_absent(self, key: &str, value: impl Into<String>) -> Self {
        if self.property(key).is_some() {
            self
        } else {
            self.with_property(key, value)
        }
    }

    pub fn with_comment(mut self, line: impl Into<String>) -> Self {
        self.comments.push(line.into());
        self
    }

    pub fn with_glyphs(self, glyphs: Vec<Glyph>) -> Self {
        Self { glyphs, ..self }
    }

    /// New font with `f` applied to every glyph.
    pub fn with_glyphs_mapped<F>(&self, f: F) -> Self
    where
        F: Fn(&Glyph) -> Glyph,
    {
        Self { glyphs: self.glyphs.iter().map(f).collect(), ..self.clone() }
    }
}

/// Ordered fonts; names need not be unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pack(Vec<Font>);

impl Pack {
    pub fn new(fonts: Vec<Font>) -> Self {
        Self(fonts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fonts(&self) -> &[Font] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Font> {
        self.0.iter()
    }

    pub fn into_fonts(self) -> Vec<Font> {
        self.0
    }

    pub fn map<F: Fn(&Font) -> Font>(&self, f: F) -> Self {
        Self(self.0.iter().map(f).collect())
    }

    pub fn try_map<F: Fn(&Font) -> Result<Font>>(&self, f: F) -> Result<Self> {
        self.0.iter().map(f).collect::<Result<Vec<_>>>().map(Self)
    }
}

impl From<Font> for Pack {
    fn from(font: Font) -> Self {
        Self(vec![font])
    }
}

impl From<Vec<Font>> for Pack {
    fn from(fonts: Vec<Font>) -> Self {
        Self(fonts)
    }
}

impl FromIterator<Font> for Pack {
    fn from_iter<I: IntoIterator<Item = Font>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Pack {
    type Item = Font;
    type IntoIter = std::vec::IntoIter<Font>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Pack {
    type Item = &'a Font;
    type IntoIter = std::slice::Iter<'a, Font>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_keys_are_normalised() {
        let font = Font::default().with_property("Source-Format", "figlet");
        assert_eq!(font.property("source_format"), Some("figlet"));
        assert_eq!(font.properties()[0].0, "source_format");
    }

    #[test]
    fn set_if_absent_keeps_existing() {
        let font = Font::default()
            .with_property("converter", "older")
            .set_property_if_absent("converter", "newer")
            .set_property_if_absent("source_name", "a.flf");
        assert_eq!(font.property("converter"), Some("older"));
        assert_eq!(font.property("source_name"), Some("a.flf"));
    }

    #[test]
    fn name_falls_back() {
        assert_eq!(Font::default().name(), "unnamed");
        assert_eq!(Font::default().with_property("family", "Fixed").name(), "Fixed");
        let font = Font::default().with_property("family", "Fixed").with_property("name", "Fixed 8");
        assert_eq!(font.name(), "Fixed 8");
    }

    #[test]
    fn pack_from_single_font() {
        let pack = Pack::from(Font::default());
        assert_eq!(pack.len(), 1);
        let mapped = pack.map(|f| f.clone().with_property("name", "x"));
        assert_eq!(pack.fonts()[0].name(), "unnamed");
        assert_eq!(mapped.fonts()[0].name(), "x");
    }
}
