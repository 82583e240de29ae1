//! Contract between the converter and the font format plugins.
//!
//! A format is a [`FontLoader`], a [`FontSaver`], or both. Each carries a
//! static [`Descriptor`]: its name, the file extensions it claims, the magic
//! byte prefixes that identify its files, and the options it accepts.
//!
//! # Identity
//! A loader and a saver for the same format share identity. The saver's
//! descriptor is derived from the loader's with [`Descriptor::saver_for`],
//! which copies the name and extensions and marks the two as linked, so the
//! metadata is declared once.
//!
//! # Magic
//! Only loaders declare magic. There is nothing to sniff when writing, so a
//! saver descriptor's `magic` is always empty.
//!
//! # Options
//! Plugins take no free-form arguments. Every option is declared up front as
//! an [`OptionSpec`]; raw `key=value` pairs are checked against that schema
//! by [`Options::parse`] before the plugin is called, so a plugin never sees
//! an unknown key or a value of the wrong type.
//!
//! # Thread safety
//! Plugins are registered once at startup and shared read-only thereafter,
//! hence the `Send + Sync` bound. They must not keep per-call state.

use std::collections::BTreeMap;
use std::fmt;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::font::{Font, Pack};
use crate::stream::Stream;

// ── Option schema ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Str,
    Int,
    Bool,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionKind::Str  => "string",
            OptionKind::Int  => "integer",
            OptionKind::Bool => "boolean",
        })
    }
}

/// One option a plugin accepts.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name:    &'static str,
    pub kind:    OptionKind,
    /// Value used when the option is not given. Must parse as `kind`.
    pub default: Option<&'static str>,
    pub help:    &'static str,
}

impl OptionSpec {
    pub const fn new(name: &'static str, kind: OptionKind, help: &'static str) -> Self {
        Self { name, kind, default: None, help }
    }

    pub const fn with_default(self, default: &'static str) -> Self {
        Self { default: Some(default), ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl OptionValue {
    fn parse(spec: &OptionSpec, raw: &str) -> Result<Self> {
        let bad = || {
            Error::config(format!(
                "Option `{}` expects {}, got `{raw}`.",
                spec.name, spec.kind
            ))
        };
        Ok(match spec.kind {
            OptionKind::Str => OptionValue::Str(raw.to_owned()),
            OptionKind::Int => OptionValue::Int(parse_int(raw).ok_or_else(bad)?),
            OptionKind::Bool => OptionValue::Bool(match raw.to_ascii_lowercase().as_str() {
                "" | "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off"     => false,
                _ => return Err(bad()),
            }),
        })
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Validated option values for one plugin call.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: BTreeMap<&'static str, OptionValue>,
}

impl Options {
    /// Check `raw` pairs against `schema` and fill in defaults.
    ///
    /// Keys match with `-` and `_` treated alike.
    pub fn parse(schema: &[OptionSpec], raw: &[(String, String)]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for spec in schema {
            if let Some(default) = spec.default {
                values.insert(spec.name, OptionValue::parse(spec, default)?);
            }
        }
        for (key, value) in raw {
            let key_norm = key.replace('-', "_");
            let spec = schema
                .iter()
                .find(|s| s.name == key_norm)
                .ok_or_else(|| Error::config(format!("Unknown option `{key}`.")))?;
            values.insert(spec.name, OptionValue::parse(spec, value)?);
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Absent flags are false.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Bool(true)))
    }

    /// An integer option the plugin cannot do without.
    pub fn require_int(&self, name: &str) -> Result<i64> {
        self.int(name)
            .ok_or_else(|| Error::config(format!("Option `{name}` is required.")))
    }
}

// ── Descriptor ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub name:       &'static str,
    /// Without the dot, lower case. The first is used for new file names.
    pub extensions: &'static [&'static str],
    /// Leading byte sequences that identify the format's files.
    pub magic:      &'static [&'static [u8]],
    pub options:    &'static [OptionSpec],
    /// Name of the counterpart in the other direction, if any.
    pub linked:     Option<&'static str>,
}

impl Descriptor {
    /// Identity of the saver paired with `loader`.
    pub const fn saver_for(loader: &Descriptor, options: &'static [OptionSpec]) -> Self {
        Self {
            name:       loader.name,
            extensions: loader.extensions,
            magic:      &[],
            options,
            linked:     Some(loader.name),
        }
    }

    /// Same descriptor, marked as having a saver counterpart.
    pub const fn linked(self) -> Self {
        Self { linked: Some(self.name), ..self }
    }

    /// Conventional extension for new files.
    pub fn default_extension(&self) -> &'static str {
        self.extensions.first().copied().unwrap_or(self.name)
    }

    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn matches_magic(&self, head: &[u8]) -> bool {
        self.magic.iter().any(|m| !m.is_empty() && head.starts_with(m))
    }
}

// ── Plugin traits ────────────────────────────────────────────────────────────

pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> &Descriptor;
}

/// Reads fonts from a stream.
///
/// `container` is where the stream lives. Formats that refer to other files
/// (a font split over several files, say) open them through it.
pub trait FontLoader: Plugin {
    fn load(
        &self,
        stream:    &mut Stream,
        container: &mut dyn Container,
        options:   &Options,
    ) -> Result<Vec<Font>>;
}

/// Writes a pack of fonts to a stream.
///
/// A saver writes every font in `pack` or fails. A format that holds one
/// font per file rejects a larger pack with [`Error::Format`]; it never
/// truncates silently.
pub trait FontSaver: Plugin {
    fn save(
        &self,
        pack:      &Pack,
        stream:    &mut Stream,
        container: &mut dyn Container,
        options:   &Options,
    ) -> Result<()>;
}

/// The usual guard for single-font formats.
pub fn require_single_font<'p>(pack: &'p Pack, format: &str) -> Result<&'p Font> {
    match pack.fonts() {
        [font] => Ok(font),
        fonts => Err(Error::format(format!(
            "Can only save one font to a {format} file, got {}.",
            fonts.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[OptionSpec] = &[
        OptionSpec::new("ink", OptionKind::Str, "ink character"),
        OptionSpec::new("width", OptionKind::Int, "glyph width").with_default("8"),
        OptionSpec::new("strict_mode", OptionKind::Bool, "fail on oddities"),
    ];

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_and_overrides() {
        let opts = Options::parse(SCHEMA, &[]).unwrap();
        assert_eq!(opts.int("width"), Some(8));
        assert!(!opts.flag("strict_mode"));

        let opts = Options::parse(SCHEMA, &pairs(&[("width", "0x10"), ("strict-mode", "yes")])).unwrap();
        assert_eq!(opts.int("width"), Some(16));
        assert!(opts.flag("strict_mode"));
    }

    #[test]
    fn unknown_and_ill_typed_options_are_config_errors() {
        assert!(matches!(Options::parse(SCHEMA, &pairs(&[("colour", "red")])), Err(Error::Config(_))));
        assert!(matches!(Options::parse(SCHEMA, &pairs(&[("width", "wide")])), Err(Error::Config(_))));
        assert!(matches!(Options::parse(SCHEMA, &pairs(&[("strict_mode", "maybe")])), Err(Error::Config(_))));
    }

    #[test]
    fn saver_shares_loader_identity() {
        const LOADER: Descriptor = Descriptor {
            name:       "demo",
            extensions: &["dmo", "demo"],
            magic:      &[b"DEMO"],
            options:    &[],
            linked:     None,
        };
        const SAVER: Descriptor = Descriptor::saver_for(&LOADER, &[]);
        assert_eq!(SAVER.name, "demo");
        assert_eq!(SAVER.default_extension(), "dmo");
        assert!(SAVER.magic.is_empty());
        assert_eq!(SAVER.linked, Some("demo"));
        assert!(LOADER.matches_magic(b"DEMO and more"));
        assert!(LOADER.matches_extension("DMO"));
    }

    #[test]
    fn single_font_guard() {
        let one = Pack::from(Font::default());
        assert!(require_single_font(&one, "demo").is_ok());
        let two = Pack::new(vec![Font::default(), Font::default()]);
        assert!(matches!(require_single_font(&two, "demo"), Err(Error::Format(_))));
    }
}
