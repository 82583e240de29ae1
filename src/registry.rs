//! Plugin registry: lookup by name, identification by content or file name.
//!
//! One generic [`Registry`] serves both directions; the converter keeps one
//! for loaders and one for savers. A registry is assembled once through
//! [`RegistryBuilder`] and is immutable afterwards.
//!
//! # Identification order
//! 1. Magic bytes, if content probing is allowed and the stream can peek.
//!    Plugins are tried in registration order; the first whose prefix
//!    matches wins.
//! 2. The file name's extension, after removing any compression suffix,
//!    compared case-insensitively.
//!
//! An explicit format name bypasses both. If nothing matches, the registry's
//! default format is used.

use log::debug;

use crate::error::{Error, Result};
use crate::plugin::Plugin;
use crate::stream::{strip_compression_suffix, Stream};

pub struct Registry<T: ?Sized> {
    plugins: Vec<Box<T>>,
    default: Option<&'static str>,
}

pub struct RegistryBuilder<T: ?Sized> {
    plugins: Vec<Box<T>>,
    default: Option<&'static str>,
}

impl<T: Plugin + ?Sized> Default for RegistryBuilder<T> {
    fn default() -> Self {
        Self { plugins: Vec::new(), default: None }
    }
}

impl<T: Plugin + ?Sized> RegistryBuilder<T> {
    /// Add a plugin. Names are unique, compared case-insensitively.
    pub fn register(mut self, plugin: Box<T>) -> Result<Self> {
        let name = plugin.descriptor().name;
        if self.plugins.iter().any(|p| p.descriptor().name.eq_ignore_ascii_case(name)) {
            return Err(Error::config(format!("Format `{name}` is already registered.")));
        }
        self.plugins.push(plugin);
        Ok(self)
    }

    /// Format to fall back on when identification finds nothing.
    pub fn default_format(mut self, name: &'static str) -> Self {
        self.default = Some(name);
        self
    }

    pub fn build(self) -> Registry<T> {
        Registry { plugins: self.plugins, default: self.default }
    }
}

impl<T: Plugin + ?Sized> Registry<T> {
    pub fn builder() -> RegistryBuilder<T> {
        RegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registered plugins, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.plugins.iter().map(|p| &**p)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.iter().map(|p| p.descriptor().name)
    }

    /// Look up by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.iter().find(|p| p.descriptor().name.eq_ignore_ascii_case(name))
    }

    /// The fallback format, if one was configured and registered.
    pub fn default_plugin(&self) -> Option<&T> {
        self.default.and_then(|name| self.get(name))
    }

    /// Best plugin for `stream`, by magic and then by extension.
    pub fn identify(&self, stream: &mut Stream, probe_content: bool) -> Option<&T> {
        if probe_content && stream.can_peek() {
            if let Some(plugin) = self.identify_by_magic(stream) {
                return Some(plugin);
            }
        }
        let name = strip_compression_suffix(stream.base_name());
        let (_, ext) = name.rsplit_once('.')?;
        let found = self.iter().find(|p| p.descriptor().matches_extension(ext));
        if let Some(plugin) = found {
            debug!("`{}` matches extension of {}.", stream.name(), plugin.descriptor().name);
        }
        found
    }

    fn identify_by_magic(&self, stream: &mut Stream) -> Option<&T> {
        let longest = self
            .iter()
            .flat_map(|p| p.descriptor().magic.iter())
            .map(|m| m.len())
            .max()?;
        let name = stream.name().to_owned();
        let head = match stream.peek(longest) {
            Ok(head) => head,
            Err(e) => {
                debug!("Could not peek `{name}`: {e}");
                return None;
            }
        };
        let found = self.iter().find(|p| p.descriptor().matches_magic(head));
        if let Some(plugin) = found {
            debug!("`{name}` matches magic of {}.", plugin.descriptor().name);
        }
        found
    }

    /// Plugin for `stream`: the one named by `format` if given, else the
    /// identified one, else the default.
    pub fn get_plugin(&self, stream: &mut Stream, format: &str, probe_content: bool) -> Option<&T> {
        if !format.is_empty() {
            return self.get(format);
        }
        self.identify(stream, probe_content)
            .or_else(|| self.default_plugin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Descriptor;

    struct Fake(Descriptor);

    impl Plugin for Fake {
        fn descriptor(&self) -> &Descriptor {
            &self.0
        }
    }

    const fn desc(name: &'static str, extensions: &'static [&'static str], magic: &'static [&'static [u8]]) -> Descriptor {
        Descriptor { name, extensions, magic, options: &[], linked: None }
    }

    const FIGLET: Descriptor = desc("figlet", &["flf"], &[b"flf2a"]);
    const TEXT: Descriptor = desc("text", &["txt"], &[]);
    const YAFF: Descriptor = desc("yaff", &["yaff"], &[]);
    const SHOUTY_YAFF: Descriptor = desc("YAFF", &["yaffs"], &[]);

    fn registry() -> Registry<dyn Plugin> {
        Registry::<dyn Plugin>::builder()
            .register(Box::new(Fake(FIGLET)))
            .unwrap()
            .register(Box::new(Fake(TEXT)))
            .unwrap()
            .register(Box::new(Fake(YAFF)))
            .unwrap()
            .default_format("yaff")
            .build()
    }

    fn found(plugin: Option<&dyn Plugin>) -> Option<&'static str> {
        plugin.map(|p| p.descriptor().name)
    }

    #[test]
    fn magic_beats_extension() {
        let reg = registry();
        let mut s = Stream::from_bytes("font.txt", b"flf2a$ 8 6 10 0 0\n".to_vec()).unwrap();
        assert_eq!(found(reg.identify(&mut s, true)), Some("figlet"));
        assert_eq!(found(reg.identify(&mut s, false)), Some("text"));
        // Identification never consumes content.
        assert_eq!(s.peek(5).unwrap(), b"flf2a");
    }

    #[test]
    fn extension_ignores_case_and_compression() {
        let reg = registry();
        let mut s = Stream::from_bytes("dir/FONT.FLF.gz", b"no magic here".to_vec()).unwrap();
        assert_eq!(found(reg.identify(&mut s, true)), Some("figlet"));
    }

    #[test]
    fn explicit_name_then_default() {
        let reg = registry();
        let mut s = Stream::from_bytes("mystery.bin", b"flf2a".to_vec()).unwrap();
        assert_eq!(found(reg.get_plugin(&mut s, "TEXT", true)), Some("text"));
        assert_eq!(found(reg.get_plugin(&mut s, "nope", true)), None);
        assert_eq!(found(reg.get_plugin(&mut s, "", false)), Some("yaff"));
    }

    #[test]
    fn write_streams_are_never_sniffed() {
        let reg = registry();
        let mut s = Stream::from_writer("out.flf", Vec::new()).unwrap();
        assert_eq!(found(reg.get_plugin(&mut s, "", true)), Some("figlet"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Registry::<dyn Plugin>::builder()
            .register(Box::new(Fake(YAFF)))
            .unwrap()
            .register(Box::new(Fake(SHOUTY_YAFF)));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
