//! Load, transform and save bitmap fonts.
//!
//! ```no_run
//! use bitfont::{load, save, LoadOptions, Location, SaveOptions};
//!
//! let pack = load(Location::from("fonts/"), Location::Empty, &LoadOptions::default())?;
//! save(&pack, Location::from("fonts.fpk"), Location::Empty, &SaveOptions::default())?;
//! # Ok::<(), bitfont::Error>(())
//! ```

pub mod codec;
pub mod container;
pub mod convert;
pub mod error;
pub mod font;
pub mod formats;
pub mod location;
pub mod plugin;
pub mod registry;
pub mod stream;

pub use container::{Container, Directory, Probe};
pub use convert::{Formats, LoadOptions, SaveOptions};
pub use error::{Error, Result};
pub use font::{Font, Glyph, Operation, Pack};
pub use location::{open_location, Location};
pub use plugin::{Descriptor, FontLoader, FontSaver, Options};
pub use registry::Registry;
pub use stream::{Mode, Stream};

use once_cell::sync::Lazy;

/// Recorded in the `converter` property of every loaded font.
pub const CONVERTER_NAME: &str = concat!("bitfont v", env!("CARGO_PKG_VERSION"));

/// Saver used when neither a format name nor a file extension decides.
pub const DEFAULT_FORMAT: &str = "yaff";

static FORMATS: Lazy<Result<Formats>> = Lazy::new(formats::register_all);

/// The built-in formats, registered on first use.
pub fn formats() -> Result<&'static Formats> {
    FORMATS
        .as_ref()
        .map_err(|e| Error::config(format!("Format registration failed: {e}")))
}

/// Load with the built-in formats. See [`Formats::load`].
pub fn load<'a>(file: Location<'a>, place: Location<'a>, opts: &LoadOptions) -> Result<Pack> {
    formats()?.load(file, place, opts)
}

/// Save with the built-in formats. See [`Formats::save`].
pub fn save<'a>(pack: &Pack, file: Location<'a>, place: Location<'a>, opts: &SaveOptions) -> Result<()> {
    formats()?.save(pack, file, place, opts)
}
