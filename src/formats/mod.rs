//! The font formats this crate ships.
//!
//! | name   | load | save | identified by                 |
//! |--------|------|------|-------------------------------|
//! | yaff   | yes  | yes  | `.yaff`, `.yaffs`             |
//! | figlet | yes  | yes  | magic `flf2a`, `.flf`         |
//! | psf    | yes  | yes  | PSF1/PSF2 magic, `.psf`       |
//! | c      | yes  | no   | `.c`, `.cc`, `.cpp`, `.h`     |
//!
//! Registration order decides ties between magic matches, so formats with
//! a magic come before those identified by extension alone.

pub mod c;
pub mod figlet;
pub mod psf;
pub mod yaff;

use crate::convert::Formats;
use crate::error::Result;
use crate::plugin::{FontLoader, FontSaver};
use crate::registry::Registry;
use crate::DEFAULT_FORMAT;

pub fn loaders() -> Result<Registry<dyn FontLoader>> {
    Ok(Registry::<dyn FontLoader>::builder()
        .register(Box::new(figlet::FigletLoader))?
        .register(Box::new(psf::PsfLoader))?
        .register(Box::new(yaff::YaffLoader))?
        .register(Box::new(c::CLoader))?
        .default_format(DEFAULT_FORMAT)
        .build())
}

pub fn savers() -> Result<Registry<dyn FontSaver>> {
    Ok(Registry::<dyn FontSaver>::builder()
        .register(Box::new(figlet::FigletSaver))?
        .register(Box::new(psf::PsfSaver))?
        .register(Box::new(yaff::YaffSaver))?
        .default_format(DEFAULT_FORMAT)
        .build())
}

/// Every built-in format, with `yaff` as the fallback.
pub fn register_all() -> Result<Formats> {
    Ok(Formats::new(loaders()?, savers()?))
}
