//! Whole-font transforms, as offered on the command line.

use crate::error::{Error, Result};
use crate::font::{Font, Pack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Leave glyphs untouched.
    Convert,
    Mirror,
    Flip,
    Transpose,
    /// Quarter turns, positive clockwise.
    Rotate { turns: i32 },
    Invert,
    Crop { left: usize, top: usize, right: usize, bottom: usize },
    Expand { left: usize, top: usize, right: usize, bottom: usize },
    Stretch { factor_x: usize, factor_y: usize },
    /// Unless `force`, refuses when any glyph would lose pixels.
    Shrink { factor_x: usize, factor_y: usize, force: bool },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Convert      => "convert",
            Operation::Mirror       => "mirror",
            Operation::Flip         => "flip",
            Operation::Transpose    => "transpose",
            Operation::Rotate { .. } => "rotate",
            Operation::Invert       => "invert",
            Operation::Crop { .. }   => "crop",
            Operation::Expand { .. } => "expand",
            Operation::Stretch { .. } => "stretch",
            Operation::Shrink { .. }  => "shrink",
        }
    }

    pub fn apply(&self, font: &Font) -> Result<Font> {
        Ok(match *self {
            Operation::Convert   => font.clone(),
            Operation::Mirror    => font.with_glyphs_mapped(|g| g.mirror()),
            Operation::Flip      => font.with_glyphs_mapped(|g| g.flip()),
            Operation::Transpose => font.with_glyphs_mapped(|g| g.transpose()),
            Operation::Rotate { turns } => font.with_glyphs_mapped(|g| g.rotate(turns)),
            Operation::Invert    => font.with_glyphs_mapped(|g| g.invert()),
            Operation::Crop { left, top, right, bottom } => {
                font.with_glyphs_mapped(|g| g.crop(left, top, right, bottom))
            }
            Operation::Expand { left, top, right, bottom } => {
                font.with_glyphs_mapped(|g| g.expand(left, top, right, bottom))
            }
            Operation::Stretch { factor_x, factor_y } => {
                check_factors(factor_x, factor_y)?;
                font.with_glyphs_mapped(|g| g.stretch(factor_x, factor_y))
            }
            Operation::Shrink { factor_x, factor_y, force } => {
                check_factors(factor_x, factor_y)?;
                if !force {
                    let lossy: Vec<String> = font
                        .glyphs()
                        .iter()
                        .filter(|g| g.shrink_is_lossy(factor_x, factor_y))
                        .map(|g| g.label())
                        .collect();
                    if !lossy.is_empty() {
                        return Err(Error::format(format!(
                            "Can't shrink without loss; glyphs affected: [{}]",
                            lossy.join(", ")
                        )));
                    }
                }
                font.with_glyphs_mapped(|g| g.shrink(factor_x, factor_y))
            }
        })
    }

    pub fn apply_pack(&self, pack: &Pack) -> Result<Pack> {
        pack.try_map(|font| self.apply(font))
    }
}

fn check_factors(factor_x: usize, factor_y: usize) -> Result<()> {
    if factor_x == 0 || factor_y == 0 {
        return Err(Error::config("Scaling factors must be at least 1."));
    }
    Ok(())
}
