//! Member compression codecs for `.fpk` font bundles.
//!
//! # Identity rules
//! Every codec is identified on disk by a single byte written into each
//! member block header. The byte values are permanent: a value is never
//! reused, even if a codec is removed from a later build. A reader that meets
//! an unknown codec byte fails that member with [`CodecError::UnknownCodec`];
//! other members of the same bundle remain readable.

use std::io::{self, Read, Write};
use thiserror::Error;

// ── Frozen codec bytes ──────────────────────────────────────────────────────

/// Stored verbatim.
pub const CODEC_NONE:   u8 = 0;
/// Zstandard (default).
pub const CODEC_ZSTD:   u8 = 1;
/// Brotli. Good ratio on the text formats most fonts are stored in.
pub const CODEC_BROTLI: u8 = 2;
/// LZMA. Highest ratio, slowest codec.
pub const CODEC_LZMA:   u8 = 3;

/// Default Zstd compression level.
pub const DEFAULT_LEVEL: i32 = 3;

// ── CodecId enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    None,
    Zstd,
    Brotli,
    Lzma,
}

impl CodecId {
    /// The byte written to disk for this codec.
    #[inline]
    pub fn to_byte(self) -> u8 {
        match self {
            CodecId::None   => CODEC_NONE,
            CodecId::Zstd   => CODEC_ZSTD,
            CodecId::Brotli => CODEC_BROTLI,
            CodecId::Lzma   => CODEC_LZMA,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CODEC_NONE   => Some(CodecId::None),
            CODEC_ZSTD   => Some(CodecId::Zstd),
            CODEC_BROTLI => Some(CodecId::Brotli),
            CODEC_LZMA   => Some(CodecId::Lzma),
            _            => None,
        }
    }

    /// Human-readable name, also used in the bundle index.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None   => "none",
            CodecId::Zstd   => "zstd",
            CodecId::Brotli => "brotli",
            CodecId::Lzma   => "lzma",
        }
    }

    /// Parse a name as stored in the bundle index.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"   => Some(CodecId::None),
            "zstd"   => Some(CodecId::Zstd),
            "brotli" => Some(CodecId::Brotli),
            "lzma"   => Some(CodecId::Lzma),
            _        => None,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown codec byte {0:#04x}")]
    UnknownCodec(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn codec_id(&self) -> CodecId { CodecId::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8])        -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct BrotliCodec;
impl Codec for BrotliCodec {
    fn codec_id(&self) -> CodecId { CodecId::Brotli }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let quality = level.clamp(0, 11) as u32;
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, quality, 22);
            w.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        }
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

pub struct LzmaCodec;
impl Codec for LzmaCodec {
    fn codec_id(&self) -> CodecId { CodecId::Lzma }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_compress(&mut io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_decompress(&mut io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve an on-disk codec byte to a built-in codec.
pub fn get_codec_by_byte(byte: u8) -> Result<Box<dyn Codec>, CodecError> {
    CodecId::from_byte(byte)
        .map(get_codec)
        .ok_or(CodecError::UnknownCodec(byte))
}

/// Resolve a CodecId to a built-in codec.
pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None   => Box::new(NoneCodec),
        CodecId::Zstd   => Box::new(ZstdCodec),
        CodecId::Brotli => Box::new(BrotliCodec),
        CodecId::Lzma   => Box::new(LzmaCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"flf2a$ 4 3 8 -1 2\n@@\n  #  @\n #### @@\n";

    #[test]
    fn every_codec_restores_its_input() {
        for id in [CodecId::None, CodecId::Zstd, CodecId::Brotli, CodecId::Lzma] {
            let codec = get_codec(id);
            let packed = codec.compress(SAMPLE, DEFAULT_LEVEL).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), SAMPLE, "{}", id.name());
        }
    }

    #[test]
    fn codec_bytes_are_stable() {
        assert_eq!(CodecId::from_byte(1), Some(CodecId::Zstd));
        assert_eq!(CodecId::Lzma.to_byte(), 3);
        assert!(matches!(get_codec_by_byte(0xEE), Err(CodecError::UnknownCodec(0xEE))));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(CodecId::from_name("Brotli"), Some(CodecId::Brotli));
        assert_eq!(CodecId::from_name("lz4"), None);
    }
}
