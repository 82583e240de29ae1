//! On-disk layout of `.fpk` font bundles.
//!
//! ```text
//! [ Superblock (28 B) | member block | member block | ... | index block ]
//! ```
//!
//! # Superblock
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 4    | magic `FPK\x1a`|
//! | 4      | 4    | version        |
//! | 8      | 4    | member count   |
//! | 12     | 8    | index offset   |
//! | 20     | 8    | index size     |
//!
//! # Block
//! A 20-byte header (magic, codec byte, level, flags, compressed size,
//! original size, CRC32 of the payload) followed by the payload. The index
//! is itself a block: zstd-compressed JSON, never anything else.
//!
//! All integers are little-endian.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use super::{BundleError, BundleOptions};
use crate::codec::{get_codec, get_codec_by_byte, CodecId, DEFAULT_LEVEL};

pub const MAGIC: &[u8; 4] = b"FPK\x1a";
pub const VERSION: u32 = 1;
pub const SUPERBLOCK_SIZE: usize = 28;

pub const BLOCK_MAGIC: u32 = 0x424C434B;
pub const BLOCK_HEADER_SIZE: usize = 20;

// ── Superblock ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Superblock {
    pub member_count: u32,
    pub index_offset: u64,
    pub index_size:   u64,
}

impl Superblock {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(self.member_count)?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u64::<LittleEndian>(self.index_size)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, BundleError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(BundleError::InvalidMagic);
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(BundleError::UnsupportedVersion(version));
        }
        Ok(Self {
            member_count: reader.read_u32::<LittleEndian>()?,
            index_offset: reader.read_u64::<LittleEndian>()?,
            index_size:   reader.read_u64::<LittleEndian>()?,
        })
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub codec:     u8,
    pub level:     i8,
    pub flags:     u16,
    pub comp_size: u32,
    pub orig_size: u32,
    pub checksum:  u32,
}

impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(BLOCK_MAGIC)?;
        writer.write_u8(self.codec)?;
        writer.write_i8(self.level)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.comp_size)?;
        writer.write_u32::<LittleEndian>(self.orig_size)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R, offset: u64) -> Result<Self, BundleError> {
        if reader.read_u32::<LittleEndian>()? != BLOCK_MAGIC {
            return Err(BundleError::BadBlock(offset));
        }
        Ok(Self {
            codec:     reader.read_u8()?,
            level:     reader.read_i8()?,
            flags:     reader.read_u16::<LittleEndian>()?,
            comp_size: reader.read_u32::<LittleEndian>()?,
            orig_size: reader.read_u32::<LittleEndian>()?,
            checksum:  reader.read_u32::<LittleEndian>()?,
        })
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn to_u32(len: usize) -> Result<u32, BundleError> {
    u32::try_from(len).map_err(|_| BundleError::TooLarge(len))
}

pub fn encode_block(
    data:  &[u8],
    codec: CodecId,
    level: i32,
) -> Result<(BlockHeader, Vec<u8>), BundleError> {
    let payload = get_codec(codec).compress(data, level)?;
    let header = BlockHeader {
        codec:     codec.to_byte(),
        level:     level.clamp(i8::MIN.into(), i8::MAX.into()) as i8,
        flags:     0,
        comp_size: to_u32(payload.len())?,
        orig_size: to_u32(data.len())?,
        checksum:  crc32(&payload),
    };
    Ok((header, payload))
}

pub fn decode_block(header: &BlockHeader, payload: &[u8], offset: u64) -> Result<Vec<u8>, BundleError> {
    if crc32(payload) != header.checksum {
        return Err(BundleError::Checksum(offset));
    }
    let data = get_codec_by_byte(header.codec)?.decompress(payload)?;
    if data.len() != header.orig_size as usize {
        return Err(BundleError::SizeMismatch {
            offset,
            declared: header.orig_size,
            actual:   data.len(),
        });
    }
    Ok(data)
}

/// Read and decode the block starting at `offset` in `data`.
pub fn read_block(data: &[u8], offset: u64) -> Result<Vec<u8>, BundleError> {
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(offset))?;
    let header = BlockHeader::read(&mut cursor, offset)?;
    let mut payload = vec![0u8; header.comp_size as usize];
    cursor.read_exact(&mut payload)?;
    decode_block(&header, &payload, offset)
}

// ── Index ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub name:            String,
    pub offset:          u64,
    pub original_size:   u64,
    pub compressed_size: u64,
    pub codec:           String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BundleIndex {
    /// RFC 3339 time the bundle was written.
    #[serde(default)]
    pub created: String,
    pub records: Vec<IndexRecord>,
}

impl BundleIndex {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn find(&self, name: &str) -> Option<&IndexRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

// ── Whole-archive read / write ───────────────────────────────────────────────

/// Parse the superblock and the index of an in-memory bundle.
pub fn read_index(data: &[u8]) -> Result<BundleIndex, BundleError> {
    let sb = Superblock::read(data)?;
    let raw = read_block(data, sb.index_offset)?;
    let index = BundleIndex::from_bytes(&raw)?;
    if index.records.len() != sb.member_count as usize {
        return Err(BundleError::CountMismatch {
            declared: sb.member_count,
            actual:   index.records.len(),
        });
    }
    Ok(index)
}

/// Serialise `entries`, in order, as a complete bundle.
pub fn write_bundle(
    entries: &[(String, Vec<u8>)],
    options: &BundleOptions,
) -> Result<Vec<u8>, BundleError> {
    let mut out = Cursor::new(Vec::new());
    out.write_all(&[0u8; SUPERBLOCK_SIZE])?; // patched below

    let mut index = BundleIndex {
        created: Utc::now().to_rfc3339(),
        records: Vec::with_capacity(entries.len()),
    };
    for (name, data) in entries {
        let (header, payload) = encode_block(data, options.codec, options.level)?;
        let offset = out.stream_position()?;
        header.write(&mut out)?;
        out.write_all(&payload)?;
        index.records.push(IndexRecord {
            name:            name.clone(),
            offset,
            original_size:   data.len() as u64,
            compressed_size: payload.len() as u64,
            codec:           options.codec.name().to_owned(),
        });
    }

    let (idx_header, idx_payload) = encode_block(&index.to_bytes()?, CodecId::Zstd, DEFAULT_LEVEL)?;
    let index_offset = out.stream_position()?;
    idx_header.write(&mut out)?;
    out.write_all(&idx_payload)?;

    let sb = Superblock {
        member_count: to_u32(entries.len())?,
        index_offset,
        index_size: (BLOCK_HEADER_SIZE + idx_payload.len()) as u64,
    };
    out.seek(SeekFrom::Start(0))?;
    sb.write(&mut out)?;
    Ok(out.into_inner())
}
