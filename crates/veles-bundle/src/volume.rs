//! Archive volume parsing and per-chunk decompression.
//!
//! A volume is an append-only file holding a header, a chunk table and a
//! payload of independently compressed chunks. Every chunk decompresses to
//! exactly `chunk_size` bytes except the last, which holds the remainder.
//! The chunk table stores a CRC32C of each chunk's *decompressed* bytes so
//! corruption is caught after decompression, not before.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use veles_common::{crc, BinaryReader, FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::decompress;
use crate::{Error, Result};

/// Magic bytes at the start of every archive volume.
pub const VOLUME_MAGIC: &[u8; 4] = b"VOLB";

/// Chunk compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Codec {
    /// Chunks are stored uncompressed.
    Store = 0,
    /// Zstandard.
    Zstd = 1,
    /// Raw DEFLATE.
    Deflate = 2,
}

impl TryFrom<u32> for Codec {
    type Error = u32;

    fn try_from(value: u32) -> std::result::Result<Self, u32> {
        match value {
            0 => Ok(Self::Store),
            1 => Ok(Self::Zstd),
            2 => Ok(Self::Deflate),
            other => Err(other),
        }
    }
}

/// Fixed volume header, directly after the magic bytes.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub(crate) struct VolumeHeader {
    pub codec: u32,
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub reserved: u32,
    pub uncompressed_size: u64,
}

/// One chunk table entry: compressed extent plus integrity checksum.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub(crate) struct ChunkDesc {
    pub compressed_size: u32,
    pub crc32c: u32,
}

/// Resolved location of one compressed chunk within the payload.
#[derive(Debug, Clone, Copy)]
struct ChunkLoc {
    /// Absolute byte offset of the compressed chunk in the volume file.
    offset: usize,
    compressed_size: u32,
    crc32c: u32,
}

enum VolumeData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl VolumeData {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(vec) => vec,
        }
    }
}

/// A parsed archive volume.
///
/// Parsing only reads the header and chunk table; chunk payloads are
/// decompressed on demand via [`Volume::decompress_chunk`]. Volumes are
/// immutable once published for a game version, so nothing here is ever
/// re-read or invalidated.
pub struct Volume {
    data: VolumeData,
    codec: Codec,
    chunk_size: u32,
    uncompressed_size: u64,
    chunks: Vec<ChunkLoc>,
}

impl Volume {
    /// Open a volume file (memory-mapped).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(VolumeData::Mapped(mmap))
    }

    /// Parse a volume from an owned byte buffer.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::parse(VolumeData::Owned(data))
    }

    fn parse(data: VolumeData) -> Result<Self> {
        let bytes = data.bytes();
        let mut reader = BinaryReader::new(bytes);

        reader.expect_magic(VOLUME_MAGIC)?;
        let header: VolumeHeader = reader.read_struct()?;

        let codec = Codec::try_from(header.codec).map_err(Error::UnsupportedCodec)?;

        if header.chunk_size == 0 {
            return Err(Error::InvalidVolume("chunk size is zero".into()));
        }

        let expected_chunks = header
            .uncompressed_size
            .div_ceil(header.chunk_size as u64);
        if expected_chunks != header.chunk_count as u64 {
            return Err(Error::InvalidVolume(format!(
                "chunk count {} does not cover {} bytes at chunk size {}",
                header.chunk_count, header.uncompressed_size, header.chunk_size
            )));
        }

        let mut chunks = Vec::with_capacity(header.chunk_count as usize);
        let mut payload_offset = std::mem::size_of::<VolumeHeader>()
            + VOLUME_MAGIC.len()
            + header.chunk_count as usize * std::mem::size_of::<ChunkDesc>();

        for _ in 0..header.chunk_count {
            let desc: ChunkDesc = reader.read_struct()?;
            chunks.push(ChunkLoc {
                offset: payload_offset,
                compressed_size: desc.compressed_size,
                crc32c: desc.crc32c,
            });
            payload_offset += desc.compressed_size as usize;
        }

        if payload_offset > bytes.len() {
            return Err(Error::InvalidVolume(format!(
                "chunk table spans {} bytes but volume holds {}",
                payload_offset,
                bytes.len()
            )));
        }

        Ok(Self {
            data,
            codec,
            chunk_size: header.chunk_size,
            uncompressed_size: header.uncompressed_size,
            chunks,
        })
    }

    /// Maximum decompressed size of one chunk.
    #[inline]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks in this volume.
    #[inline]
    pub fn chunk_count(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Total decompressed size of the volume.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Chunk codec.
    #[inline]
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Decompressed size of a specific chunk.
    ///
    /// All chunks are `chunk_size` long except the last, which holds the
    /// remainder of `uncompressed_size`.
    pub fn chunk_decompressed_size(&self, index: u32) -> usize {
        if index as usize + 1 == self.chunks.len() {
            let rem = self.uncompressed_size % self.chunk_size as u64;
            if rem == 0 {
                self.chunk_size as usize
            } else {
                rem as usize
            }
        } else {
            self.chunk_size as usize
        }
    }

    /// Decompress and verify one chunk.
    ///
    /// `volume_id` is only used to tag errors; the volume itself does not
    /// know its id within a [`crate::ChunkStore`].
    pub fn decompress_chunk(&self, volume_id: u32, index: u32) -> Result<Vec<u8>> {
        let loc = self
            .chunks
            .get(index as usize)
            .ok_or(Error::ChunkOutOfRange {
                volume: volume_id,
                chunk: index,
                count: self.chunks.len() as u32,
            })?;

        let bytes = self.data.bytes();
        let end = loc.offset + loc.compressed_size as usize;
        if end > bytes.len() {
            return Err(Error::InvalidVolume(format!(
                "chunk {} payload out of bounds",
                index
            )));
        }
        let compressed = &bytes[loc.offset..end];

        let expected_size = self.chunk_decompressed_size(index);
        let decompressed = match self.codec {
            Codec::Store => compressed.to_vec(),
            Codec::Zstd => decompress::decompress_zstd_sized(compressed, expected_size)?,
            Codec::Deflate => decompress::decompress_deflate_sized(compressed, expected_size)?,
        };

        if decompressed.len() != expected_size {
            return Err(Error::CorruptChunk {
                volume: volume_id,
                chunk: index,
                reason: format!(
                    "decompressed to {} bytes, expected {}",
                    decompressed.len(),
                    expected_size
                ),
            });
        }

        let actual_crc = crc::hash_bytes(&decompressed);
        if actual_crc != loc.crc32c {
            return Err(Error::CorruptChunk {
                volume: volume_id,
                chunk: index,
                reason: format!("crc32c mismatch: stored {:#010x}, computed {:#010x}", loc.crc32c, actual_crc),
            });
        }

        Ok(decompressed)
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("codec", &self.codec)
            .field("chunk_size", &self.chunk_size)
            .field("chunks", &self.chunks.len())
            .field("uncompressed_size", &self.uncompressed_size)
            .finish()
    }
}
