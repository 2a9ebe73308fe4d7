//! Error types for the bundle crate.

use thiserror::Error;

/// Errors that can occur when working with archive volumes and the VFS.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// Volume header or chunk table could not be parsed.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    /// Unknown codec id in a volume header.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(u32),

    /// No volume registered under the given id.
    #[error("volume not found: {0}")]
    VolumeNotFound(u32),

    /// Chunk index past the end of a volume's chunk table.
    #[error("chunk {chunk} out of range for volume {volume} ({count} chunks)")]
    ChunkOutOfRange { volume: u32, chunk: u32, count: u32 },

    /// Chunk failed checksum or size verification after decompression.
    #[error("corrupt chunk {chunk} in volume {volume}: {reason}")]
    CorruptChunk {
        volume: u32,
        chunk: u32,
        reason: String,
    },

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Compression error.
    #[error("compression error: {0}")]
    Compression(String),

    /// Logical path missing from the bundle index.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A required chunk held fewer bytes than the file span needs.
    #[error("truncated read in volume {volume}, chunk {chunk}: needed {needed} bytes, chunk holds {available}")]
    TruncatedRead {
        volume: u32,
        chunk: u32,
        needed: usize,
        available: usize,
    },

    /// Bundle index blob could not be parsed.
    #[error("invalid index: {0}")]
    InvalidIndex(String),
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, Error>;
