//! Decompression utilities for archive volume chunks.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::{Error, Result};

/// Decompress Zstandard-compressed data with known output size.
pub fn decompress_zstd_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(data).map_err(|e| Error::Decompression(e.to_string()))?;

    let mut output = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(output)
}

/// Decompress DEFLATE-compressed data with known output size.
pub fn decompress_deflate_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);

    let mut output = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;

    Ok(output)
}

/// Compress data with Zstandard.
pub fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3).map_err(|e| Error::Compression(e.to_string()))
}

/// Compress data with DEFLATE.
pub fn compress_deflate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let original = b"Hello, World! This is a test of Zstandard compression.";

        let compressed = compress_zstd(original).unwrap();
        let decompressed = decompress_zstd_sized(&compressed, original.len()).unwrap();

        assert_eq!(decompressed, original);
    }

    #[test]
    fn test_deflate_roundtrip() {
        let original = b"Hello, World! This is a test of DEFLATE compression.";

        let compressed = compress_deflate(original).unwrap();
        let decompressed = decompress_deflate_sized(&compressed, original.len()).unwrap();

        assert_eq!(decompressed, original);
    }
}
