//! CRC32C hashing utilities.
//!
//! CRC32C (Castagnoli) is the checksum stored alongside every compressed
//! chunk in an archive volume. It is computed over the decompressed bytes.

/// Compute CRC32C hash of a byte slice.
///
/// Uses hardware acceleration when available (SSE4.2 on x86).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Compute CRC32C hash of a byte slice with a seed value.
///
/// This continues a previous CRC computation.
#[inline]
pub fn hash_bytes_with_seed(data: &[u8], seed: u32) -> u32 {
    crc32c::crc32c_append(seed, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hash() {
        assert_eq!(hash_bytes(&[]), 0);
    }

    #[test]
    fn test_append_matches_whole() {
        let data = b"chunked checksum input";
        let whole = hash_bytes(data);
        let split = hash_bytes_with_seed(&data[8..], hash_bytes(&data[..8]));
        assert_eq!(whole, split);
    }
}
