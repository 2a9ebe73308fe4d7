//! Builders for archive volumes and index blobs.
//!
//! The readers in this crate only ever consume published archives, but the
//! same format has to be producible for fixtures and repack tooling, so
//! the writers live next to the readers and share their layout structs.

use veles_common::{crc, IntoBytes};

use crate::volume::{ChunkDesc, VolumeHeader};
use crate::{Codec, FileLocation, Result, VOLUME_MAGIC};

/// Accumulates bytes and packs them into the volume format.
pub struct VolumeBuilder {
    codec: Codec,
    chunk_size: u32,
    data: Vec<u8>,
}

impl VolumeBuilder {
    /// Create a builder for the given codec and uncompressed chunk size.
    pub fn new(codec: Codec, chunk_size: u32) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            codec,
            chunk_size,
            data: Vec::new(),
        }
    }

    /// Append bytes to the volume's uncompressed contents.
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Total uncompressed bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Chunk, compress and checksum the contents into a volume file image.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut descs = Vec::new();
        let mut payload = Vec::new();

        for chunk in self.data.chunks(self.chunk_size as usize) {
            let compressed = match self.codec {
                Codec::Store => chunk.to_vec(),
                Codec::Zstd => crate::decompress::compress_zstd(chunk)?,
                Codec::Deflate => crate::decompress::compress_deflate(chunk)?,
            };

            descs.push(ChunkDesc {
                compressed_size: compressed.len() as u32,
                crc32c: crc::hash_bytes(chunk),
            });
            payload.extend_from_slice(&compressed);
        }

        let header = VolumeHeader {
            codec: self.codec as u32,
            chunk_size: self.chunk_size,
            chunk_count: descs.len() as u32,
            reserved: 0,
            uncompressed_size: self.data.len() as u64,
        };

        let mut out = Vec::with_capacity(
            VOLUME_MAGIC.len()
                + std::mem::size_of::<VolumeHeader>()
                + descs.len() * std::mem::size_of::<ChunkDesc>()
                + payload.len(),
        );
        out.extend_from_slice(VOLUME_MAGIC);
        out.extend_from_slice(header.as_bytes());
        for desc in &descs {
            out.extend_from_slice(desc.as_bytes());
        }
        out.extend_from_slice(&payload);

        Ok(out)
    }
}

/// Serializes path/location triples into an index blob.
#[derive(Default)]
pub struct IndexBuilder {
    entries: Vec<(String, FileLocation)>,
}

impl IndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file entry. The path is stored as given; readers normalize
    /// on both insertion and lookup.
    pub fn add(&mut self, path: &str, bundle_id: u32, offset: u64, size: u64) {
        self.entries.push((
            path.to_string(),
            FileLocation {
                bundle_id,
                offset,
                size,
            },
        ));
    }

    /// Serialize the index blob.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (path, location) in &self.entries {
            out.extend_from_slice(&(path.len() as u32).to_le_bytes());
            out.extend_from_slice(path.as_bytes());
            out.extend_from_slice(&location.bundle_id.to_le_bytes());
            out.extend_from_slice(&location.offset.to_le_bytes());
            out.extend_from_slice(&location.size.to_le_bytes());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BundleIndex, Volume};

    #[test]
    fn test_volume_roundtrip_all_codecs() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 256) as u8).collect();

        for codec in [Codec::Store, Codec::Zstd, Codec::Deflate] {
            let mut builder = VolumeBuilder::new(codec, 512);
            builder.write(&payload);
            let volume = Volume::from_vec(builder.finish().unwrap()).unwrap();

            let mut reassembled = Vec::new();
            for i in 0..volume.chunk_count() {
                reassembled.extend_from_slice(&volume.decompress_chunk(0, i).unwrap());
            }
            assert_eq!(reassembled, payload, "codec {:?}", codec);
        }
    }

    #[test]
    fn test_empty_volume() {
        let builder = VolumeBuilder::new(Codec::Zstd, 256);
        let volume = Volume::from_vec(builder.finish().unwrap()).unwrap();

        assert_eq!(volume.chunk_count(), 0);
        assert_eq!(volume.uncompressed_size(), 0);
    }

    #[test]
    fn test_index_roundtrip() {
        let mut builder = IndexBuilder::new();
        builder.add("Data/One.dat", 1, 0, 10);
        builder.add("Data/Two.dat", 2, 10, 20);

        let index = BundleIndex::parse(&builder.finish()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve("data/two.dat").unwrap().offset, 10);
    }
}
