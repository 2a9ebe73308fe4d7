//! Virtual file system: whole-file reads over the index and chunk store.

use std::sync::Arc;

use crate::{BundleIndex, ChunkStore, Error, Result};

/// Path-based reads over a [`BundleIndex`] and [`ChunkStore`].
///
/// A read resolves the path, computes the chunk span the byte range
/// `[offset, offset + size)` covers within the target bundle's volume,
/// fetches every chunk and copies the relevant subranges out in order.
/// There is no partial or streaming mode - decoding always wants a
/// complete file.
///
/// The VFS itself is stateless per call and safe to share across threads.
pub struct Vfs {
    store: Arc<ChunkStore>,
    index: BundleIndex,
}

impl Vfs {
    /// Build a VFS from an already-parsed index.
    pub fn new(store: Arc<ChunkStore>, index: BundleIndex) -> Self {
        Self { store, index }
    }

    /// Bootstrap a VFS by reading the index out of a reserved volume.
    ///
    /// The index is stored through the same chunk mechanism as everything
    /// else, so it is the one read that cannot go through path resolution.
    pub fn open(store: Arc<ChunkStore>, index_volume_id: u32) -> Result<Self> {
        let index_bytes = Self::read_whole_volume(&store, index_volume_id)?;
        let index = BundleIndex::parse(&index_bytes)?;
        Ok(Self::new(store, index))
    }

    /// The underlying index.
    #[inline]
    pub fn index(&self) -> &BundleIndex {
        &self.index
    }

    /// The underlying chunk store.
    #[inline]
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Read a complete file's bytes by logical path.
    pub fn read(&self, logical_path: &str) -> Result<Vec<u8>> {
        let location = *self.index.resolve(logical_path)?;

        if location.size == 0 {
            return Ok(Vec::new());
        }

        let volume = self.store.volume(location.bundle_id)?;
        let chunk_size = volume.chunk_size() as u64;

        let first_chunk = (location.offset / chunk_size) as u32;
        let last_chunk = ((location.offset + location.size - 1) / chunk_size) as u32;

        let mut out = Vec::with_capacity(location.size as usize);

        for chunk_index in first_chunk..=last_chunk {
            let chunk = self.store.fetch(location.bundle_id, chunk_index)?;

            let chunk_start = chunk_index as u64 * chunk_size;
            let copy_from = location.offset.max(chunk_start) - chunk_start;
            let copy_to = (location.offset + location.size - chunk_start).min(chunk_size);

            if copy_to as usize > chunk.len() {
                return Err(Error::TruncatedRead {
                    volume: location.bundle_id,
                    chunk: chunk_index,
                    needed: copy_to as usize,
                    available: chunk.len(),
                });
            }

            out.extend_from_slice(&chunk[copy_from as usize..copy_to as usize]);
        }

        Ok(out)
    }

    fn read_whole_volume(store: &ChunkStore, volume_id: u32) -> Result<Vec<u8>> {
        let volume = store.volume(volume_id)?;
        let mut out = Vec::with_capacity(volume.uncompressed_size() as usize);

        for chunk_index in 0..volume.chunk_count() {
            let chunk = store.fetch(volume_id, chunk_index)?;
            out.extend_from_slice(&chunk);
        }

        Ok(out)
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("files", &self.index.len())
            .finish()
    }
}
