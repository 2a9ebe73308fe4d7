//! Bundle index: logical path to file-location lookup.
//!
//! The index blob is a length-prefixed sequence of path/location triples.
//! It is itself stored through the chunk mechanism (inside a reserved
//! index volume), so it must be read through the store before any general
//! path becomes resolvable. One index is built per game version and is
//! immutable thereafter; a new version means a new index.

use hashbrown::HashMap;
use rustc_hash::FxHasher;
use veles_common::BinaryReader;

use crate::{Error, Result};

type FxHashMap<K, V> = HashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Location of one logical file within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    /// Id of the bundle (volume) holding the file's bytes.
    pub bundle_id: u32,
    /// Byte offset within the bundle's decompressed contents.
    pub offset: u64,
    /// File size in bytes.
    pub size: u64,
}

/// Normalize a logical path for case-insensitive lookup.
///
/// Backslashes become forward slashes, leading separators are stripped and
/// the result is ASCII-lowercased. Both insertion and lookup go through
/// this, so any spelling of a path resolves to the same entry.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    normalized.make_ascii_lowercase();
    normalized.trim_start_matches('/').to_string()
}

/// Case-insensitive map from logical paths to file locations.
pub struct BundleIndex {
    entries: FxHashMap<String, FileLocation>,
}

impl BundleIndex {
    /// Parse an index blob.
    ///
    /// Layout: `u32` entry count, then per entry a u32-length-prefixed
    /// UTF-8 path followed by `{ bundle_id: u32, offset: u64, size: u64 }`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let count = reader
            .read_u32()
            .map_err(|_| Error::InvalidIndex("missing entry count".into()))?;

        let mut entries = FxHashMap::default();
        entries.reserve(count as usize);

        for i in 0..count {
            let path = reader
                .read_prefixed_str()
                .map_err(|e| Error::InvalidIndex(format!("entry {}: {}", i, e)))?;
            let bundle_id = reader.read_u32()?;
            let offset = reader.read_u64()?;
            let size = reader.read_u64()?;

            entries.insert(
                normalize_path(path),
                FileLocation {
                    bundle_id,
                    offset,
                    size,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Resolve a logical path to its location.
    pub fn resolve(&self, logical_path: &str) -> Result<&FileLocation> {
        self.entries
            .get(&normalize_path(logical_path))
            .ok_or_else(|| Error::PathNotFound(logical_path.to_string()))
    }

    /// Whether the index contains a path.
    pub fn contains(&self, logical_path: &str) -> bool {
        self.entries.contains_key(&normalize_path(logical_path))
    }

    /// Number of indexed files.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over normalized paths and their locations.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileLocation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for BundleIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleIndex")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::IndexBuilder;

    fn sample_index() -> BundleIndex {
        let mut builder = IndexBuilder::new();
        builder.add("Data/BaseItemTypes.dat", 1, 0, 100);
        builder.add("Metadata\\Items\\Rings\\ring1.it", 2, 512, 64);
        BundleIndex::parse(&builder.finish()).unwrap()
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let index = sample_index();

        let loc = index.resolve("data/baseitemtypes.dat").unwrap();
        assert_eq!(loc.bundle_id, 1);
        assert_eq!(loc.size, 100);

        // Any separator and case spelling resolves the same entry.
        assert!(index.contains("DATA\\BASEITEMTYPES.DAT"));
        assert!(index.contains("/Data/BaseItemTypes.dat"));
    }

    #[test]
    fn test_backslash_normalized() {
        let index = sample_index();
        let loc = index.resolve("metadata/items/rings/ring1.it").unwrap();
        assert_eq!(loc.bundle_id, 2);
        assert_eq!(loc.offset, 512);
    }

    #[test]
    fn test_path_not_found() {
        let index = sample_index();
        assert!(matches!(
            index.resolve("data/missing.dat"),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn test_empty_blob_rejected() {
        assert!(matches!(
            BundleIndex::parse(&[]),
            Err(Error::InvalidIndex(_))
        ));
    }
}
