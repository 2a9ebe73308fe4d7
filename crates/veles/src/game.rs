//! `GameData`: one handle over an archive directory and a specification
//! registry.

use std::path::Path;
use std::sync::Arc;

use veles_bundle::{normalize_path, ChunkStore, Vfs};
use veles_dat::{
    decode, select_specification, DatFile, ForeignKey, Record, RowError, RowLayout, SpecRegistry,
};

use crate::{Error, Result};

/// Reserved id for the volume holding the serialized bundle index.
pub const INDEX_VOLUME_ID: u32 = u32::MAX;

/// An opened game archive: volumes, bootstrapped index, and the
/// specification registry for one game version.
///
/// All reads route through the shared [`ChunkStore`], so repeated decodes
/// of hot files hit the chunk cache. The handle is immutable after `open`
/// and safe to share across threads behind an `Arc`.
pub struct GameData {
    vfs: Vfs,
    registry: SpecRegistry,
    version: String,
}

impl GameData {
    /// Open an archive directory.
    ///
    /// Every `*.vol` file in `archive_root` is mapped as a volume:
    /// `index.vol` becomes the reserved index volume, any other volume
    /// takes its id from its numeric file stem (`0000.vol` is volume 0).
    /// The bundle index is then bootstrapped out of the index volume.
    pub fn open(
        archive_root: impl AsRef<Path>,
        version_tag: impl Into<String>,
        registry: SpecRegistry,
    ) -> Result<Self> {
        let store = Arc::new(ChunkStore::new());

        for entry in std::fs::read_dir(archive_root.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("vol") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let volume_id = if stem.eq_ignore_ascii_case("index") {
                INDEX_VOLUME_ID
            } else {
                stem.parse::<u32>()
                    .map_err(|_| Error::InvalidVolumeName(stem.to_string()))?
            };
            store.open_volume(volume_id, &path)?;
        }

        Self::from_store(store, INDEX_VOLUME_ID, version_tag, registry)
    }

    /// Build a handle over an already-populated store (in-memory archives,
    /// tests, tooling that packs volumes itself).
    pub fn from_store(
        store: Arc<ChunkStore>,
        index_volume_id: u32,
        version_tag: impl Into<String>,
        registry: SpecRegistry,
    ) -> Result<Self> {
        let vfs = Vfs::open(store, index_volume_id)?;
        Ok(Self {
            vfs,
            registry,
            version: version_tag.into(),
        })
    }

    /// The game version tag this handle decodes against.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The underlying virtual file system.
    #[inline]
    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// The specification registry.
    #[inline]
    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    /// Read a complete file by logical path.
    pub fn read(&self, logical_path: &str) -> Result<Vec<u8>> {
        Ok(self.vfs.read(logical_path)?)
    }

    /// Read and decode a record file by logical path.
    ///
    /// Looks up the file's specification candidates for this handle's
    /// version, reconciles them against the file's declared row width and
    /// decodes every row. Row-scoped heap errors are kept per row inside
    /// the returned view; archive-structural and specification errors fail
    /// the whole call.
    pub fn dat(&self, logical_path: &str) -> Result<DatView> {
        let name = normalize_path(logical_path);
        let raw = self.vfs.read(&name)?;
        let file = DatFile::parse(&raw)?;

        let candidates = self.registry.candidates(&self.version, &name);
        if candidates.is_empty() {
            return Err(veles_dat::Error::UnknownFile {
                version: self.version.clone(),
                file: name,
            }
            .into());
        }
        let layout = select_specification(candidates, file.row_width())?;

        let rows = decode(&file, &layout).collect();
        Ok(DatView { path: name, layout, rows })
    }

    /// Resolve a lazy foreign key to its target record (one hop).
    ///
    /// Reads and decodes the target file, so resolution cost is bounded by
    /// the chunk cache; callers chasing many keys into the same file should
    /// call [`dat`](Self::dat) once and index the view instead.
    pub fn resolve(&self, key: &ForeignKey) -> Result<Record> {
        let view = self.dat(&key.file)?;
        view.record(key.row).cloned()
    }
}

impl std::fmt::Debug for GameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameData")
            .field("version", &self.version)
            .field("files", &self.vfs.index().len())
            .finish()
    }
}

/// A decoded record file: matched layout plus per-row results.
#[derive(Debug, Clone)]
pub struct DatView {
    path: String,
    layout: RowLayout,
    rows: Vec<std::result::Result<Record, RowError>>,
}

impl DatView {
    /// Normalized logical path the view was decoded from.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The reconciled layout the rows were decoded with.
    #[inline]
    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Number of rows, counting rows that failed to decode.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per-row results in row order.
    pub fn rows(&self) -> impl Iterator<Item = &std::result::Result<Record, RowError>> {
        self.rows.iter()
    }

    /// Successfully decoded records with their row indices.
    pub fn records(&self) -> impl Iterator<Item = (u32, &Record)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.as_ref().ok().map(|record| (i as u32, record)))
    }

    /// A single row's record.
    pub fn record(&self, row: u64) -> Result<&Record> {
        let index = usize::try_from(row)
            .ok()
            .filter(|&i| i < self.rows.len())
            .ok_or(Error::RowOutOfRange {
                row,
                rows: self.rows.len(),
            })?;
        self.rows[index]
            .as_ref()
            .map_err(|err| Error::Row(err.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veles_bundle::{Codec, IndexBuilder, Volume, VolumeBuilder};
    use veles_dat::{match_specification, DatWriter, Value};

    const SPEC_DOC: &str = r#"{
        "version": "3.1.0", "generation": 1, "ref_width": 32,
        "files": {
            "data/items.dat": { "fields": [
                { "name": "Id", "type": "string" },
                { "name": "Class", "type": "foreign_key",
                  "key": { "file": "data/classes.dat", "field": "Name" } }
            ] },
            "data/classes.dat": { "fields": [
                { "name": "Name", "type": "string" },
                { "name": "Hands", "type": "u32" }
            ] }
        }
    }"#;

    fn registry() -> SpecRegistry {
        let mut registry = SpecRegistry::new();
        registry.insert_json(SPEC_DOC).unwrap();
        registry
    }

    fn encode_dat(registry: &SpecRegistry, file: &str, records: &[Record]) -> Vec<u8> {
        let spec = registry.specification_for("3.1.0", file).unwrap();
        let layout = match_specification(spec, spec.row_width).unwrap();
        let mut writer = DatWriter::new(&layout);
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.finish()
    }

    /// Pack files into one data volume (id 0) plus an index volume.
    fn build_store(files: &[(&str, Vec<u8>)]) -> Arc<ChunkStore> {
        let mut data = Vec::new();
        let mut index = IndexBuilder::new();
        for (path, contents) in files {
            index.add(path, 0, data.len() as u64, contents.len() as u64);
            data.extend_from_slice(contents);
        }

        let mut data_builder = VolumeBuilder::new(Codec::Zstd, 128);
        data_builder.write(&data);
        let mut index_builder = VolumeBuilder::new(Codec::Zstd, 128);
        index_builder.write(&index.finish());

        let store = Arc::new(ChunkStore::new());
        store.add_volume(0, Volume::from_vec(data_builder.finish().unwrap()).unwrap());
        store.add_volume(
            INDEX_VOLUME_ID,
            Volume::from_vec(index_builder.finish().unwrap()).unwrap(),
        );
        store
    }

    fn sample_game() -> GameData {
        let registry = registry();

        let classes = encode_dat(
            &registry,
            "data/classes.dat",
            &[
                Record::new(
                    vec![
                        ("Name".into(), Value::String("Sword".into())),
                        ("Hands".into(), Value::U32(1)),
                    ],
                    Vec::new(),
                ),
                Record::new(
                    vec![
                        ("Name".into(), Value::String("Staff".into())),
                        ("Hands".into(), Value::U32(2)),
                    ],
                    Vec::new(),
                ),
            ],
        );
        let items = encode_dat(
            &registry,
            "data/items.dat",
            &[
                Record::new(
                    vec![
                        ("Id".into(), Value::String("RustedBlade".into())),
                        (
                            "Class".into(),
                            Value::ForeignKey(ForeignKey {
                                file: "data/classes.dat".into(),
                                row: 0,
                            }),
                        ),
                    ],
                    Vec::new(),
                ),
                Record::new(
                    vec![
                        ("Id".into(), Value::String("OakStaff".into())),
                        (
                            "Class".into(),
                            Value::ForeignKey(ForeignKey {
                                file: "data/classes.dat".into(),
                                row: 1,
                            }),
                        ),
                    ],
                    Vec::new(),
                ),
            ],
        );

        let store = build_store(&[
            ("data/classes.dat", classes),
            ("data/items.dat", items),
            ("data/readme.txt", b"hello".to_vec()),
        ]);
        GameData::from_store(store, INDEX_VOLUME_ID, "3.1.0", registry).unwrap()
    }

    #[test]
    fn test_end_to_end_decode_and_resolve() {
        let game = sample_game();

        assert_eq!(game.read("Data\\README.TXT").unwrap(), b"hello");

        let items = game.dat("data/items.dat").unwrap();
        assert_eq!(items.len(), 2);

        let (_, first) = items.records().next().unwrap();
        assert_eq!(first.get("Id"), Some(&Value::String("RustedBlade".into())));

        let class_key = first.get("Class").unwrap().as_foreign_key().unwrap();
        let class = game.resolve(class_key).unwrap();
        assert_eq!(class.get("Name"), Some(&Value::String("Sword".into())));
        assert_eq!(class.get("Hands"), Some(&Value::U32(1)));
    }

    #[test]
    fn test_unknown_dat_file() {
        let game = sample_game();
        // Present in the archive, absent from the registry.
        let err = game.dat("data/readme.txt").unwrap_err();
        assert!(matches!(
            err,
            Error::Dat(veles_dat::Error::UnknownFile { .. })
        ));
    }

    #[test]
    fn test_row_out_of_range() {
        let game = sample_game();
        let view = game.dat("data/classes.dat").unwrap();
        assert!(matches!(
            view.record(99),
            Err(Error::RowOutOfRange { row: 99, rows: 2 })
        ));
    }

    #[test]
    fn test_open_from_directory() {
        let registry = registry();
        let classes = encode_dat(
            &registry,
            "data/classes.dat",
            &[Record::new(
                vec![
                    ("Name".into(), Value::String("Bow".into())),
                    ("Hands".into(), Value::U32(2)),
                ],
                Vec::new(),
            )],
        );

        let mut index = IndexBuilder::new();
        index.add("data/classes.dat", 0, 0, classes.len() as u64);

        let mut data_builder = VolumeBuilder::new(Codec::Deflate, 64);
        data_builder.write(&classes);
        let mut index_builder = VolumeBuilder::new(Codec::Deflate, 64);
        index_builder.write(&index.finish());

        let dir = std::env::temp_dir().join(format!("veles-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("0000.vol"), data_builder.finish().unwrap()).unwrap();
        std::fs::write(dir.join("index.vol"), index_builder.finish().unwrap()).unwrap();

        let game = GameData::open(&dir, "3.1.0", registry).unwrap();
        let view = game.dat("data/classes.dat").unwrap();
        assert_eq!(
            view.record(0).unwrap().get("Name"),
            Some(&Value::String("Bow".into()))
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
