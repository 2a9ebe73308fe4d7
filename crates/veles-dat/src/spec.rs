//! Specification documents and the per-version registry.
//!
//! Specifications arrive as JSON documents produced by an external schema
//! generation process, one or more per game version. A document maps file
//! names to ordered field lists; the registry compiles them into resolved
//! row layouts and keeps every candidate per `(version, file)` pair,
//! newest generation first.
//!
//! The registry is an explicitly constructed value with a fixed lifecycle:
//! built once for the selected game version set, immutable thereafter, and
//! passed by reference into decoding. There is no ambient global table.

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use rustc_hash::FxHasher;
use serde::Deserialize;

use crate::{Error, Result};

type FxHashMap<K, V> = HashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Semantic type of one field in a fixed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Null-terminated UTF-16 string in the heap, addressed by an in-row
    /// offset.
    String,
    /// Row index into another record file.
    ForeignKey,
}

impl FieldKind {
    /// In-row width of a scalar of this kind, in bytes.
    ///
    /// `String` and `ForeignKey` have no fixed width of their own; their
    /// in-row representation is a reference whose width is the format
    /// generation's [`RefWidth`].
    pub fn scalar_width(self, ref_width: RefWidth) -> u32 {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::String | Self::ForeignKey => ref_width.byte_len(),
        }
    }
}

/// Width of heap offsets, list counts and foreign-key row indices.
///
/// Older format generations store these as 32-bit values, newer ones as
/// 64-bit. One width applies to a whole version's schema set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefWidth {
    U32,
    U64,
}

impl RefWidth {
    /// Byte width of one reference.
    #[inline]
    pub fn byte_len(self) -> u32 {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// The reserved "no value" sentinel: all bits set.
    #[inline]
    pub fn sentinel(self) -> u64 {
        match self {
            Self::U32 => u32::MAX as u64,
            Self::U64 => u64::MAX,
        }
    }
}

/// Foreign-key target named by a specification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    /// Normalized target file name.
    pub file: Arc<str>,
    /// Key field within the target file, if the schema names one.
    pub field: Option<Arc<str>>,
}

/// One resolved field of a row layout.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Arc<str>,
    pub kind: FieldKind,
    /// List fields store `count` then `offset` as two consecutive in-row
    /// references; elements of `kind` live in the heap.
    pub is_list: bool,
    /// Resolved byte offset within the fixed row.
    pub offset: u32,
    /// Present only for `ForeignKey` fields.
    pub foreign_key: Option<ForeignKeyTarget>,
}

impl FieldSpec {
    /// In-row width of this field.
    pub fn width(&self, ref_width: RefWidth) -> u32 {
        if self.is_list {
            // count + offset
            2 * ref_width.byte_len()
        } else {
            self.kind.scalar_width(ref_width)
        }
    }
}

/// Compiled specification for one record file in one schema document.
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// Normalized (lowercase) file name.
    pub file_name: String,
    /// Generation timestamp of the document this came from.
    pub generation: u64,
    /// Reference width of the document's format generation.
    pub ref_width: RefWidth,
    /// Fields in offset order.
    pub fields: Vec<FieldSpec>,
    /// Sum of field widths with explicit-offset gaps included.
    pub row_width: u32,
}

impl FileSpec {
    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == name)
    }
}

// --- document (serde) shapes -------------------------------------------

#[derive(Debug, Deserialize)]
struct FieldDoc {
    name: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    #[serde(default)]
    list: bool,
    /// Explicit byte offset override; otherwise cumulative.
    #[serde(default)]
    offset: Option<u32>,
    #[serde(default)]
    key: Option<KeyDoc>,
}

#[derive(Debug, Deserialize)]
struct KeyDoc {
    file: String,
    #[serde(default)]
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileDoc {
    fields: Vec<FieldDoc>,
}

/// One specification document, as deserialized from JSON.
#[derive(Debug, Deserialize)]
pub struct SpecDocument {
    /// Game version tag this document applies to.
    pub version: String,
    /// Generation timestamp (seconds); newer candidates win ties.
    pub generation: u64,
    /// Reference width in bits: 32 or 64.
    pub ref_width: u32,
    files: std::collections::BTreeMap<String, FileDoc>,
}

impl SpecDocument {
    /// Deserialize a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn normalize_file_name(name: &str) -> String {
    let mut normalized = name.replace('\\', "/");
    normalized.make_ascii_lowercase();
    normalized.trim_start_matches('/').to_string()
}

fn compile_file(
    file_name: &str,
    doc: &FileDoc,
    generation: u64,
    ref_width: RefWidth,
) -> Result<FileSpec> {
    let mut fields = Vec::with_capacity(doc.fields.len());
    let mut cursor = 0u32;

    for field in &doc.fields {
        if field.is_heap_string_list() {
            return Err(Error::InvalidDocument(format!(
                "{}: field {} is a list of strings; list elements must be fixed-width",
                file_name, field.name
            )));
        }
        if field.key.is_some() && field.kind != FieldKind::ForeignKey {
            return Err(Error::InvalidDocument(format!(
                "{}: field {} has a key target but is not a foreign_key",
                file_name, field.name
            )));
        }
        if field.kind == FieldKind::ForeignKey && field.key.is_none() {
            return Err(Error::InvalidDocument(format!(
                "{}: foreign_key field {} names no target",
                file_name, field.name
            )));
        }

        let offset = match field.offset {
            Some(explicit) => {
                if explicit < cursor {
                    return Err(Error::InvalidDocument(format!(
                        "{}: field {} offset {} overlaps preceding fields (cursor {})",
                        file_name, field.name, explicit, cursor
                    )));
                }
                explicit
            }
            None => cursor,
        };

        let spec = FieldSpec {
            name: Arc::from(field.name.as_str()),
            kind: field.kind,
            is_list: field.list,
            offset,
            foreign_key: field.key.as_ref().map(|key| ForeignKeyTarget {
                file: Arc::from(normalize_file_name(&key.file).as_str()),
                field: key.field.as_deref().map(Arc::from),
            }),
        };

        cursor = offset + spec.width(ref_width);
        fields.push(spec);
    }

    Ok(FileSpec {
        file_name: normalize_file_name(file_name),
        generation,
        ref_width,
        fields,
        row_width: cursor,
    })
}

impl FieldDoc {
    fn is_heap_string_list(&self) -> bool {
        self.list && self.kind == FieldKind::String
    }
}

// --- registry -----------------------------------------------------------

/// Per-version specification lookup.
///
/// Candidates for one `(version, file)` pair are kept sorted newest
/// generation first; [`SpecRegistry::specification_for`] returns the
/// newest and [`SpecRegistry::candidates`] exposes the rest for the
/// width-based matcher.
#[derive(Default)]
pub struct SpecRegistry {
    versions: FxHashMap<String, FxHashMap<String, Vec<Arc<FileSpec>>>>,
}

impl SpecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a document's files into the registry.
    pub fn insert_document(&mut self, doc: &SpecDocument) -> Result<()> {
        let ref_width = match doc.ref_width {
            32 => RefWidth::U32,
            64 => RefWidth::U64,
            other => {
                return Err(Error::InvalidDocument(format!(
                    "unsupported ref_width {} (expected 32 or 64)",
                    other
                )))
            }
        };

        let version = self.versions.entry(doc.version.clone()).or_default();

        for (file_name, file_doc) in &doc.files {
            let compiled = compile_file(file_name, file_doc, doc.generation, ref_width)?;
            let candidates = version.entry(compiled.file_name.clone()).or_default();
            candidates.push(Arc::new(compiled));
            candidates.sort_by(|a, b| b.generation.cmp(&a.generation));
        }

        Ok(())
    }

    /// Parse and insert a JSON document.
    pub fn insert_json(&mut self, text: &str) -> Result<()> {
        let doc = SpecDocument::from_json(text)?;
        self.insert_document(&doc)
    }

    /// Load every `*.json` document in a directory.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut registry = Self::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let text = std::fs::read_to_string(&path)?;
                registry.insert_json(&text)?;
            }
        }

        Ok(registry)
    }

    /// The newest specification for a file in a version's schema set.
    pub fn specification_for(&self, version: &str, file_name: &str) -> Result<&Arc<FileSpec>> {
        self.candidates(version, file_name)
            .first()
            .ok_or_else(|| Error::UnknownFile {
                version: version.to_string(),
                file: file_name.to_string(),
            })
    }

    /// All candidates for a file, newest generation first.
    pub fn candidates(&self, version: &str, file_name: &str) -> &[Arc<FileSpec>] {
        self.versions
            .get(version)
            .and_then(|files| files.get(&normalize_file_name(file_name)))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Known version tags.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for SpecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecRegistry")
            .field("versions", &self.versions.len())
            .finish()
    }
}
