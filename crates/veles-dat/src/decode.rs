//! Row decoding: fixed-region scalars, heap payloads, lazy references.

use std::sync::Arc;

use veles_common::BinaryReader;

use crate::matcher::RowLayout;
use crate::spec::{FieldKind, ForeignKeyTarget, RefWidth};
use crate::{DatFile, RowError, RowErrorKind};

/// A lazy reference to a row in another record file.
///
/// Resolving the pair to a record is the consumer's responsibility; the
/// decoder never loads the target file, which keeps mutually (even
/// cyclically) referencing files decodable in isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Normalized target file name.
    pub file: Arc<str>,
    /// Row index within the target file.
    pub row: u64,
}

/// One decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (reference sentinel).
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Heap string, decoded from UTF-16.
    String(String),
    /// Heap list of fixed-width elements.
    List(Vec<Value>),
    /// Lazy reference into another file.
    ForeignKey(ForeignKey),
}

impl Value {
    /// Check if this value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i64, widening smaller signed integers.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a u64, widening smaller unsigned integers.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(*v as u64),
            Value::U16(v) => Some(*v as u64),
            Value::U32(v) => Some(*v as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list.
    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get this value as a foreign-key reference.
    #[inline]
    pub fn as_foreign_key(&self) -> Option<&ForeignKey> {
        match self {
            Value::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "List[{}]", items.len()),
            Value::ForeignKey(fk) => write!(f, "Ref({}, {})", fk.file, fk.row),
        }
    }
}

/// One decoded row: field name to value, in specification order, plus the
/// row's opaque trailing padding bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(Arc<str>, Value)>,
    padding: Vec<u8>,
}

impl Record {
    /// Build a record directly (synthetic fixtures, repack tooling).
    pub fn new(fields: Vec<(Arc<str>, Value)>, padding: Vec<u8>) -> Self {
        Self { fields, padding }
    }

    /// Value of a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field_name, _)| &**field_name == name)
            .map(|(_, value)| value)
    }

    /// Value of a field by position.
    #[inline]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|(_, value)| value)
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in specification order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (&**name, value))
    }

    /// The row's trailing bytes not covered by the specification.
    #[inline]
    pub fn padding(&self) -> &[u8] {
        &self.padding
    }
}

/// Decode every row of a file against a matched layout.
///
/// The iterator yields exactly `row_count` results in ascending row order.
/// Re-decoding the same bytes is deterministic and side-effect-free.
pub fn decode<'a>(file: &DatFile<'a>, layout: &'a RowLayout) -> Records<'a> {
    Records {
        file: *file,
        layout,
        next_row: 0,
    }
}

/// Iterator over decoded rows. See [`decode`].
pub struct Records<'a> {
    file: DatFile<'a>,
    layout: &'a RowLayout,
    next_row: u32,
}

impl Iterator for Records<'_> {
    type Item = std::result::Result<Record, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.file.row_count() {
            return None;
        }
        let row = self.next_row;
        self.next_row += 1;
        Some(decode_row(&self.file, self.layout, row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.file.row_count() - self.next_row) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Records<'_> {}

/// Decode one row.
pub(crate) fn decode_row(
    file: &DatFile<'_>,
    layout: &RowLayout,
    row_index: u32,
) -> std::result::Result<Record, RowError> {
    let row = file.row(row_index).ok_or(RowError {
        row: row_index,
        kind: RowErrorKind::Truncated {
            needed: layout.row_width as usize,
            available: 0,
        },
    })?;
    let heap = file.heap();
    let spec = &layout.spec;
    let ref_width = spec.ref_width;

    let failed = |kind: RowErrorKind| RowError {
        row: row_index,
        kind,
    };

    // A layout from a different file may be wider than these rows.
    if row.len() < layout.row_width as usize {
        return Err(failed(RowErrorKind::Truncated {
            needed: layout.row_width as usize,
            available: row.len(),
        }));
    }

    let mut fields = Vec::with_capacity(spec.fields.len());
    let mut reader = BinaryReader::new(row);

    for field in &spec.fields {
        reader.seek(field.offset as usize);

        let value = if field.is_list {
            let count = read_ref(&mut reader, ref_width).map_err(&failed)?;
            let offset = read_ref(&mut reader, ref_width).map_err(&failed)?;
            decode_list(
                heap,
                field.kind,
                field.foreign_key.as_ref(),
                count,
                offset,
                ref_width,
            )
            .map_err(&failed)?
        } else {
            match field.kind {
                FieldKind::String => {
                    let offset = read_ref(&mut reader, ref_width).map_err(&failed)?;
                    if offset == ref_width.sentinel() {
                        Value::Null
                    } else {
                        Value::String(read_heap_string(heap, offset).map_err(&failed)?)
                    }
                }
                FieldKind::ForeignKey => {
                    let row_id = read_ref(&mut reader, ref_width).map_err(&failed)?;
                    foreign_key_value(field.foreign_key.as_ref(), row_id, ref_width)
                }
                _ => decode_scalar(&mut reader, field.kind)
                    .map_err(|e| failed(eof_kind(e)))?,
            }
        };

        fields.push((Arc::clone(&field.name), value));
    }

    let padding = row[spec.row_width as usize..].to_vec();

    Ok(Record { fields, padding })
}

fn eof_kind(err: veles_common::Error) -> RowErrorKind {
    match err {
        veles_common::Error::UnexpectedEof { needed, available } => {
            RowErrorKind::Truncated { needed, available }
        }
        _ => RowErrorKind::Truncated {
            needed: 0,
            available: 0,
        },
    }
}

fn read_ref(
    reader: &mut BinaryReader<'_>,
    ref_width: RefWidth,
) -> std::result::Result<u64, RowErrorKind> {
    let value = match ref_width {
        RefWidth::U32 => reader.read_u32().map(|v| v as u64),
        RefWidth::U64 => reader.read_u64(),
    };
    value.map_err(eof_kind)
}

fn decode_scalar(
    reader: &mut BinaryReader<'_>,
    kind: FieldKind,
) -> veles_common::Result<Value> {
    Ok(match kind {
        FieldKind::Bool => Value::Bool(reader.read_bool()?),
        FieldKind::I8 => Value::I8(reader.read_i8()?),
        FieldKind::I16 => Value::I16(reader.read_i16()?),
        FieldKind::I32 => Value::I32(reader.read_i32()?),
        FieldKind::I64 => Value::I64(reader.read_i64()?),
        FieldKind::U8 => Value::U8(reader.read_u8()?),
        FieldKind::U16 => Value::U16(reader.read_u16()?),
        FieldKind::U32 => Value::U32(reader.read_u32()?),
        FieldKind::U64 => Value::U64(reader.read_u64()?),
        FieldKind::F32 => Value::F32(reader.read_f32()?),
        FieldKind::F64 => Value::F64(reader.read_f64()?),
        // Handled by the callers; only scalar kinds reach here.
        FieldKind::String | FieldKind::ForeignKey => Value::Null,
    })
}

fn foreign_key_value(
    target: Option<&ForeignKeyTarget>,
    row_id: u64,
    ref_width: RefWidth,
) -> Value {
    if row_id == ref_width.sentinel() {
        return Value::Null;
    }
    match target {
        Some(target) => Value::ForeignKey(ForeignKey {
            file: Arc::clone(&target.file),
            row: row_id,
        }),
        // Compilation rejects keyless foreign_key fields; unreachable in
        // practice but harmless to degrade.
        None => Value::Null,
    }
}

fn read_heap_string(heap: &[u8], offset: u64) -> std::result::Result<String, RowErrorKind> {
    let start = offset as usize;
    let mut pos = start;
    let mut units = Vec::new();

    loop {
        if pos + 2 > heap.len() {
            return Err(RowErrorKind::HeapOverrun {
                offset,
                needed: pos + 2 - start,
                heap_len: heap.len(),
            });
        }
        let unit = u16::from_le_bytes([heap[pos], heap[pos + 1]]);
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }

    String::from_utf16(&units).map_err(|_| RowErrorKind::InvalidString { offset })
}

fn decode_list(
    heap: &[u8],
    element_kind: FieldKind,
    target: Option<&ForeignKeyTarget>,
    count: u64,
    offset: u64,
    ref_width: RefWidth,
) -> std::result::Result<Value, RowErrorKind> {
    // A sentinel offset or zero count is an empty list, never a heap read.
    if offset == ref_width.sentinel() || count == 0 {
        return Ok(Value::List(Vec::new()));
    }

    let element_width = element_kind.scalar_width(ref_width) as u64;
    let needed = count
        .checked_mul(element_width)
        .ok_or(RowErrorKind::HeapOverrun {
            offset,
            needed: usize::MAX,
            heap_len: heap.len(),
        })?;

    let end = offset.checked_add(needed).filter(|&e| e <= heap.len() as u64);
    if end.is_none() {
        return Err(RowErrorKind::HeapOverrun {
            offset,
            needed: needed as usize,
            heap_len: heap.len(),
        });
    }

    let mut reader = BinaryReader::new_at(heap, offset as usize);
    let mut items = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let item = match element_kind {
            FieldKind::ForeignKey => {
                let row_id = read_ref(&mut reader, ref_width)?;
                foreign_key_value(target, row_id, ref_width)
            }
            _ => decode_scalar(&mut reader, element_kind).map_err(eof_kind)?,
        };
        items.push(item);
    }

    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_specification;
    use crate::spec::SpecRegistry;

    fn layout_for(doc: &str, file: &str, declared_width: u32) -> RowLayout {
        let mut registry = SpecRegistry::new();
        registry.insert_json(doc).unwrap();
        let spec = registry.specification_for("v", file).unwrap();
        match_specification(spec, declared_width).unwrap()
    }

    fn dat_bytes(row_count: u32, row_width: u32, rows: &[u8], heap: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&row_count.to_le_bytes());
        out.extend_from_slice(&row_width.to_le_bytes());
        out.extend_from_slice(rows);
        out.extend_from_slice(heap);
        out
    }

    const STRING_DOC: &str = r#"{
        "version": "v", "generation": 1, "ref_width": 32,
        "files": { "a.dat": { "fields": [
            { "name": "field1", "type": "u32" },
            { "name": "field2", "type": "string" }
        ] } }
    }"#;

    #[test]
    fn test_string_ref_with_padding_row() {
        // row_count=2, row_width=9: u32 + string offset + 1 padding byte.
        let layout = layout_for(STRING_DOC, "a.dat", 9);

        // Heap: "AB" in UTF-16LE plus terminator, then noise.
        let heap = [0x41, 0x00, 0x42, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let rows = [
            0x01, 0, 0, 0, 0x00, 0, 0, 0, 0x00, // row 0: field1=1, offset 0
            0x02, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, // row 1: sentinel
        ];
        let raw = dat_bytes(2, 9, &rows, &heap);
        let file = DatFile::parse(&raw).unwrap();

        let records: Vec<_> = decode(&file, &layout).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].get("field1"), Some(&Value::U32(1)));
        assert_eq!(records[0].get("field2"), Some(&Value::String("AB".into())));
        assert_eq!(records[0].padding(), &[0x00]);

        // Sentinel offset decodes to Null, never a dereference.
        assert_eq!(records[1].get("field2"), Some(&Value::Null));
        assert_eq!(records[1].padding(), &[0x07]);
    }

    const LIST_DOC: &str = r#"{
        "version": "v", "generation": 1, "ref_width": 32,
        "files": { "l.dat": { "fields": [
            { "name": "Values", "type": "u16", "list": true }
        ] } }
    }"#;

    #[test]
    fn test_list_reads_exactly_count_elements() {
        let layout = layout_for(LIST_DOC, "l.dat", 8);

        // count=3 at heap offset 4; more bytes exist past the 3 elements.
        let heap = [
            0xEE, 0xEE, 0xEE, 0xEE, // unrelated
            0x0A, 0x00, 0x0B, 0x00, 0x0C, 0x00, // the 3 elements
            0x0D, 0x00, 0x0E, 0x00, // extra data that must not be read
        ];
        let rows = [0x03, 0, 0, 0, 0x04, 0, 0, 0];
        let raw = dat_bytes(1, 8, &rows, &heap);
        let file = DatFile::parse(&raw).unwrap();

        let record = decode(&file, &layout).next().unwrap().unwrap();
        assert_eq!(
            record.get("Values"),
            Some(&Value::List(vec![
                Value::U16(0x0A),
                Value::U16(0x0B),
                Value::U16(0x0C),
            ]))
        );
    }

    #[test]
    fn test_list_sentinel_offset_is_empty() {
        let layout = layout_for(LIST_DOC, "l.dat", 8);

        let rows = [0x05, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
        let raw = dat_bytes(1, 8, &rows, &[]);
        let file = DatFile::parse(&raw).unwrap();

        let record = decode(&file, &layout).next().unwrap().unwrap();
        assert_eq!(record.get("Values"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn test_heap_overrun_is_row_scoped() {
        let layout = layout_for(LIST_DOC, "l.dat", 8);

        let heap = [0x01, 0x00, 0x02, 0x00];
        let rows = [
            0x09, 0, 0, 0, 0x00, 0, 0, 0, // row 0: 9 elements, heap has 2
            0x02, 0, 0, 0, 0x00, 0, 0, 0, // row 1: fine
        ];
        let raw = dat_bytes(2, 8, &rows, &heap);
        let file = DatFile::parse(&raw).unwrap();

        let results: Vec<_> = decode(&file, &layout).collect();
        assert_eq!(results.len(), 2);

        let err = results[0].as_ref().unwrap_err();
        assert_eq!(err.row, 0);
        assert!(matches!(err.kind, RowErrorKind::HeapOverrun { .. }));

        // The bad row does not hide the good one.
        let record = results[1].as_ref().unwrap();
        assert_eq!(
            record.get("Values"),
            Some(&Value::List(vec![Value::U16(1), Value::U16(2)]))
        );
    }

    const FK_DOC: &str = r#"{
        "version": "v", "generation": 1, "ref_width": 64,
        "files": { "k.dat": { "fields": [
            { "name": "Other", "type": "foreign_key",
              "key": { "file": "t.dat", "field": "Id" } }
        ] } }
    }"#;

    #[test]
    fn test_foreign_key_is_lazy() {
        let layout = layout_for(FK_DOC, "k.dat", 8);

        let rows = [0x05, 0, 0, 0, 0, 0, 0, 0];
        let raw = dat_bytes(1, 8, &rows, &[]);
        let file = DatFile::parse(&raw).unwrap();

        let record = decode(&file, &layout).next().unwrap().unwrap();
        let fk = record.get("Other").unwrap().as_foreign_key().unwrap();
        assert_eq!(&*fk.file, "t.dat");
        assert_eq!(fk.row, 5);
    }

    #[test]
    fn test_foreign_key_sentinel_64() {
        let layout = layout_for(FK_DOC, "k.dat", 8);

        let rows = [0xFF; 8];
        let raw = dat_bytes(1, 8, &rows, &[]);
        let file = DatFile::parse(&raw).unwrap();

        let record = decode(&file, &layout).next().unwrap().unwrap();
        assert_eq!(record.get("Other"), Some(&Value::Null));
    }

    #[test]
    fn test_invalid_utf16_is_row_error() {
        let layout = layout_for(STRING_DOC, "a.dat", 8);

        // Unpaired high surrogate before the terminator.
        let heap = [0x00, 0xD8, 0x00, 0x00];
        let rows = [0x01, 0, 0, 0, 0x00, 0, 0, 0];
        let raw = dat_bytes(1, 8, &rows, &heap);
        let file = DatFile::parse(&raw).unwrap();

        let err = decode(&file, &layout).next().unwrap().unwrap_err();
        assert_eq!(err.row, 0);
        assert!(matches!(err.kind, RowErrorKind::InvalidString { offset: 0 }));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let layout = layout_for(STRING_DOC, "a.dat", 8);

        let heap = [0x58, 0x00, 0x00, 0x00];
        let rows = [0x2A, 0, 0, 0, 0x00, 0, 0, 0];
        let raw = dat_bytes(1, 8, &rows, &heap);
        let file = DatFile::parse(&raw).unwrap();

        let first: Vec<_> = decode(&file, &layout).collect();
        let second: Vec<_> = decode(&file, &layout).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_layout_wider_than_file_rows() {
        let layout = layout_for(STRING_DOC, "a.dat", 9);

        // A 4-byte-row file paired with a 9-byte layout.
        let raw = dat_bytes(1, 4, &[1, 0, 0, 0], &[]);
        let file = DatFile::parse(&raw).unwrap();

        let err = decode(&file, &layout).next().unwrap().unwrap_err();
        assert!(matches!(
            err.kind,
            RowErrorKind::Truncated {
                needed: 9,
                available: 4,
            }
        ));
    }

    #[test]
    fn test_row_order_and_exact_count() {
        let doc = r#"{
            "version": "v", "generation": 1, "ref_width": 32,
            "files": { "n.dat": { "fields": [ { "name": "N", "type": "u8" } ] } }
        }"#;
        let layout = layout_for(doc, "n.dat", 1);

        let raw = dat_bytes(4, 1, &[10, 20, 30, 40], &[]);
        let file = DatFile::parse(&raw).unwrap();

        let iter = decode(&file, &layout);
        assert_eq!(iter.len(), 4);

        let values: Vec<u64> = iter
            .map(|r| r.unwrap().get("N").unwrap().as_u64().unwrap())
            .collect();
        assert_eq!(values, vec![10, 20, 30, 40]);
    }
}
