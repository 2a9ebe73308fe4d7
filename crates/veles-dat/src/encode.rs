//! Record file writing, the inverse of [`decode`](fn@crate::decode).

use crate::decode::Value;
use crate::matcher::RowLayout;
use crate::spec::{FieldKind, RefWidth};
use crate::{Error, Record, Result, HEADER_SIZE};

/// Serializes records back into the fixed-row wire format.
///
/// Rows are laid out against the same [`RowLayout`] the decoder used, so a
/// decode/encode round trip reproduces the original declared row width,
/// including any trailing padding the specification does not cover. Heap
/// payloads are appended in field order.
pub struct DatWriter {
    layout: RowLayout,
    rows: Vec<u8>,
    heap: Vec<u8>,
    row_count: u32,
}

impl DatWriter {
    pub fn new(layout: &RowLayout) -> Self {
        Self {
            layout: layout.clone(),
            rows: Vec::new(),
            heap: Vec::new(),
            row_count: 0,
        }
    }

    /// Append one record as a row.
    ///
    /// Every specification field must be present in the record with a value
    /// of the matching kind. Padding shorter than the layout's padding width
    /// is zero-filled; longer padding is rejected.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let spec = &self.layout.spec;
        let ref_width = spec.ref_width;
        let row_start = self.rows.len();
        self.rows.resize(row_start + self.layout.row_width as usize, 0);

        for field in &spec.fields {
            let value = record.get(&field.name).ok_or_else(|| {
                Error::Encode(format!("record is missing field `{}`", field.name))
            })?;
            let at = row_start + field.offset as usize;

            if field.is_list {
                let items = match value {
                    Value::List(items) => items.as_slice(),
                    other => return Err(kind_mismatch(&field.name, "list", other)),
                };
                let offset = if items.is_empty() { 0 } else { self.heap.len() as u64 };
                for item in items {
                    encode_element(&mut self.heap, field.kind, item, ref_width)
                        .map_err(|e| in_field(&field.name, e))?;
                }
                write_ref_at(&mut self.rows, at, ref_width, items.len() as u64)?;
                let offset_at = at + ref_width.byte_len() as usize;
                write_ref_at(&mut self.rows, offset_at, ref_width, offset)?;
                continue;
            }

            match field.kind {
                FieldKind::String => {
                    let offset = match value {
                        Value::Null => ref_width.sentinel(),
                        Value::String(s) => {
                            let offset = self.heap.len() as u64;
                            for unit in s.encode_utf16() {
                                self.heap.extend_from_slice(&unit.to_le_bytes());
                            }
                            self.heap.extend_from_slice(&[0, 0]);
                            offset
                        }
                        other => return Err(kind_mismatch(&field.name, "string", other)),
                    };
                    write_ref_at(&mut self.rows, at, ref_width, offset)?;
                }
                FieldKind::ForeignKey => {
                    let row_id = match value {
                        Value::Null => ref_width.sentinel(),
                        Value::ForeignKey(fk) => fk.row,
                        other => return Err(kind_mismatch(&field.name, "foreign_key", other)),
                    };
                    write_ref_at(&mut self.rows, at, ref_width, row_id)?;
                }
                _ => {
                    let mut cell = Vec::with_capacity(field.kind.scalar_width(ref_width) as usize);
                    encode_element(&mut cell, field.kind, value, ref_width)
                        .map_err(|e| in_field(&field.name, e))?;
                    self.rows[at..at + cell.len()].copy_from_slice(&cell);
                }
            }
        }

        let padding = record.padding();
        if padding.len() > self.layout.padding as usize {
            return Err(Error::Encode(format!(
                "record padding is {} bytes, layout allows {}",
                padding.len(),
                self.layout.padding
            )));
        }
        let pad_start = row_start + spec.row_width as usize;
        self.rows[pad_start..pad_start + padding.len()].copy_from_slice(padding);

        self.row_count += 1;
        Ok(())
    }

    /// Assemble the final file: header, fixed rows, heap.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.rows.len() + self.heap.len());
        out.extend_from_slice(&self.row_count.to_le_bytes());
        out.extend_from_slice(&self.layout.row_width.to_le_bytes());
        out.extend_from_slice(&self.rows);
        out.extend_from_slice(&self.heap);
        out
    }
}

fn kind_mismatch(field: &str, expected: &str, got: &Value) -> Error {
    Error::Encode(format!(
        "field `{field}` expects a {expected} value, got {got}"
    ))
}

fn in_field(field: &str, err: Error) -> Error {
    match err {
        Error::Encode(msg) => Error::Encode(format!("field `{field}`: {msg}")),
        other => other,
    }
}

fn write_ref_at(rows: &mut [u8], at: usize, ref_width: RefWidth, value: u64) -> Result<()> {
    match ref_width {
        RefWidth::U32 => {
            let value = u32::try_from(value).map_err(|_| {
                Error::Encode(format!("reference value {value} exceeds 32-bit width"))
            })?;
            rows[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        RefWidth::U64 => {
            rows[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }
    }
    Ok(())
}

fn encode_element(
    buf: &mut Vec<u8>,
    kind: FieldKind,
    value: &Value,
    ref_width: RefWidth,
) -> Result<()> {
    match (kind, value) {
        (FieldKind::Bool, Value::Bool(v)) => buf.push(*v as u8),
        (FieldKind::I8, Value::I8(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::I16, Value::I16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::I32, Value::I32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::I64, Value::I64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::U8, Value::U8(v)) => buf.push(*v),
        (FieldKind::U16, Value::U16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::U32, Value::U32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::U64, Value::U64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::F32, Value::F32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::F64, Value::F64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (FieldKind::ForeignKey, Value::ForeignKey(fk)) => match ref_width {
            RefWidth::U32 => {
                let row = u32::try_from(fk.row).map_err(|_| {
                    Error::Encode(format!("row index {} exceeds 32-bit width", fk.row))
                })?;
                buf.extend_from_slice(&row.to_le_bytes());
            }
            RefWidth::U64 => buf.extend_from_slice(&fk.row.to_le_bytes()),
        },
        (FieldKind::ForeignKey, Value::Null) => match ref_width {
            RefWidth::U32 => buf.extend_from_slice(&u32::MAX.to_le_bytes()),
            RefWidth::U64 => buf.extend_from_slice(&u64::MAX.to_le_bytes()),
        },
        (kind, other) => {
            return Err(Error::Encode(format!(
                "expected a {kind:?} value, got {other}"
            )))
        }
    }
    Ok(())
}
