//! Raw record file structure: header, fixed rows, heap.

use veles_common::BinaryReader;

use crate::{Error, Result};

/// Size of the record file header in bytes (`row_count` + `row_width`).
pub const HEADER_SIZE: usize = 8;

/// A parsed record file: borrowed views of the fixed-row region and heap.
///
/// The header is trusted for geometry only - row count and declared row
/// width come from the file itself, and the declared width is reconciled
/// against the specification by the matcher, not assumed correct.
#[derive(Debug, Clone, Copy)]
pub struct DatFile<'a> {
    row_count: u32,
    row_width: u32,
    rows: &'a [u8],
    heap: &'a [u8],
}

impl<'a> DatFile<'a> {
    /// Split raw file bytes into header, rows and heap.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let row_count = reader.read_u32()?;
        let row_width = reader.read_u32()?;

        let fixed_len = row_count as usize * row_width as usize;
        let needed = HEADER_SIZE + fixed_len;
        if data.len() < needed {
            return Err(Error::Truncated {
                needed,
                available: data.len(),
            });
        }

        Ok(Self {
            row_count,
            row_width,
            rows: &data[HEADER_SIZE..needed],
            heap: &data[needed..],
        })
    }

    /// Number of rows declared by the header.
    #[inline]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Row width in bytes declared by the header.
    #[inline]
    pub fn row_width(&self) -> u32 {
        self.row_width
    }

    /// The heap region (variable-length payloads).
    #[inline]
    pub fn heap(&self) -> &'a [u8] {
        self.heap
    }

    /// The fixed bytes of one row.
    pub fn row(&self, index: u32) -> Option<&'a [u8]> {
        if index >= self.row_count {
            return None;
        }
        let width = self.row_width as usize;
        let start = index as usize * width;
        Some(&self.rows[start..start + width])
    }
}
