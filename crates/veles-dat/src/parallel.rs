//! Parallel row decoding, behind the `parallel` feature.

use rayon::prelude::*;

use crate::decode::decode_row;
use crate::matcher::RowLayout;
use crate::{DatFile, Record, RowError};

/// Decode every row across the rayon thread pool.
///
/// Results are collected in row order, so the output is identical to
/// draining [`decode`](fn@crate::decode) sequentially.
pub fn decode_all(
    file: &DatFile<'_>,
    layout: &RowLayout,
) -> Vec<std::result::Result<Record, RowError>> {
    (0..file.row_count())
        .into_par_iter()
        .map(|row| decode_row(file, layout, row))
        .collect()
}
