//! Error types for record file decoding.

use thiserror::Error;

/// Errors that abort decoding of a whole file.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// Specification document could not be deserialized.
    #[error("specification document error: {0}")]
    Json(#[from] serde_json::Error),

    /// File shorter than its header declares.
    #[error("truncated record file: need {needed} bytes for the fixed region, have {available}")]
    Truncated { needed: usize, available: usize },

    /// No specification entry for this file in this version's schema set.
    #[error("no specification for {file} in version {version}")]
    UnknownFile { version: String, file: String },

    /// Declared row width is smaller than the specification's computed
    /// width. Decoding with a stale specification would corrupt heap
    /// offsets further down each row, so this refuses instead of guessing.
    #[error("specification mismatch for {file}: declared row width {declared} < computed {computed}")]
    SpecificationMismatch {
        file: String,
        declared: u32,
        computed: u32,
    },

    /// Specification document is structurally invalid.
    #[error("invalid specification document: {0}")]
    InvalidDocument(String),

    /// A record value did not fit the field it was encoded into.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Result type for record file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure scoped to a single row.
///
/// One malformed row must not hide the rest of a large file, so these are
/// yielded in-stream by the decoder instead of aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {kind}")]
pub struct RowError {
    /// Index of the failed row.
    pub row: u32,
    /// What went wrong.
    pub kind: RowErrorKind,
}

/// Row-scoped failure kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorKind {
    /// A heap offset, string terminator scan or list bound would read past
    /// the end of the heap.
    #[error("heap overrun: offset {offset} needs {needed} bytes, heap holds {heap_len}")]
    HeapOverrun {
        offset: u64,
        needed: usize,
        heap_len: usize,
    },

    /// Heap bytes at the offset are not valid UTF-16.
    #[error("invalid UTF-16 string at heap offset {offset}")]
    InvalidString { offset: u64 },

    /// The fixed row was shorter than a field required. Only reachable
    /// with a layout that was not produced by the matcher.
    #[error("row truncated: needed {needed} bytes, row holds {available}")]
    Truncated { needed: usize, available: usize },
}
