//! Schema-driven decoding of fixed-row record files.
//!
//! Record (`.dat`-family) files carry no type information of their own:
//! a header with a row count and row width, a region of fixed-size rows,
//! and a trailing heap holding variable-length payloads (strings, lists)
//! addressed by offsets embedded in the rows. Field meaning comes from an
//! external, per-game-version *specification* kept in a [`SpecRegistry`].
//!
//! Decoding a file:
//!
//! 1. [`DatFile::parse`] splits raw bytes into header, rows and heap.
//! 2. [`SpecRegistry::specification_for`] finds the file's field layout
//!    for the active game version.
//! 3. [`match_specification`] reconciles the file's declared row width
//!    against the specification's computed width (trailing unknown bytes
//!    become opaque padding; a short declaration is a hard mismatch).
//! 4. [`decode`](fn@decode) yields one [`Record`] per row, in row order. Heap
//!    corruption is row-scoped: a bad row is reported and decoding
//!    continues.
//!
//! Foreign keys decode to lazy `(target file, row index)` pairs and are
//! never dereferenced eagerly, so mutually referencing files (including
//! cycles) decode independently.
//!
//! # Example
//!
//! ```no_run
//! use veles_dat::{decode, match_specification, DatFile, SpecRegistry};
//!
//! let registry = SpecRegistry::load_dir("specs/")?;
//! # let raw: Vec<u8> = vec![];
//!
//! let file = DatFile::parse(&raw)?;
//! let spec = registry.specification_for("3.25.1", "data/baseitemtypes.dat")?;
//! let layout = match_specification(spec, file.row_width())?;
//!
//! for row in decode(&file, &layout) {
//!     match row {
//!         Ok(record) => println!("{:?}", record.get("Id")),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! # Ok::<(), veles_dat::Error>(())
//! ```

mod decode;
mod encode;
mod error;
mod file;
mod matcher;
mod spec;

#[cfg(feature = "parallel")]
mod parallel;

pub use decode::{decode, ForeignKey, Record, Records, Value};
pub use encode::DatWriter;
pub use error::{Error, Result, RowError, RowErrorKind};
pub use file::{DatFile, HEADER_SIZE};
pub use matcher::{match_specification, select_specification, RowLayout};
pub use spec::{
    FieldKind, FieldSpec, FileSpec, ForeignKeyTarget, RefWidth, SpecDocument, SpecRegistry,
};

#[cfg(feature = "parallel")]
pub use parallel::decode_all;
