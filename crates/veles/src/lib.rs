//! Veles - chunked game archive and record-file access library.
//!
//! This crate provides a unified interface to the Veles library ecosystem
//! for working with chunk-compressed game archives and their schema-driven
//! record files.
//!
//! # Crates
//!
//! - [`veles_common`] - Common utilities (binary reading, CRC32C)
//! - [`veles_bundle`] - Volumes, chunk store, bundle index, VFS
//! - [`veles_dat`] - Specification registry and record decoding
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! let registry = SpecRegistry::load_dir("specs/")?;
//! let game = GameData::open("archive/", "3.1.0", registry)?;
//!
//! let items = game.dat("Data/Items.dat")?;
//! for (row, record) in items.records() {
//!     println!("{row}: {:?}", record.get("Id"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_bundle as bundle;
pub use veles_common as common;
pub use veles_dat as dat;

mod error;
mod game;

pub use error::{Error, Result};
pub use game::{DatView, GameData, INDEX_VOLUME_ID};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_bundle::{BundleIndex, ChunkStore, Codec, Vfs, Volume};
    pub use veles_common::{crc, BinaryReader};
    pub use veles_dat::{decode, DatFile, ForeignKey, Record, SpecRegistry, Value};

    pub use crate::{DatView, GameData};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
