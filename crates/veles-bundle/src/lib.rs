//! Chunked archive volume reader and virtual file system.
//!
//! Game assets are packed into *archive volumes*: append-only files holding
//! a sequence of independently compressed chunks, each decompressing to a
//! fixed maximum size. Logical files are located by a *bundle index* that
//! maps paths to `(bundle id, offset, size)` triples, and the [`Vfs`]
//! stitches the chunks a file spans back into contiguous bytes.
//!
//! The layers, bottom up:
//!
//! - [`Volume`] - one archive volume: header, chunk table, compressed payload
//! - [`ChunkStore`] - on-demand decompression with an LRU cache and
//!   single-flight deduplication of concurrent fetches
//! - [`BundleIndex`] - case-insensitive path to file-location lookup
//! - [`Vfs`] - whole-file reads over the index and store
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use veles_bundle::{ChunkStore, Vfs};
//!
//! let store = Arc::new(ChunkStore::new());
//! store.open_volume(0, "archive/index.vol")?;
//! store.open_volume(1, "archive/data_0.vol")?;
//!
//! // Volume 0 holds the serialized index (self-referential bootstrap).
//! let vfs = Vfs::open(store, 0)?;
//! let bytes = vfs.read("data/baseitemtypes.dat")?;
//! # Ok::<(), veles_bundle::Error>(())
//! ```

mod decompress;
mod error;
mod index;
mod store;
mod vfs;
mod volume;
mod write;

pub use error::{Error, Result};
pub use index::{normalize_path, BundleIndex, FileLocation};
pub use store::{ChunkKey, ChunkStore, DEFAULT_CACHE_BUDGET};
pub use vfs::Vfs;
pub use volume::{Codec, Volume, VOLUME_MAGIC};
pub use write::{IndexBuilder, VolumeBuilder};
