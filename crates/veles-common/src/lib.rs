//! Common utilities for Veles.
//!
//! This crate provides the foundational pieces shared by the archive and
//! record-file crates:
//!
//! - [`BinaryReader`] - positioned little-endian reading from byte slices
//! - [`crc`] - CRC32C checksum helpers used for chunk integrity

mod error;
mod reader;

pub mod crc;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
