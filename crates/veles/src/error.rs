use thiserror::Error;

/// Facade-level errors, a sum of the layer crates' errors plus I/O.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bundle(#[from] veles_bundle::Error),

    #[error(transparent)]
    Dat(#[from] veles_dat::Error),

    #[error(transparent)]
    Row(#[from] veles_dat::RowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("volume file `{0}` has no numeric id")]
    InvalidVolumeName(String),

    #[error("row {row} out of range, file has {rows} rows")]
    RowOutOfRange { row: u64, rows: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
