//! Error types for gati-map.
//!
//! Store I/O failures are surfaced to the caller of the operation that
//! triggered them; the map rolls back any partial side effects first, so the
//! active cloud and the loaded-cell set stay consistent on every error path.
//! No retries are performed by the map itself.

use thiserror::Error;

/// Errors that can occur while operating the map.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cell format error: {0}")]
    CellFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
