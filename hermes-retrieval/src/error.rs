//! Error types for hermes-retrieval

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing index part: {0}")]
    MissingIndexPart(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query cancelled after {candidates} candidates")]
    Cancelled { candidates: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
