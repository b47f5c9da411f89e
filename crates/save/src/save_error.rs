//! Save/load error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    /// Malformed request (zero-size world, inconsistent tile count).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced file is missing or unreadable.
    #[error("not found: {path}: {source}")]
    NotFound {
        path: String,
        source: std::io::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Structural damage: bad magic, truncated header, checksum mismatch,
    /// or an undecodable payload.
    #[error("corrupted save: {0}")]
    Corrupted(String),

    /// The save was written by a newer build.
    #[error("save format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}
