use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for noa-pack operations
pub type Result<T> = std::result::Result<T, NoaError>;

/// Unified error type for all noa-pack operations
#[derive(Debug, Error)]
pub enum NoaError {
    // Run-level (fatal) errors
    #[error("Cannot open destination archive {path}: {source}")]
    DestinationOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to initialize archive: {0}")]
    ArchiveInitFailed(String),

    #[error("Failed to finalize archive: {0}")]
    ArchiveFinalizeFailed(String),

    // Archive writer errors
    #[error("Invalid archive state: {0}")]
    InvalidState(String),

    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("Duplicate entry in archive directory: {0}")]
    DuplicateEntry(String),

    #[error("Unknown entry (not announced by its directory): {0}")]
    UnknownEntry(String),

    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    #[error("Invalid magic number in archive header")]
    InvalidMagic,

    #[error("Invalid compression method: {0}")]
    InvalidCompression(u8),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Path error: {0}")]
    PathError(String),

    // Input errors
    #[error("Invalid source pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("TOML error: {0}")]
    TomlError(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<toml::de::Error> for NoaError {
    fn from(err: toml::de::Error) -> Self {
        NoaError::TomlError(err.to_string())
    }
}

impl From<regex::Error> for NoaError {
    fn from(err: regex::Error) -> Self {
        NoaError::InvalidPattern(err.to_string())
    }
}
