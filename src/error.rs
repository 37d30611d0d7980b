use std::io;
use thiserror::Error;

/// Result type for combine archive operations
pub type Result<T> = std::result::Result<T, CombineError>;

/// Unified error type for all combine archive operations
#[derive(Debug, Error)]
pub enum CombineError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Archive is closed")]
    Closed,

    // Container errors
    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Invalid magic number in container header")]
    InvalidMagic,

    #[error("Unsupported container version: {0}.{1}")]
    UnsupportedVersion(u16, u16),

    #[error("Invalid compression method: {0}")]
    InvalidCompression(u8),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("CRC mismatch for {path}: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    // I/O errors
    #[error("Archive I/O error: {0}")]
    ArchiveIo(#[from] io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(String),
}

impl CombineError {
    /// True for errors caused by the caller's arguments rather than the archive
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidPath(_))
    }

    /// True for I/O failures of the filesystem or a store
    pub fn is_io(&self) -> bool {
        matches!(self, Self::ArchiveIo(_))
    }
}

impl From<toml::de::Error> for CombineError {
    fn from(err: toml::de::Error) -> Self {
        CombineError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for CombineError {
    fn from(err: toml::ser::Error) -> Self {
        CombineError::Toml(err.to_string())
    }
}

impl From<tempfile::PersistError> for CombineError {
    fn from(err: tempfile::PersistError) -> Self {
        CombineError::ArchiveIo(err.error)
    }
}
