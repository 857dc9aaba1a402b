//! Error types for archive operations.
//!
//! Every fallible operation returns [`Result<T>`], an alias for
//! `Result<T, TarError>`.
//!
//! # Error Categories
//!
//! - **Structural**: [`Truncated`], [`BadMagic`], [`BadVersion`], [`BadChecksum`]
//! - **Lookup**: [`NotFound`], [`NotADirectory`], [`NotAFile`]
//! - **Read misuse**: [`OffsetOutOfRange`]
//! - **System**: [`Io`]
//!
//! [`Truncated`]: TarError::Truncated
//! [`BadMagic`]: TarError::BadMagic
//! [`BadVersion`]: TarError::BadVersion
//! [`BadChecksum`]: TarError::BadChecksum
//! [`NotFound`]: TarError::NotFound
//! [`NotADirectory`]: TarError::NotADirectory
//! [`NotAFile`]: TarError::NotAFile
//! [`OffsetOutOfRange`]: TarError::OffsetOutOfRange
//! [`Io`]: TarError::Io

/// Result type alias for operations that may return a TarError.
pub type Result<T> = std::result::Result<T, TarError>;

/// Error types for archive operations.
#[derive(Debug, thiserror::Error)]
pub enum TarError {
    /// A read returned fewer bytes than the archive layout requires.
    #[error("archive truncated at offset {offset}: expected {expected} bytes, got {actual}")]
    Truncated {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// Header magic is not `ustar\0`.
    #[error("bad magic in header at offset {0}")]
    BadMagic(u64),

    /// Header version is not `00`.
    #[error("bad version in header at offset {0}")]
    BadVersion(u64),

    /// Stored checksum does not match the recomputed one.
    #[error("bad checksum in header at offset {offset}: stored {stored}, computed {computed}")]
    BadChecksum { offset: u64, stored: u64, computed: u64 },

    /// No header matches the requested path.
    #[error("no entry at {0}")]
    NotFound(String),

    /// The path exists but is not a directory.
    #[error("{0} is not a directory")]
    NotADirectory(String),

    /// The path is missing or is not a regular file.
    #[error("{0} is not a regular file")]
    NotAFile(String),

    /// Read offset lies beyond the end of the file.
    #[error("offset {offset} is past the end of {path} ({size} bytes)")]
    OffsetOutOfRange { path: String, offset: u64, size: u64 },

    /// The underlying source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TarError {
    /// True for the errors the validation pass reports about archive structure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TarError::Truncated { .. }
                | TarError::BadMagic(_)
                | TarError::BadVersion(_)
                | TarError::BadChecksum { .. }
        )
    }
}
