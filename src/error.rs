//! Error types for the Satchel library.
//!
//! Every fallible operation returns [`Result`], whose error side is the
//! [`SatchelError`] enum. The variants mirror the failure classes callers are
//! expected to react to differently: a bad path, a corrupt index, a rejected
//! document, a malformed query, an I/O failure while writing, memory pressure,
//! a rejected configuration, and a rare catch-all.
//!
//! # Examples
//!
//! ```
//! use satchel::error::{ErrorKind, Result, SatchelError};
//!
//! fn check(id: &str) -> Result<()> {
//!     if id.is_empty() {
//!         return Err(SatchelError::invalid_document("id must not be empty"));
//!     }
//!     Ok(())
//! }
//!
//! let err = check("").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidDocument);
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Satchel operations.
#[derive(Error, Debug)]
pub enum SatchelError {
    /// The index directory is unusable (not a directory, not creatable, not writable).
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The manifest or a segment failed validation.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A document failed schema validation on ingest.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A query string could not be parsed, or a plan is structurally invalid.
    #[error("Query parse error at position {position} near '{fragment}': {message}")]
    QueryParse {
        /// What went wrong.
        message: String,
        /// Byte offset into the query string.
        position: usize,
        /// The offending substring.
        fragment: String,
    },

    /// I/O errors (durable writes, reads of index files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A memory budget was exceeded or an allocation could not be satisfied.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// A configuration value or file was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for failures that fit nowhere else.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Result type alias for operations that may fail with SatchelError.
pub type Result<T> = std::result::Result<T, SatchelError>;

/// Coarse classification of a [`SatchelError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    CorruptIndex,
    InvalidDocument,
    QueryParse,
    Io,
    OutOfMemory,
    InvalidConfig,
    Unknown,
}

impl SatchelError {
    /// Create a new invalid path error.
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        SatchelError::InvalidPath(msg.into())
    }

    /// Create a new corrupt index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        SatchelError::CorruptIndex(msg.into())
    }

    /// Create a new invalid document error.
    pub fn invalid_document<S: Into<String>>(msg: S) -> Self {
        SatchelError::InvalidDocument(msg.into())
    }

    /// Create a new query parse error.
    pub fn parse<S: Into<String>, F: Into<String>>(msg: S, position: usize, fragment: F) -> Self {
        SatchelError::QueryParse {
            message: msg.into(),
            position,
            fragment: fragment.into(),
        }
    }

    /// Create a new out of memory error.
    pub fn out_of_memory<S: Into<String>>(msg: S) -> Self {
        SatchelError::OutOfMemory(msg.into())
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        SatchelError::InvalidConfig(msg.into())
    }

    /// Create a new unknown error.
    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        SatchelError::Unknown(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SatchelError::InvalidPath(_) => ErrorKind::InvalidPath,
            SatchelError::CorruptIndex(_) => ErrorKind::CorruptIndex,
            SatchelError::InvalidDocument(_) => ErrorKind::InvalidDocument,
            SatchelError::QueryParse { .. } => ErrorKind::QueryParse,
            SatchelError::Io(_) => ErrorKind::Io,
            SatchelError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            SatchelError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            SatchelError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Byte position of a query parse error, if this is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            SatchelError::QueryParse { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl From<std::collections::TryReserveError> for SatchelError {
    fn from(err: std::collections::TryReserveError) -> Self {
        SatchelError::OutOfMemory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = SatchelError::corrupt("bad magic");
        assert_eq!(error.to_string(), "Corrupt index: bad magic");

        let error = SatchelError::invalid_document("empty id");
        assert_eq!(error.to_string(), "Invalid document: empty id");

        let error = SatchelError::parse("unterminated phrase", 6, "\"pump");
        assert_eq!(
            error.to_string(),
            "Query parse error at position 6 near '\"pump': unterminated phrase"
        );
        assert_eq!(error.position(), Some(6));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = SatchelError::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(error.position(), None);
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(SatchelError::from(err).kind(), ErrorKind::OutOfMemory);
    }
}
