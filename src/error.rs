//! Error types for multipart transfers

use std::io;
use thiserror::Error;

/// Result type alias for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors that can occur while moving or verifying object parts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Caller supplied no data or malformed arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested digest algorithm cannot be resolved
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A part fetch completed with an error
    #[error("Part fetch failed: {0}")]
    Fetch(String),

    /// A part upload completed with an error
    #[error("Part upload failed: {0}")]
    Upload(String),

    /// Computed checksum does not match the expected one
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Operation is not legal in the current transfer state
    #[error("Invalid transfer state: {0}")]
    InvalidState(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<TransferError>,
    },
}

impl TransferError {
    /// Add context to an error
    pub fn context<S: Into<String>>(self, context: S) -> Self {
        TransferError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &TransferError {
        match self {
            TransferError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the error is worth retrying at the orchestration layer
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Fetch(_) => true,
            TransferError::Upload(_) => true,
            TransferError::Io(_) => true,
            // Corrupt data is re-fetchable, but never silently
            TransferError::ChecksumMismatch { .. } => false,
            TransferError::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if the error is a configuration problem (fatal, never retried)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            TransferError::UnsupportedAlgorithm(_) | TransferError::InvalidConfig(_)
        )
    }

    /// Check if the error reports corrupted content
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self.root(), TransferError::ChecksumMismatch { .. })
    }

    /// Wrap this error in an `io::Error` for stream consumers
    ///
    /// The original error stays reachable through [`TransferError::from_io_error`].
    pub fn into_io_error(self) -> io::Error {
        let kind = match self.root() {
            TransferError::ChecksumMismatch { .. } => io::ErrorKind::InvalidData,
            TransferError::InvalidInput(_) => io::ErrorKind::InvalidInput,
            TransferError::UnsupportedAlgorithm(_) | TransferError::InvalidConfig(_) => {
                io::ErrorKind::Unsupported
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }

    /// Recover a `TransferError` from an `io::Error` produced by a stream
    pub fn from_io_error(err: &io::Error) -> Self {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<TransferError>())
            .cloned()
            .unwrap_or_else(|| TransferError::Io(err.to_string()))
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        TransferError::from_io_error(&err)
    }
}
