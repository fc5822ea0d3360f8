//! # Errors
//!
//! Every fallible operation in the workspace returns [`CasResult`]. The
//! variants map one-to-one onto the error kinds callers branch on:
//!
//! - `NotFound`: a descriptor or cache key was required but absent. This is an
//!   expected outcome for `read` and `duplicate`.
//! - `Io`: stream or blob failures during ingestion or retrieval.
//! - `Backend`: descriptor-store transaction failure or driver fault.
//! - `Producer`: a forward handle's deferred producer failed.
//! - `Invalid`: misconfiguration or misuse (unknown backend, bad key).
//!
//! Nothing in the core retries; errors travel back to the caller unchanged.

use std::sync::Arc;

use thiserror::Error;

/// Result type for content-addressable store operations
pub type CasResult<T> = Result<T, CasError>;

/// Errors that can occur in the asset cache core
#[derive(Error, Debug)]
pub enum CasError {
    #[error("Content not found: {id}")]
    NotFound { id: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Descriptor backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Deferred producer failed: {source}")]
    Producer {
        #[source]
        source: Arc<CasError>,
    },

    #[error("Invalid request: {message}")]
    Invalid { message: String },
}

/// Coarse classification of a [`CasError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Io,
    Backend,
    Producer,
    Invalid,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Io => "IOError",
            ErrorKind::Backend => "BackendError",
            ErrorKind::Producer => "ProducerError",
            ErrorKind::Invalid => "Invalid",
        }
    }
}

impl CasError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Wrap the shared failure of a deferred producer
    pub fn producer(source: Arc<CasError>) -> Self {
        Self::Producer { source }
    }

    /// Build an `Io` error from a kind and message
    pub fn io<S: Into<String>>(kind: std::io::ErrorKind, message: S) -> Self {
        Self::Io {
            source: std::io::Error::new(kind, message.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CasError::NotFound { .. } => ErrorKind::NotFound,
            CasError::Io { .. } => ErrorKind::Io,
            CasError::Backend { .. } => ErrorKind::Backend,
            CasError::Producer { .. } => ErrorKind::Producer,
            CasError::Invalid { .. } => ErrorKind::Invalid,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CasError::NotFound { .. })
    }

    /// For `Producer` errors, the error the producer itself failed with.
    pub fn producer_source(&self) -> Option<&CasError> {
        match self {
            CasError::Producer { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}
