//! Error types and result aliases for coursepulse.
//!
//! This module defines the shared error types used across all coursepulse
//! components. Errors are structured for programmatic handling: batch loops
//! match on [`Error::InvalidKey`] to skip malformed source rows, while
//! storage failures abort the surrounding pass.

use std::fmt;

/// The result type used throughout coursepulse.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in coursepulse operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A course or usage key failed to parse.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of what made the key invalid.
        message: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource_type} with id {id}")]
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A storage operation failed.
    ///
    /// A commit that returns this variant applied nothing; the rollup pass
    /// that issued it is safe to retry from the same watermark.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new invalid-key error with the given message.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }
}
