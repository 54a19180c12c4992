//! Error types for arclink.
//!
//! This module provides the [`ArchiveError`] type, the standard error type
//! used throughout the arclink protocol engine. Every error that reaches the
//! dispatcher's outer boundary is converted into a protocol error response;
//! no error propagates to the transport layer.
//!
//! The taxonomy follows the ArchiveLink error schema: the HTTP status
//! conveys the category, the body carries `ErrorMessage=<text>` and the
//! `X-ErrorDescription` header repeats the text.

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`ArchiveError`].
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Standard error type for the arclink protocol engine.
///
/// Each variant maps to one HTTP status category:
///
/// | Variant | Status |
/// |---|---|
/// | `Validation` | 400 |
/// | `Unauthorized` | 401 |
/// | `Forbidden` | 403 |
/// | `NotFound` | 404 |
/// | `UnsupportedMedia` | 406 |
/// | `NotImplemented` | 501 |
/// | `Internal` | 500 |
///
/// # Example
///
/// ```
/// use arclink_core::{ArchiveError, ArchiveResult};
///
/// fn require_doc_id(doc_id: &str) -> ArchiveResult<()> {
///     if doc_id.is_empty() {
///         return Err(ArchiveError::validation("docId must not be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Malformed command, parameter, offset or pattern.
    #[error("{message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Missing or invalid credentials.
    #[error("{message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// Signature verification failure, disabled certificate, insufficient
    /// permission, or a rejected duplicate.
    #[error("{message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// Missing record, component, certificate or repository.
    #[error("{message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// No extraction strategy registered for the content type.
    #[error("{message}")]
    UnsupportedMedia {
        /// Human-readable error message.
        message: String,
    },

    /// Explicitly unsupported command template.
    #[error("{message}")]
    NotImplemented {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected failure during dispatch or persistence.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl ArchiveError {
    /// Creates a validation error (400).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error (401).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a forbidden error (403).
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a not-found error (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an unsupported-media error (406).
    pub fn unsupported_media(message: impl Into<String>) -> Self {
        Self::UnsupportedMedia {
            message: message.into(),
        }
    }

    /// Creates a not-implemented error (501).
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    /// Creates an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UnsupportedMedia { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message text.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::UnsupportedMedia { message }
            | Self::NotImplemented { message }
            | Self::Internal { message } => message,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ArchiveError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ArchiveError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ArchiveError::forbidden("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ArchiveError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ArchiveError::unsupported_media("x").status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            ArchiveError::not_implemented("x").status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            ArchiveError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_passthrough() {
        let err = ArchiveError::validation("fromOffset must not be negative");
        assert_eq!(err.message(), "fromOffset must not be negative");
        assert_eq!(err.to_string(), "fromOffset must not be negative");
    }

    #[test]
    fn test_io_error_maps_to_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ArchiveError::from(io);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("disk gone"));
    }
}
