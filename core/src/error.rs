//! Error types for the Follow Rivers client.
//!
//! # Design
//! Network failures (status 0) are kept apart from server-reported failures
//! (status >= 400). Server failures carry the parsed problem-details body so
//! the UI can render field-level validation messages separately from the
//! display message.

use std::collections::BTreeMap;

use crate::storage::StorageError;
use crate::types::ProblemDetails;

/// Errors returned by transport, services and the session.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server could not be reached.
    #[error("could not connect to the Follow Rivers API")]
    Network { cause: String },

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Option<ProblemDetails>,
    },

    /// Credentials were rejected.
    #[error("{0}")]
    Unauthorized(String),

    /// A local precondition for the operation does not hold.
    #[error("{0}")]
    Precondition(String),

    /// A link or URL supplied by the server cannot be followed.
    #[error("{0}")]
    InvalidLink(String),

    /// The caller cancelled the operation before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// The operation needed a response body and the server sent none.
    #[error("response body was empty")]
    EmptyBody,

    /// The durable session slot could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The response was valid JSON but not the expected shape.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),
}

impl ApiError {
    /// Builds the error for a non-2xx response, choosing the message from
    /// `title`, then `detail`, then a generic fallback.
    pub fn from_status(status: u16, details: Option<ProblemDetails>) -> Self {
        let message = details
            .as_ref()
            .and_then(|d| non_empty(d.title.as_deref()).or_else(|| non_empty(d.detail.as_deref())))
            .map(str::to_string)
            .unwrap_or_else(|| format!("API error ({status})"));
        ApiError::Http {
            status,
            message,
            details,
        }
    }

    /// Numeric status: the HTTP status for server errors, 401 for rejected
    /// credentials, 0 for everything that never reached the server.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Http { status, .. } => *status,
            ApiError::Unauthorized(_) => 401,
            _ => 0,
        }
    }

    pub fn details(&self) -> Option<&ProblemDetails> {
        match self {
            ApiError::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Field-level validation messages carried by a server error, if any.
pub fn validation_errors(error: &ApiError) -> Option<&BTreeMap<String, Vec<String>>> {
    error.details().and_then(|d| d.errors.as_ref())
}

/// Message suitable for showing to a user: the problem `detail` when the
/// server sent one, otherwise the error's own message.
pub fn display_message(error: &ApiError) -> String {
    match error.details().and_then(|d| non_empty(d.detail.as_deref())) {
        Some(detail) => detail.to_string(),
        None => error.to_string(),
    }
}
