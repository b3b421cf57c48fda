//! Error taxonomy for the relay and its translation into HTTP responses.
//!
//! Lookup and validation failures carry a client-facing message and map to
//! 404 or 400. Everything else, including every transport failure, maps to
//! 500 with a fixed message so socket paths and peer details never reach the
//! client.

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::command::{FormatError, ProtocolError};

/// Message returned for every failure that is not a lookup or validation error.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

const NOT_FOUND_MESSAGE: &str = "not found";

/// Errors surfaced while serving a relayed read request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No matching log record, or a mandatory parameter was absent.
    #[error("{}", .message.as_deref().unwrap_or(NOT_FOUND_MESSAGE))]
    NotFound {
        /// Client-facing message; `None` renders as "not found".
        message: Option<String>,
    },
    /// The request was malformed or ambiguous.
    #[error("{message}")]
    BadRequest {
        /// Client-facing message.
        message: String,
    },
    /// The command line could not be built.
    #[error("failed to format command: {0}")]
    Format(#[from] FormatError),
    /// Connecting to the cache socket failed.
    #[error("failed to connect to cache at {endpoint}: {source}")]
    Connect {
        /// Socket that was dialled.
        endpoint: String,
        /// Underlying connect failure.
        #[source]
        source: io::Error,
    },
    /// Writing the command to the socket failed.
    #[error("failed to send command to cache: {0}")]
    SendCommand(#[source] io::Error),
    /// Reading the response from the socket failed.
    #[error("failed to read response from cache: {0}")]
    ReadResponse(#[source] io::Error),
    /// A socket operation exceeded its configured bound.
    #[error("cache did not respond within the configured timeout: {0}")]
    Timeout(#[source] io::Error),
    /// Writing to the output sink failed.
    #[error("failed to forward cache response: {0}")]
    ForwardResponse(#[source] io::Error),
    /// The in-process stand-in rejected the command.
    #[error("in-process cache failed: {0}")]
    Fallback(#[from] ProtocolError),
    /// The record store failed for reasons other than a missing record.
    #[error("record store failure: {message}")]
    Store {
        /// Store failure description; never shown to clients.
        message: String,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
}

impl RelayError {
    /// Creates a not-found error with a client-facing message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: Some(message.into()),
        }
    }

    /// Creates a bare not-found error.
    #[must_use]
    pub const fn not_found_bare() -> Self {
        Self::NotFound { message: None }
    }

    /// Creates a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// HTTP status code the error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::BadRequest { .. } => 400,
            _ => 500,
        }
    }

    /// Returns true for failures of the socket itself, as opposed to a
    /// response that arrived and encodes an error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::SendCommand(_)
                | Self::ReadResponse(_)
                | Self::Timeout(_)
                | Self::ForwardResponse(_)
        )
    }

    /// Translates the error into the JSON body returned to clients.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        let code = self.status_code();
        let message = match self {
            Self::NotFound { .. } | Self::BadRequest { .. } => self.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_owned(),
        };
        ErrorBody { code, message }
    }
}

/// JSON error document: `{"code": <status>, "message": <text>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Client-facing message.
    pub message: String,
}

impl ErrorBody {
    /// Serialises the body; falls back to a fixed document if encoding fails.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            format!(
                "{{\"code\":{},\"message\":\"{INTERNAL_ERROR_MESSAGE}\"}}",
                self.code
            )
            .into_bytes()
        })
    }
}
