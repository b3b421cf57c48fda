//! Line protocol handling shared by the in-process stand-in and the socket peer.

use std::io::Write;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::command::{Command, ProtocolError};

use super::FALLBACK_TARGET;

/// Answers one command line by writing the response to `out`.
///
/// The same trait backs the in-process stand-in and any socket peer, so both
/// paths produce identical bytes for identical commands.
pub trait LineProtocol: Send + Sync {
    /// Handles a single received line.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when the response cannot be produced or
    /// written.
    fn line_received(&self, line: &[u8], out: &mut dyn Write) -> Result<(), ProtocolError>;
}

impl<T> LineProtocol for Arc<T>
where
    T: LineProtocol + ?Sized,
{
    fn line_received(&self, line: &[u8], out: &mut dyn Write) -> Result<(), ProtocolError> {
        (**self).line_received(line, out)
    }
}

/// Failure reported by a [`CacheBackend`]; encoded in-band by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Creates a backend error with the message returned to the caller.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Message embedded in the error payload.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Query engine behind the cache protocol.
#[cfg_attr(test, mockall::automock)]
pub trait CacheBackend: Send + Sync {
    /// Metadata for a whole log.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the log cannot be read.
    fn meta(&self, filename: &str, profile: &str) -> Result<Value, BackendError>;

    /// A single trace of a log.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the trace cannot be produced.
    fn trace(&self, filename: &str, profile: &str, uid: i64) -> Result<Value, BackendError>;

    /// The stitched bridges of a trace.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the stitches cannot be produced.
    fn stitch(&self, filename: &str, profile: &str, uid: i64) -> Result<Value, BackendError>;
}

/// Cache line protocol: parse, dispatch to the backend, write JSON.
///
/// Malformed lines and backend failures are both reported in-band as
/// `{"error": "<message>"}`, so every line gets a JSON document whether it is
/// answered over the socket or in process. Only write failures are raised.
#[derive(Debug, Clone, Default)]
pub struct CacheProtocol<B> {
    backend: B,
}

impl<B> CacheProtocol<B>
where
    B: CacheBackend,
{
    /// Wraps a backend.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    fn answer(&self, line: &[u8]) -> Value {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(error) => {
                debug!(
                    target: FALLBACK_TARGET,
                    error = %error,
                    "rejecting malformed cache command"
                );
                return json!({ "error": error.to_string() });
            }
        };
        debug!(
            target: FALLBACK_TARGET,
            verb = %command.verb(),
            "answering cache command"
        );
        let result = match &command {
            Command::Meta { filename, profile } => self.backend.meta(filename, profile),
            Command::Trace {
                filename,
                profile,
                uid,
            } => self.backend.trace(filename, profile, *uid),
            Command::Stitch {
                filename,
                profile,
                uid,
            } => self.backend.stitch(filename, profile, *uid),
        };
        result.unwrap_or_else(|error| json!({ "error": error.message() }))
    }
}

impl<B> LineProtocol for CacheProtocol<B>
where
    B: CacheBackend,
{
    fn line_received(&self, line: &[u8], out: &mut dyn Write) -> Result<(), ProtocolError> {
        let document = self.answer(line);
        serde_json::to_writer(&mut *out, &document).map_err(|error| ProtocolError::Write {
            message: error.to_string(),
        })?;
        out.flush()?;
        Ok(())
    }
}

/// Backend used when no cache process is deployed.
///
/// Every command is answered with an in-band error naming the missing cache
/// process. Never use it in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBackend;

impl DetachedBackend {
    const MESSAGE: &'static str = "jit log cache process is not running";
}

impl CacheBackend for DetachedBackend {
    fn meta(&self, _filename: &str, _profile: &str) -> Result<Value, BackendError> {
        Err(BackendError::new(Self::MESSAGE))
    }

    fn trace(&self, _filename: &str, _profile: &str, _uid: i64) -> Result<Value, BackendError> {
        Err(BackendError::new(Self::MESSAGE))
    }

    fn stitch(&self, _filename: &str, _profile: &str, _uid: i64) -> Result<Value, BackendError> {
        Err(BackendError::new(Self::MESSAGE))
    }
}
