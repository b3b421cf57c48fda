//! Error types for socket listener operations.

use std::io;

use jitlog_relay_config::SocketPreparationError;
use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Binding the socket file failed.
    #[error("failed to bind unix listener at {path}: {source}")]
    Bind {
        /// Socket path.
        path: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// A live process already serves the socket.
    #[error("existing unix socket {path} is already in use")]
    InUse {
        /// Socket path.
        path: String,
    },
    /// The path exists but is not a socket.
    #[error("unix socket path {path} is not a socket")]
    NotSocket {
        /// Offending path.
        path: String,
    },
    /// Reading metadata of an existing path failed.
    #[error("failed to read metadata for unix socket {path}: {source}")]
    Metadata {
        /// Socket path.
        path: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[error("failed to connect to existing unix socket {path}: {source}")]
    Probe {
        /// Socket path.
        path: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// Removing a stale socket file failed.
    #[error("failed to remove stale unix socket {path}: {source}")]
    Cleanup {
        /// Socket path.
        path: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The socket's parent directory could not be created.
    #[error(transparent)]
    Prepare(#[from] SocketPreparationError),
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
