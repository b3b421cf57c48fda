use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Location of the cache process's Unix domain socket.
///
/// The relay only ever speaks to a local socket file, so the descriptor is a
/// single path. Configuration accepts either a bare path or a `unix://` URL.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct CacheSocket {
    path: Utf8PathBuf,
}

impl CacheSocket {
    /// Builds a socket descriptor from a filesystem path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Filesystem path of the socket file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_ref()
    }

    /// Reports whether the socket file is currently present on disk.
    ///
    /// Presence says nothing about whether a peer is listening; the check is
    /// racy and only used to pick a route.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    /// Ensures the socket's parent directory exists with restrictive permissions.
    ///
    /// # Errors
    ///
    /// Returns [`SocketPreparationError::CreateDirectory`] when the directory
    /// cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(parent) = self.path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Ok(());
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for CacheSocket {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unix://{}", self.path)
    }
}

impl FromStr for CacheSocket {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SocketParseError::Empty);
        }
        if !trimmed.contains("://") {
            return Ok(Self::new(trimmed));
        }

        let url = Url::parse(trimmed)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(SocketParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::new(path))
            }
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

impl TryFrom<String> for CacheSocket {
    type Error = SocketParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CacheSocket> for String {
    fn from(socket: CacheSocket) -> Self {
        socket.path.into_string()
    }
}

/// Errors encountered while parsing a [`CacheSocket`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// No path was supplied.
    #[error("cache socket path must not be empty")]
    Empty,
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'; only unix:// is accepted")]
    UnsupportedScheme(String),
    /// Unix socket path was absent from the URL.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Failed to create the socket's parent directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}
