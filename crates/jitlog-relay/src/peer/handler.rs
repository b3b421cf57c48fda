//! Per-connection handling: one line in, one response out, then close.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tracing::warn;

use crate::fallback::LineProtocol;

use super::PEER_TARGET;

/// Upper bound on a single command line.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Serves one command per connection through a [`LineProtocol`].
#[derive(Clone)]
pub struct ProtocolConnectionHandler {
    protocol: Arc<dyn LineProtocol>,
}

impl ProtocolConnectionHandler {
    /// Wraps the protocol that answers each line.
    pub fn new(protocol: Arc<dyn LineProtocol>) -> Self {
        Self { protocol }
    }

    /// Reads one line from `stream`, writes the answer and closes the stream.
    ///
    /// Failures are logged; the connection is closed either way so the client
    /// sees end of stream.
    pub fn handle(&self, mut stream: UnixStream) {
        if let Err(error) = self.serve(&mut stream) {
            warn!(
                target: PEER_TARGET,
                error = %error,
                "connection handler error"
            );
        }
        if let Err(error) = stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            warn!(
                target: PEER_TARGET,
                error = %error,
                "failed to close connection"
            );
        }
    }

    fn serve(&self, stream: &mut UnixStream) -> io::Result<()> {
        let Some(line) = read_request_line(stream)? else {
            return Ok(());
        };
        self.protocol
            .line_received(&line, stream)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error.to_string()))?;
        stream.flush()
    }
}

impl std::fmt::Debug for ProtocolConnectionHandler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProtocolConnectionHandler")
            .finish_non_exhaustive()
    }
}

fn read_request_line<R: Read>(stream: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let bytes_read = read_chunk_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok(if buffer.is_empty() { None } else { Some(buffer) });
        }
        let received = chunk.get(..bytes_read).unwrap_or_default();
        if let Some(pos) = received.iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(received.get(..=pos).unwrap_or_default());
            enforce_request_limit(buffer.len())?;
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(received);
        enforce_request_limit(buffer.len())?;
    }
}

fn read_chunk_with_retry<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

fn enforce_request_limit(size: usize) -> io::Result<()> {
    if size > MAX_REQUEST_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "request exceeds maximum size",
        ));
    }
    Ok(())
}
