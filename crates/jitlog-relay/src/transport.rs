//! Socket transport to the cache process.
//!
//! Each call opens one Unix stream connection, writes one command line, then
//! relays the response in fixed-size chunks until the peer closes the
//! connection. There is no framing: end of stream is the end of the
//! response. The stream is owned by the call and closed on every exit path.

use std::io::{self, Read, Write};
use std::time::Duration;

use jitlog_relay_config::{CacheSocket, Config};
use tracing::{debug, trace};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use crate::command::CommandLine;
use crate::errors::RelayError;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Size of each read from the socket.
pub const CHUNK_SIZE: usize = 4096;

/// Client for the cache process's Unix socket.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    socket: CacheSocket,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
}

impl SocketTransport {
    /// Builds a transport for `socket` with explicit bounds.
    #[must_use]
    pub const fn new(
        socket: CacheSocket,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            socket,
            connect_timeout,
            read_timeout,
        }
    }

    /// Builds a transport from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cache_socket().clone(),
            config.connect_timeout(),
            config.read_timeout(),
        )
    }

    /// Socket this transport connects to.
    #[must_use]
    pub const fn socket(&self) -> &CacheSocket {
        &self.socket
    }

    /// Connects, sends `line` and streams the response into `sink`.
    ///
    /// Returns the number of response bytes relayed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connect`], [`RelayError::SendCommand`],
    /// [`RelayError::ReadResponse`], [`RelayError::Timeout`] or
    /// [`RelayError::ForwardResponse`] depending on which step failed.
    #[cfg(unix)]
    pub fn send<W>(&self, line: &CommandLine, sink: &mut W) -> Result<u64, RelayError>
    where
        W: Write + ?Sized,
    {
        let stream = self.connect()?;
        exchange(stream, line, sink)
    }

    /// Opens a connection to the socket with the configured bounds applied.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connect`] when the peer is absent, refuses the
    /// connection, or does not accept within the connect timeout.
    #[cfg(unix)]
    pub fn connect(&self) -> Result<UnixStream, RelayError> {
        self.open().map_err(|source| RelayError::Connect {
            endpoint: self.socket.to_string(),
            source,
        })
    }

    #[cfg(unix)]
    pub(crate) fn open(&self) -> io::Result<UnixStream> {
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        let address = SockAddr::unix(self.socket.path().as_std_path())?;
        socket.connect_timeout(&address, self.connect_timeout)?;
        let stream = UnixStream::from(std::os::fd::OwnedFd::from(socket));
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.read_timeout)?;
        debug!(
            target: TRANSPORT_TARGET,
            endpoint = %self.socket,
            "connected to cache socket"
        );
        Ok(stream)
    }

    /// Unix sockets are unavailable on this platform.
    ///
    /// # Errors
    ///
    /// Always returns [`RelayError::UnsupportedUnixTransport`].
    #[cfg(not(unix))]
    pub fn send<W>(&self, _line: &CommandLine, _sink: &mut W) -> Result<u64, RelayError>
    where
        W: Write + ?Sized,
    {
        Err(RelayError::UnsupportedUnixTransport(self.socket.to_string()))
    }
}

/// Writes `line` to `stream` and relays everything it returns into `sink`.
///
/// Consumes the stream so the connection is released as soon as the exchange
/// finishes, whether it succeeded or not.
///
/// # Errors
///
/// See [`SocketTransport::send`].
pub fn exchange<S, W>(mut stream: S, line: &CommandLine, sink: &mut W) -> Result<u64, RelayError>
where
    S: Read + Write,
    W: Write + ?Sized,
{
    stream
        .write_all(line.as_bytes())
        .map_err(|error| classify(error, RelayError::SendCommand))?;
    stream
        .flush()
        .map_err(|error| classify(error, RelayError::SendCommand))?;

    let mut chunk = [0_u8; CHUNK_SIZE];
    let mut relayed = 0_u64;
    loop {
        let bytes_read = read_chunk_with_retry(&mut stream, &mut chunk)
            .map_err(|error| classify(error, RelayError::ReadResponse))?;
        if bytes_read == 0 {
            break;
        }
        let Some(data) = chunk.get(..bytes_read) else {
            break;
        };
        sink.write_all(data).map_err(RelayError::ForwardResponse)?;
        sink.flush().map_err(RelayError::ForwardResponse)?;
        relayed += bytes_read as u64;
        trace!(
            target: TRANSPORT_TARGET,
            bytes = bytes_read,
            total = relayed,
            "forwarded response chunk"
        );
    }

    debug!(
        target: TRANSPORT_TARGET,
        verb = line.verb(),
        bytes = relayed,
        "cache closed the connection"
    );
    Ok(relayed)
}

fn read_chunk_with_retry<R>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize>
where
    R: Read,
{
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

fn classify(error: io::Error, otherwise: fn(io::Error) -> RelayError) -> RelayError {
    if is_timeout(&error) {
        RelayError::Timeout(error)
    } else {
        otherwise(error)
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Determines whether a connect error means nothing is listening.
///
/// Refused connections, missing socket files and unassignable addresses
/// indicate the cache process is not running. Other failures, such as
/// permission errors or timeouts, are real transport errors.
#[must_use]
pub fn is_cache_absent(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;
    use crate::command::Command;

    /// In-memory stream that records writes and replays canned reads.
    struct ScriptedStream {
        written: Vec<u8>,
        reads: Vec<io::Result<Vec<u8>>>,
        write_failure: Option<io::ErrorKind>,
    }

    impl ScriptedStream {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            let mut reads = reads;
            reads.reverse();
            Self {
                written: Vec::new(),
                reads,
                write_failure: None,
            }
        }

        fn rejecting_writes(kind: io::ErrorKind) -> Self {
            Self {
                write_failure: Some(kind),
                ..Self::new(vec![Ok(b"{}".to_vec())])
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop() {
                None => Ok(0),
                Some(Ok(data)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                Some(Err(error)) => Err(error),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_failure {
                return Err(io::Error::from(kind));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink that counts write calls.
    #[derive(Default)]
    struct CountingSink {
        data: Vec<u8>,
        writes: usize,
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn meta_line() -> CommandLine {
        Command::Meta {
            filename: String::from("/var/logs/x.jitlog"),
            profile: String::from("abc123"),
        }
        .to_line()
        .expect("render meta")
    }

    #[test]
    fn writes_command_then_relays_chunks_in_order() {
        let mut stream = ScriptedStream::new(vec![
            Ok(b"{\"meta\":".to_vec()),
            Ok(b"{}}".to_vec()),
        ]);
        let mut sink = CountingSink::default();
        let relayed = exchange(&mut stream, &meta_line(), &mut sink).expect("exchange");

        assert_eq!(stream.written, b"meta /var/logs/x.jitlog abc123\r\n");
        assert_eq!(sink.data, b"{\"meta\":{}}");
        assert_eq!(sink.writes, 2);
        assert_eq!(relayed, 11);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut stream = ScriptedStream::new(vec![
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(b"{}".to_vec()),
        ]);
        let mut sink = Vec::new();
        exchange(&mut stream, &meta_line(), &mut sink).expect("exchange");
        assert_eq!(sink, b"{}");
    }

    #[rstest]
    #[case(io::ErrorKind::WouldBlock)]
    #[case(io::ErrorKind::TimedOut)]
    fn stalled_reads_become_timeouts(#[case] kind: io::ErrorKind) {
        let mut stream = ScriptedStream::new(vec![Ok(b"{".to_vec()), Err(io::Error::from(kind))]);
        let mut sink = Vec::new();
        let error = exchange(&mut stream, &meta_line(), &mut sink).expect_err("should time out");
        assert!(matches!(error, RelayError::Timeout(_)));
        assert_eq!(sink, b"{", "bytes before the stall are still forwarded");
    }

    #[rstest]
    #[case(io::ErrorKind::BrokenPipe, false)]
    #[case(io::ErrorKind::ConnectionReset, false)]
    #[case(io::ErrorKind::WouldBlock, true)]
    fn failed_command_writes_stop_before_reading(
        #[case] kind: io::ErrorKind,
        #[case] timed_out: bool,
    ) {
        let mut stream = ScriptedStream::rejecting_writes(kind);
        let mut sink = CountingSink::default();

        let error = exchange(&mut stream, &meta_line(), &mut sink).expect_err("write fails");

        if timed_out {
            assert!(matches!(error, RelayError::Timeout(_)), "{error:?}");
        } else {
            assert!(matches!(error, RelayError::SendCommand(_)), "{error:?}");
        }
        assert!(stream.written.is_empty());
        assert_eq!(stream.reads.len(), 1, "the response is never read");
        assert_eq!(sink.writes, 0);
    }

    #[test]
    fn read_failures_surface() {
        let mut stream =
            ScriptedStream::new(vec![Err(io::Error::from(io::ErrorKind::ConnectionReset))]);
        let mut sink = Vec::new();
        let error = exchange(&mut stream, &meta_line(), &mut sink).expect_err("read fails");
        assert!(matches!(error, RelayError::ReadResponse(_)));
    }

    #[test]
    fn sink_failures_abort_the_relay() {
        let mut stream = ScriptedStream::new(vec![Ok(b"{}".to_vec()), Ok(b"more".to_vec())]);
        let error = exchange(&mut stream, &meta_line(), &mut BrokenSink).expect_err("sink fails");
        assert!(matches!(error, RelayError::ForwardResponse(_)));
        assert_eq!(stream.reads.len(), 1, "no reads after the sink failed");
    }

    #[test]
    fn empty_response_is_not_an_error() {
        let mut stream = ScriptedStream::new(Vec::new());
        let mut sink = Cursor::new(Vec::new());
        let relayed = exchange(&mut stream, &meta_line(), &mut sink).expect("exchange");
        assert_eq!(relayed, 0);
    }

    #[rstest]
    #[case(io::ErrorKind::ConnectionRefused, true)]
    #[case(io::ErrorKind::NotFound, true)]
    #[case(io::ErrorKind::AddrNotAvailable, true)]
    #[case(io::ErrorKind::PermissionDenied, false)]
    #[case(io::ErrorKind::TimedOut, false)]
    fn classifies_absent_cache(#[case] kind: io::ErrorKind, #[case] absent: bool) {
        assert_eq!(is_cache_absent(&io::Error::from(kind)), absent);
    }
}
