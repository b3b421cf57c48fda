//! Shared fixtures for socket-level relay tests.
//!
//! [`CachePeer`] binds a real Unix socket in a temporary directory and serves
//! any [`LineProtocol`] through the crate's own listener, so the relay is
//! exercised against the same one-line-per-connection contract as the cache
//! process.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use jitlog_relay::command::ProtocolError;
use jitlog_relay::endpoints::{JitlogRecord, StoreError};
use jitlog_relay::peer::{ListenerHandle, SocketListener};
use jitlog_relay::{
    BackendError, CacheBackend, CacheProtocol, InProcessExecutor, LineProtocol, RecordStore,
    Relay, SocketTransport,
};
use jitlog_relay_config::{CacheSocket, RelayMode};
use serde_json::{Value, json};

/// Checksum of the log registered in [`SingleRecordStore`].
pub const PROFILE: &str = "abc123";
/// Path of the log registered in [`SingleRecordStore`].
pub const LOG_PATH: &str = "/var/logs/x.jitlog";

/// Deterministic cache backend shared by the live peer and the stand-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureBackend;

impl CacheBackend for FixtureBackend {
    fn meta(&self, filename: &str, profile: &str) -> Result<Value, BackendError> {
        Ok(json!({ "resops": {}, "file": filename, "profile": profile }))
    }

    fn trace(&self, _filename: &str, _profile: &str, uid: i64) -> Result<Value, BackendError> {
        if uid == 42 {
            Ok(json!({ "trace": [] }))
        } else {
            Err(BackendError::new(format!("trace {uid} does not exist")))
        }
    }

    fn stitch(&self, _filename: &str, _profile: &str, uid: i64) -> Result<Value, BackendError> {
        Ok(json!({ "stitches": [uid] }))
    }
}

/// The fixture protocol behind an `Arc`.
pub fn fixture_protocol() -> Arc<dyn LineProtocol> {
    Arc::new(CacheProtocol::new(FixtureBackend))
}

/// Protocol that records every received line and answers with a fixed body.
#[derive(Debug)]
pub struct RecordingProtocol {
    lines: Mutex<Vec<Vec<u8>>>,
    reply: Vec<u8>,
}

impl RecordingProtocol {
    pub fn new(reply: &[u8]) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            reply: reply.to_vec(),
        }
    }

    pub fn lines(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .lines
            .lock()
            .map_err(|error| anyhow!("lock recorded lines: {error}"))?
            .clone())
    }
}

impl LineProtocol for RecordingProtocol {
    fn line_received(&self, line: &[u8], out: &mut dyn Write) -> Result<(), ProtocolError> {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_vec());
        }
        out.write_all(&self.reply)?;
        Ok(())
    }
}

/// Protocol that writes its reply in two parts with a pause in between.
#[derive(Debug)]
pub struct PacedProtocol {
    pub head: Vec<u8>,
    pub tail: Vec<u8>,
    pub pause: Duration,
}

impl LineProtocol for PacedProtocol {
    fn line_received(&self, _line: &[u8], out: &mut dyn Write) -> Result<(), ProtocolError> {
        out.write_all(&self.head)?;
        out.flush()?;
        thread::sleep(self.pause);
        out.write_all(&self.tail)?;
        Ok(())
    }
}

/// A cache peer listening on a socket inside its own temporary directory.
pub struct CachePeer {
    socket: CacheSocket,
    handle: Option<ListenerHandle>,
    _dir: tempfile::TempDir,
}

impl CachePeer {
    /// Binds a fresh socket and serves `protocol` on it.
    pub fn spawn(protocol: Arc<dyn LineProtocol>) -> Result<Self> {
        let dir = tempfile::tempdir().context("create socket directory")?;
        let socket = socket_path(&dir, "cache.socket")?;
        let handle = SocketListener::bind(&socket)
            .context("bind cache peer")?
            .start(protocol)
            .context("start cache peer")?;
        Ok(Self {
            socket,
            handle: Some(handle),
            _dir: dir,
        })
    }

    pub fn socket(&self) -> &CacheSocket {
        &self.socket
    }

    /// Number of connections the peer has accepted.
    ///
    /// The accept loop polls, so a connection that has just been made may
    /// take a moment to be counted.
    pub fn connections(&self) -> usize {
        self.handle.as_ref().map_or(0, ListenerHandle::accepted)
    }

    /// Waits until at least `expected` connections have been counted.
    pub fn wait_for_connections(&self, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.connections() < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        self.connections()
    }

    /// Relay that always uses this peer.
    pub fn live_relay(&self) -> Relay {
        relay(RelayMode::Live, self.socket.clone())
    }
}

impl Drop for CachePeer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A socket path inside `dir`.
pub fn socket_path(dir: &tempfile::TempDir, name: &str) -> Result<CacheSocket> {
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name))
        .map_err(|path| anyhow!("non-utf8 temp path {}", path.display()))?;
    Ok(CacheSocket::new(path))
}

/// Relay over `socket` whose stand-in answers with [`FixtureBackend`].
pub fn relay(mode: RelayMode, socket: CacheSocket) -> Relay {
    Relay::new(
        mode,
        SocketTransport::new(socket, Duration::from_secs(2), Some(Duration::from_secs(5))),
        InProcessExecutor::new(fixture_protocol()),
    )
}

/// Record store holding one log for [`PROFILE`].
#[derive(Debug, Default)]
pub struct SingleRecordStore;

impl RecordStore for SingleRecordStore {
    fn find_by_checksum(&self, checksum: &str) -> Result<Vec<JitlogRecord>, StoreError> {
        if checksum == PROFILE {
            Ok(vec![JitlogRecord::new(PROFILE, LOG_PATH)])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Sink that timestamps every write it receives.
#[derive(Debug, Default)]
pub struct TimedSink {
    pub writes: Vec<(Instant, Vec<u8>)>,
}

impl TimedSink {
    pub fn bytes(&self) -> Vec<u8> {
        self.writes
            .iter()
            .flat_map(|(_, data)| data.iter().copied())
            .collect()
    }
}

impl Write for TimedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.push((Instant::now(), buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
