//! Listener implementation for the cache socket.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use jitlog_relay_config::CacheSocket;
use tracing::{debug, info, warn};

use crate::fallback::LineProtocol;

use super::{ListenerError, PEER_TARGET, ProtocolConnectionHandler};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a cache socket file.
#[derive(Debug)]
pub struct SocketListener {
    socket: CacheSocket,
    listener: UnixListener,
}

impl SocketListener {
    /// Binds the socket, replacing a stale socket file left by a dead peer.
    ///
    /// Missing parent directories are created first.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::InUse`] when another process is listening,
    /// [`ListenerError::NotSocket`] when the path is a regular file, and
    /// [`ListenerError::Bind`] when binding fails.
    pub fn bind(socket: &CacheSocket) -> Result<Self, ListenerError> {
        socket.prepare_filesystem()?;
        let listener = bind_unix(socket.path().as_std_path())?;
        Ok(Self {
            socket: socket.clone(),
            listener,
        })
    }

    /// Starts accepting connections on a background thread.
    ///
    /// Each accepted connection is served on its own thread by `protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the listener cannot be
    /// switched to non-blocking mode.
    pub fn start(self, protocol: Arc<dyn LineProtocol>) -> Result<ListenerHandle, ListenerError> {
        let handler = ProtocolConnectionHandler::new(protocol);
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_unix_socket(&self.socket);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let accepted = Arc::new(AtomicUsize::new(0));
        let shutdown_flag = Arc::clone(&shutdown);
        let accepted_count = Arc::clone(&accepted);
        let handle =
            thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &accepted_count, &handler));
        Ok(ListenerHandle {
            shutdown,
            accepted,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    accepted: Arc<AtomicUsize>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stops the accept loop and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        self.shutdown();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    accepted: &AtomicUsize,
    handler: &ProtocolConnectionHandler,
) {
    info!(
        target: PEER_TARGET,
        endpoint = %listener.socket,
        "cache socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                accepted.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                thread::spawn(move || handler.handle(stream));
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: PEER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    cleanup_unix_socket(&listener.socket);
    debug!(
        target: PEER_TARGET,
        endpoint = %listener.socket,
        "cache socket listener stopped"
    );
}

fn accept_connection(listener: &UnixListener) -> io::Result<Option<UnixStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| ListenerError::Metadata {
            path: path.display().to_string(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::NotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::InUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::Cleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::Probe {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        path: path.display().to_string(),
        source,
    })
}

fn cleanup_unix_socket(socket: &CacheSocket) {
    if let Err(error) = fs::remove_file(socket.path().as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: PEER_TARGET,
            error = %error,
            path = %socket.path(),
            "failed to remove unix socket file"
        );
    }
}
