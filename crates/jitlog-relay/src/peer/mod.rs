//! Socket listener that serves a [`LineProtocol`](crate::fallback::LineProtocol).
//!
//! The listener binds the cache socket, accepts connections on a background
//! thread and answers exactly one command per connection before closing it,
//! which is the contract the relay's transport expects from the cache
//! process.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub use self::handler::{MAX_REQUEST_BYTES, ProtocolConnectionHandler};
pub use self::listener::{ListenerHandle, SocketListener};

const PEER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::peer");
