//! In-process stand-in for the cache process.
//!
//! Used only when no cache socket is available: the command line is handed
//! to a [`LineProtocol`] implementation in this process and everything it
//! writes is captured in memory and returned as the response. This path never
//! exercises a real process boundary and must not be relied on in production.

mod executor;
mod protocol;

pub use executor::InProcessExecutor;
#[cfg(test)]
pub(crate) use protocol::MockCacheBackend;
pub use protocol::{BackendError, CacheBackend, CacheProtocol, DetachedBackend, LineProtocol};

const FALLBACK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::fallback");
