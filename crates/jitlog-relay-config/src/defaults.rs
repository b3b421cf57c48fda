use crate::logging::LogFormat;
use crate::mode::RelayMode;
use crate::socket::CacheSocket;

/// Socket file name shared with the cache process deployment.
pub const DEFAULT_CACHE_SOCKET: &str = "cache.socket";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bound on establishing the socket connection, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default bound on a single socket read, in milliseconds. `0` disables it.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default route selection policy.
#[must_use]
pub const fn default_relay_mode() -> RelayMode {
    RelayMode::Auto
}

/// Socket the cache process listens on unless configured otherwise.
#[must_use]
pub fn default_cache_socket() -> CacheSocket {
    CacheSocket::new(DEFAULT_CACHE_SOCKET)
}

/// Default connect timeout in milliseconds.
#[must_use]
pub const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default read timeout in milliseconds.
#[must_use]
pub const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}
