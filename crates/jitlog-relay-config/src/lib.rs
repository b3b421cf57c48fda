//! Shared configuration for the JIT-log command relay.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `JITRELAY_CONFIG_PATH`), then
//! `JITRELAY_*` environment variables, then command-line flags. The relay
//! library and the `jitrelay` binary both read the resulting [`Config`].

mod defaults;
mod logging;
mod mode;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CACHE_SOCKET, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_READ_TIMEOUT_MS,
    default_cache_socket, default_connect_timeout_ms, default_log_filter,
    default_log_filter_string, default_log_format, default_read_timeout_ms, default_relay_mode,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use mode::{RelayMode, RelayModeParseError};
pub use socket::{CacheSocket, SocketParseError, SocketPreparationError};

/// Resolved relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "JITRELAY")]
pub struct Config {
    /// Socket the cache process listens on.
    #[serde(default = "default_cache_socket")]
    pub cache_socket: CacheSocket,
    /// Policy used to pick the live socket or the in-process stand-in.
    #[serde(default = "default_relay_mode")]
    pub relay_mode: RelayMode,
    /// Upper bound on connecting to the cache socket, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Upper bound on a single socket read, in milliseconds; `0` waits forever.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log events.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_socket: default_cache_socket(),
            relay_mode: default_relay_mode(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Socket the cache process listens on.
    #[must_use]
    pub const fn cache_socket(&self) -> &CacheSocket {
        &self.cache_socket
    }

    /// Route selection policy.
    #[must_use]
    pub const fn relay_mode(&self) -> RelayMode {
        self.relay_mode
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a [`Duration`], or `None` when reads may block forever.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.read_timeout_ms))
        }
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for log events.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
