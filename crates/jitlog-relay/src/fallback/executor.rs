//! Executes commands against an in-process protocol handler.

use std::sync::Arc;

use tracing::warn;

use crate::command::CommandLine;
use crate::errors::RelayError;

use super::{CacheProtocol, DetachedBackend, FALLBACK_TARGET, LineProtocol};

/// Runs command lines through an in-process [`LineProtocol`].
#[derive(Clone)]
pub struct InProcessExecutor {
    protocol: Arc<dyn LineProtocol>,
}

impl InProcessExecutor {
    /// Wraps a protocol handler.
    pub fn new(protocol: Arc<dyn LineProtocol>) -> Self {
        Self { protocol }
    }

    /// Executor answering every command with a "cache not running" payload.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(CacheProtocol::new(DetachedBackend)))
    }

    /// Feeds `line` to the handler and returns everything it wrote.
    ///
    /// # Errors
    ///
    /// Handler failures propagate unchanged as [`RelayError::Fallback`].
    pub fn execute(&self, line: &CommandLine) -> Result<Vec<u8>, RelayError> {
        warn!(
            target: FALLBACK_TARGET,
            verb = line.verb(),
            "answering from the in-process cache; no cache process is reachable"
        );
        let mut buffer = Vec::new();
        self.protocol.line_received(line.as_bytes(), &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for InProcessExecutor {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for InProcessExecutor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InProcessExecutor")
            .finish_non_exhaustive()
    }
}
