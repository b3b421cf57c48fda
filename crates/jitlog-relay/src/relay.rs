//! The relay façade used by every read endpoint.
//!
//! A [`Relay`] formats one command, chooses the live socket or the
//! in-process stand-in according to its [`RelayMode`], and streams the
//! response into the caller's sink. The mode is fixed at construction; the
//! relay applies no retries of its own.

use std::fmt;
use std::io::Write;

use jitlog_relay_config::{Config, RelayMode};
use tracing::{debug, info};

use crate::command::{Command, CommandArgs, CommandLine, CommandTemplate};
use crate::errors::RelayError;
use crate::fallback::InProcessExecutor;
use crate::transport::SocketTransport;

const RELAY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::relay");

/// Path a command took to its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The cache process answered over its socket.
    Live,
    /// The in-process stand-in answered.
    Fallback,
}

impl fmt::Display for Route {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        })
    }
}

/// Summary of a completed relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Which path answered.
    pub route: Route,
    /// Number of response bytes written to the sink.
    pub bytes: u64,
}

/// Forwards commands to the cache and streams responses into a sink.
#[derive(Debug, Clone)]
pub struct Relay {
    mode: RelayMode,
    transport: SocketTransport,
    fallback: InProcessExecutor,
}

impl Relay {
    /// Assembles a relay from its parts.
    #[must_use]
    pub const fn new(
        mode: RelayMode,
        transport: SocketTransport,
        fallback: InProcessExecutor,
    ) -> Self {
        Self {
            mode,
            transport,
            fallback,
        }
    }

    /// Builds a relay from configuration with the given stand-in.
    #[must_use]
    pub fn from_config(config: &Config, fallback: InProcessExecutor) -> Self {
        Self::new(
            config.relay_mode(),
            SocketTransport::from_config(config),
            fallback,
        )
    }

    /// Route selection policy in force.
    #[must_use]
    pub const fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Renders `template` with `args` and relays the result into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Format`] when the command cannot be rendered,
    /// otherwise any error from the chosen route.
    pub fn relay<W>(
        &self,
        sink: &mut W,
        template: &CommandTemplate,
        args: &CommandArgs,
    ) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        let line = template.render(args)?;
        self.relay_line(sink, &line)
    }

    /// Relays a typed command into `sink`.
    ///
    /// # Errors
    ///
    /// See [`Relay::relay`].
    pub fn relay_command<W>(
        &self,
        sink: &mut W,
        command: &Command,
    ) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        let line = command.to_line()?;
        self.relay_line(sink, &line)
    }

    /// Relays an already rendered line into `sink`.
    ///
    /// # Errors
    ///
    /// Returns the transport or stand-in error of the chosen route, or
    /// [`RelayError::ForwardResponse`] when the sink rejects the bytes.
    pub fn relay_line<W>(
        &self,
        sink: &mut W,
        line: &CommandLine,
    ) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        let outcome = match self.mode {
            RelayMode::Auto if self.transport.socket().exists() => self.live(sink, line)?,
            RelayMode::Auto | RelayMode::Fallback => self.fall_back(sink, line)?,
            RelayMode::Live => self.live(sink, line)?,
            RelayMode::Probe => self.probe(sink, line)?,
        };
        info!(
            target: RELAY_TARGET,
            verb = line.verb(),
            route = %outcome.route,
            bytes = outcome.bytes,
            "relayed cache command"
        );
        Ok(outcome)
    }

    fn live<W>(&self, sink: &mut W, line: &CommandLine) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        let bytes = self.transport.send(line, sink)?;
        Ok(RelayOutcome {
            route: Route::Live,
            bytes,
        })
    }

    fn fall_back<W>(&self, sink: &mut W, line: &CommandLine) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        let buffer = self.fallback.execute(line)?;
        sink.write_all(&buffer)
            .map_err(RelayError::ForwardResponse)?;
        sink.flush().map_err(RelayError::ForwardResponse)?;
        Ok(RelayOutcome {
            route: Route::Fallback,
            bytes: buffer.len() as u64,
        })
    }

    #[cfg(unix)]
    fn probe<W>(&self, sink: &mut W, line: &CommandLine) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        match self.transport.open() {
            Ok(stream) => {
                let bytes = crate::transport::exchange(stream, line, sink)?;
                Ok(RelayOutcome {
                    route: Route::Live,
                    bytes,
                })
            }
            Err(error) if crate::transport::is_cache_absent(&error) => {
                debug!(
                    target: RELAY_TARGET,
                    endpoint = %self.transport.socket(),
                    error = %error,
                    "cache probe found no listener"
                );
                self.fall_back(sink, line)
            }
            Err(source) => Err(RelayError::Connect {
                endpoint: self.transport.socket().to_string(),
                source,
            }),
        }
    }

    #[cfg(not(unix))]
    fn probe<W>(&self, sink: &mut W, line: &CommandLine) -> Result<RelayOutcome, RelayError>
    where
        W: Write + ?Sized,
    {
        self.fall_back(sink, line)
    }
}
