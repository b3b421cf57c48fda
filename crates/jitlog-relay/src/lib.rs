//! Relay for the JIT log cache process.
//!
//! Read requests for JIT log metadata, traces and stitches are turned into a
//! single CRLF-terminated command line, written to the cache process over a
//! Unix socket, and the response is streamed back to the caller unchanged.
//! When no cache process is deployed the same command is answered by an
//! in-process stand-in that speaks the identical line protocol.
//!
//! The crate also ships the `jitrelay` binary, which relays one command given
//! on the command line and prints the response to stdout.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::warn;

pub mod command;
pub mod endpoints;
pub mod errors;
pub mod fallback;
#[cfg(unix)]
pub mod peer;
pub mod relay;
pub mod telemetry;
pub mod transport;

mod cli;
mod config;


pub use command::{Command, CommandArgs, CommandLine, CommandTemplate, FormatError, Verb};
pub use endpoints::{Endpoints, HttpResponse, Query, RecordStore};
pub use errors::{ErrorBody, RelayError};
pub use fallback::{BackendError, CacheBackend, CacheProtocol, DetachedBackend, InProcessExecutor, LineProtocol};
pub use relay::{Relay, RelayOutcome, Route};
pub use transport::SocketTransport;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, prepare_cli_arguments, split_config_arguments};
use telemetry::TelemetryError;

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Runs the CLI using the provided arguments and IO handles.
///
/// The relayed response is streamed to `stdout`. On a relay failure the JSON
/// error document is written to `stderr` and the exit code is non-zero.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args, stdout, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(AppError::Relay(error)) => {
            warn!(target: CLI_TARGET, error = %error, "relay failed");
            let _ = stderr.write_all(&error.to_body().to_json());
            let _ = writeln!(stderr);
            ExitCode::FAILURE
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W, L>(args: &[OsString], stdout: &mut W, loader: &L) -> Result<(), AppError>
where
    W: Write,
    L: ConfigLoader,
{
    let split = split_config_arguments(args);
    let cli = Cli::try_parse_from(prepare_cli_arguments(args, &split)).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;

    let relay = Relay::from_config(&config, InProcessExecutor::detached());
    relay.relay_command(stdout, &Command::from(cli.command))?;
    Ok(())
}
