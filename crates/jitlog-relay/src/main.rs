//! CLI entrypoint for the JIT log relay.
//!
//! Delegates to [`jitlog_relay::run`], which loads configuration, parses the
//! command and streams the cache response to stdout.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    jitlog_relay::run(std::env::args_os(), &mut stdout, &mut stderr)
}
