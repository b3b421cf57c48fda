//! CLI argument definitions for `jitrelay`.

use clap::{Parser, Subcommand};

use crate::command::Command;

/// Relays one read command to the JIT log cache and prints the response.
#[derive(Parser, Debug)]
#[command(name = "jitrelay", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The cache command to relay.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Cache commands accepted on the command line.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Fetches metadata for a whole log.
    Meta {
        /// Path of the JIT log file.
        #[arg(value_name = "FILE")]
        file: String,
        /// Profile identifier of the log.
        #[arg(value_name = "PROFILE")]
        profile: String,
    },
    /// Fetches one trace of a log.
    Trace {
        /// Path of the JIT log file.
        #[arg(value_name = "FILE")]
        file: String,
        /// Profile identifier of the log.
        #[arg(value_name = "PROFILE")]
        profile: String,
        /// Trace identifier.
        #[arg(value_name = "UID", allow_hyphen_values = true)]
        uid: i64,
    },
    /// Fetches the stitched bridges of a trace.
    Stitch {
        /// Path of the JIT log file.
        #[arg(value_name = "FILE")]
        file: String,
        /// Profile identifier of the log.
        #[arg(value_name = "PROFILE")]
        profile: String,
        /// Trace identifier.
        #[arg(value_name = "UID", allow_hyphen_values = true)]
        uid: i64,
    },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Meta { file, profile } => Self::Meta {
                filename: file,
                profile,
            },
            CliCommand::Trace { file, profile, uid } => Self::Trace {
                filename: file,
                profile,
                uid,
            },
            CliCommand::Stitch { file, profile, uid } => Self::Stitch {
                filename: file,
                profile,
                uid,
            },
        }
    }
}
