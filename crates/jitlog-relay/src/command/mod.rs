//! Command formatting for the cache line protocol.
//!
//! A command is one line of whitespace-separated tokens terminated by CRLF:
//! the verb followed by its positional arguments. The formatter renders named
//! templates into [`CommandLine`] values and validates every interpolated
//! token; [`Command::parse`] is the inverse used by protocol handlers.

mod template;
mod verb;

use std::fmt;

use thiserror::Error;

pub use template::{CommandArgs, CommandTemplate};
pub use verb::{Command, Verb};

/// Terminator appended to every command line.
pub const LINE_TERMINATOR: &str = "\r\n";

/// A fully rendered, CRLF-terminated command line.
///
/// Values can only be produced by rendering a template, so every instance
/// carries exactly one terminator and validated tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    text: String,
}

impl CommandLine {
    fn from_rendered(text: String) -> Self {
        Self { text }
    }

    /// The line including its terminator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// UTF-8 bytes sent to the peer in a single write.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// The line without its terminator, for logging.
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.text.trim_end_matches(LINE_TERMINATOR)
    }

    /// The first token of the line.
    #[must_use]
    pub fn verb(&self) -> &str {
        self.text.split(' ').next().unwrap_or_default().trim_end()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.trimmed())
    }
}

/// Errors raised while building a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The template text could not be parsed.
    #[error("malformed command template '{template}': {reason}")]
    MalformedTemplate {
        /// Template text as given.
        template: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A placeholder had no value.
    #[error("missing value for placeholder '{name}'")]
    MissingArgument {
        /// Placeholder name.
        name: String,
    },
    /// A value was supplied for a name the template never uses.
    #[error("unexpected argument '{name}' for command template")]
    UnexpectedArgument {
        /// Argument name.
        name: String,
    },
    /// A value would corrupt the line framing.
    #[error("invalid value for '{name}': {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl FormatError {
    fn malformed(template: &str, reason: &str) -> Self {
        Self::MalformedTemplate {
            template: template.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn invalid_argument(name: &str, reason: &str) -> Self {
        Self::InvalidArgument {
            name: name.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

/// Errors raised while interpreting a received command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line was not valid UTF-8.
    #[error("command line is not valid UTF-8")]
    InvalidEncoding,
    /// The line carried no tokens.
    #[error("empty command line")]
    EmptyLine,
    /// The first token is not a known verb.
    #[error("unknown command '{verb}'")]
    UnknownVerb {
        /// The unrecognised token.
        verb: String,
    },
    /// The verb received the wrong number of arguments.
    #[error("command '{verb}' expects {expected} arguments, got {found}")]
    WrongArity {
        /// Verb of the line.
        verb: &'static str,
        /// Arguments the verb takes.
        expected: usize,
        /// Arguments the line carried.
        found: usize,
    },
    /// The uid token was not an integer.
    #[error("uid '{value}' is not an integer")]
    InvalidUid {
        /// The offending token.
        value: String,
    },
    /// Writing the response failed.
    #[error("failed to write response: {message}")]
    Write {
        /// Underlying failure.
        message: String,
    },
}

impl From<std::io::Error> for ProtocolError {
    fn from(error: std::io::Error) -> Self {
        Self::Write {
            message: error.to_string(),
        }
    }
}
