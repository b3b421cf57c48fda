//! The three command shapes understood by the cache process.

use std::fmt;

use super::{CommandArgs, CommandLine, CommandTemplate, FormatError, ProtocolError};

/// Command verbs accepted by the cache process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Log-level metadata.
    Meta,
    /// A single trace.
    Trace,
    /// The stitched bridges of a trace.
    Stitch,
}

impl Verb {
    /// Wire spelling of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Trace => "trace",
            Self::Stitch => "stitch",
        }
    }

    /// Canonical template for the verb.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::Meta => "meta {filename} {profile}",
            Self::Trace => "trace {filename} {profile} {uid}",
            Self::Stitch => "stitch {filename} {profile} {uid}",
        }
    }

    /// Number of positional arguments following the verb.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Meta => 2,
            Self::Trace | Self::Stitch => 3,
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "meta" => Some(Self::Meta),
            "trace" => Some(Self::Trace),
            "stitch" => Some(Self::Stitch),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A typed command, one per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `meta <filename> <profile>`
    Meta {
        /// Server-side path of the log file.
        filename: String,
        /// Profile checksum.
        profile: String,
    },
    /// `trace <filename> <profile> <uid>`
    Trace {
        /// Server-side path of the log file.
        filename: String,
        /// Profile checksum.
        profile: String,
        /// Trace identifier.
        uid: i64,
    },
    /// `stitch <filename> <profile> <uid>`
    Stitch {
        /// Server-side path of the log file.
        filename: String,
        /// Profile checksum.
        profile: String,
        /// Trace identifier.
        uid: i64,
    },
}

impl Command {
    /// The command's verb.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Meta { .. } => Verb::Meta,
            Self::Trace { .. } => Verb::Trace,
            Self::Stitch { .. } => Verb::Stitch,
        }
    }

    /// Named arguments matching [`Verb::template`].
    #[must_use]
    pub fn args(&self) -> CommandArgs {
        match self {
            Self::Meta { filename, profile } => CommandArgs::new()
                .with("filename", filename)
                .with("profile", profile),
            Self::Trace {
                filename,
                profile,
                uid,
            }
            | Self::Stitch {
                filename,
                profile,
                uid,
            } => CommandArgs::new()
                .with("filename", filename)
                .with("profile", profile)
                .with("uid", uid),
        }
    }

    /// Renders the command through its canonical template.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidArgument`] when the filename or profile
    /// would break the line framing.
    pub fn to_line(&self) -> Result<CommandLine, FormatError> {
        CommandTemplate::parse(self.verb().template())?.render(&self.args())
    }

    /// Parses a received line; a trailing CRLF or LF is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing the first problem found.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidEncoding)?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        let text = text.strip_suffix('\r').unwrap_or(text);

        let mut tokens = text.split_whitespace();
        let token = tokens.next().ok_or(ProtocolError::EmptyLine)?;
        let verb = Verb::from_token(token).ok_or_else(|| ProtocolError::UnknownVerb {
            verb: token.to_owned(),
        })?;
        let rest: Vec<&str> = tokens.collect();
        if rest.len() != verb.arity() {
            return Err(ProtocolError::WrongArity {
                verb: verb.as_str(),
                expected: verb.arity(),
                found: rest.len(),
            });
        }

        match (verb, rest.as_slice()) {
            (Verb::Meta, [filename, profile]) => Ok(Self::Meta {
                filename: (*filename).to_owned(),
                profile: (*profile).to_owned(),
            }),
            (Verb::Trace, [filename, profile, uid]) => Ok(Self::Trace {
                filename: (*filename).to_owned(),
                profile: (*profile).to_owned(),
                uid: parse_uid(uid)?,
            }),
            (Verb::Stitch, [filename, profile, uid]) => Ok(Self::Stitch {
                filename: (*filename).to_owned(),
                profile: (*profile).to_owned(),
                uid: parse_uid(uid)?,
            }),
            _ => Err(ProtocolError::WrongArity {
                verb: verb.as_str(),
                expected: verb.arity(),
                found: rest.len(),
            }),
        }
    }
}

fn parse_uid(token: &str) -> Result<i64, ProtocolError> {
    token.parse().map_err(|_| ProtocolError::InvalidUid {
        value: token.to_owned(),
    })
}
