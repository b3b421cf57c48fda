//! Named-placeholder templates rendered into CRLF-terminated command lines.

use std::fmt;

use super::{CommandLine, FormatError, LINE_TERMINATOR};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A command template such as `trace {filename} {profile} {uid}`.
///
/// `{name}` marks a placeholder; `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MalformedTemplate`] for unbalanced braces or
    /// empty placeholder names.
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(FormatError::malformed(source, "unterminated placeholder"));
                    }
                    let name = name.trim();
                    if name.is_empty() || name.contains('{') {
                        return Err(FormatError::malformed(source, "invalid placeholder name"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_owned()));
                }
                '}' => return Err(FormatError::malformed(source, "unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes `args` into the template and appends the CRLF terminator.
    ///
    /// Every placeholder must be supplied, every supplied argument must be
    /// named by the template, and no value may be empty or contain
    /// whitespace, since the peer splits the line on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingArgument`],
    /// [`FormatError::UnexpectedArgument`] or [`FormatError::InvalidArgument`].
    pub fn render(&self, args: &CommandArgs) -> Result<CommandLine, FormatError> {
        if let Some(name) = args
            .names()
            .find(|name| !self.placeholders().any(|placeholder| placeholder == *name))
        {
            return Err(FormatError::UnexpectedArgument {
                name: name.to_owned(),
            });
        }

        let mut text = String::with_capacity(self.source.len() + LINE_TERMINATOR.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Placeholder(name) => {
                    let value = args.get(name).ok_or_else(|| FormatError::MissingArgument {
                        name: name.clone(),
                    })?;
                    validate_value(name, value)?;
                    text.push_str(value);
                }
            }
        }
        text.push_str(LINE_TERMINATOR);
        Ok(CommandLine::from_rendered(text))
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.source)
    }
}

fn validate_value(name: &str, value: &str) -> Result<(), FormatError> {
    if value.is_empty() {
        return Err(FormatError::invalid_argument(name, "value is empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(FormatError::invalid_argument(
            name,
            "value contains whitespace or a line break",
        ));
    }
    Ok(())
}

/// Named values substituted into a [`CommandTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    entries: Vec<(String, String)>,
}

impl CommandArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds or replaces a named value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a named value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        let name = name.into();
        let value = value.to_string();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}
