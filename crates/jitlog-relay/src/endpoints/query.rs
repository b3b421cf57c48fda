//! Query-string handling for the read endpoints.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::errors::RelayError;

/// Decoded query parameters in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parses a raw query string such as `id=42&format=json`.
    ///
    /// Keys and values are percent-decoded and `+` is read as a space.
    /// A leading `?` is ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// Builds a query from already decoded pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// The last value supplied for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }
}

fn decode(text: &str) -> String {
    let spaced: Cow<'_, str> = if text.contains('+') {
        Cow::Owned(text.replace('+', " "))
    } else {
        Cow::Borrowed(text)
    };
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Extracts the mandatory integer `id` parameter.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] when `id` is absent and
/// [`RelayError::BadRequest`] when it is not an integer.
pub fn require_uid(query: &Query) -> Result<i64, RelayError> {
    let raw = query
        .get("id")
        .ok_or_else(|| RelayError::not_found("mandatory GET parameter 'id' missing"))?;
    raw.trim().parse().map_err(|_| {
        RelayError::bad_request(format!("GET parameter 'id' must be an integer, got '{raw}'"))
    })
}
