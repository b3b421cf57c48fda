//! Route selection policy for the relay.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Strategy used to choose between the live socket and the in-process stand-in.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RelayMode {
    /// Use the socket when its file exists, otherwise the in-process stand-in.
    #[default]
    Auto,
    /// Attempt a connection and fall back only when nothing is listening.
    Probe,
    /// Always use the socket; absence is a transport failure.
    Live,
    /// Always use the in-process stand-in. Never appropriate in production.
    Fallback,
}

/// Errors encountered while parsing a [`RelayMode`] from text.
pub type RelayModeParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("auto", RelayMode::Auto)]
    #[case("PROBE", RelayMode::Probe)]
    #[case("live", RelayMode::Live)]
    #[case("Fallback", RelayMode::Fallback)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: RelayMode) {
        assert_eq!(input.parse::<RelayMode>().expect("mode should parse"), expected);
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!("sometimes".parse::<RelayMode>().is_err());
    }
}
