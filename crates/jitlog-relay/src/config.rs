//! Configuration loading helpers for the relay CLI.
//!
//! Leading configuration flags are handed to `ortho_config`; everything from
//! the first command token onwards is parsed by clap.

use std::ffi::{OsStr, OsString};

use jitlog_relay_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

/// CLI flags recognised by the configuration loader.
///
/// Keep in sync with the fields of [`Config`].
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--cache-socket",
    "--relay-mode",
    "--connect-timeout-ms",
    "--read-timeout-ms",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered configuration arguments.
    ///
    /// Configuration flags must precede the command; flags after it are
    /// treated as command arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

fn process_config_flag(argument: &OsStr) -> FlagAction {
    let argument_text = argument.to_string_lossy();
    if !argument_text.starts_with("--") {
        return FlagAction::Skip;
    }

    let (flag, has_inline_value) = match argument_text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (argument_text.as_ref(), false),
    };

    if CONFIG_CLI_FLAGS.contains(&flag) {
        return FlagAction::Include {
            needs_value: !has_inline_value,
        };
    }

    FlagAction::Skip
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut command_start = 1_usize;
    let mut pending_value = false;

    for argument in rest {
        if pending_value {
            filtered.push(argument.clone());
            pending_value = false;
            command_start += 1;
            continue;
        }

        match process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                command_start += 1;
                pending_value = needs_value;
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}

pub(crate) fn prepare_cli_arguments(
    args: &[OsString],
    split: &ConfigArgumentSplit,
) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.get(split.command_start..).unwrap_or_default())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", false)]
    #[case("--relay-mode", true)]
    fn known_flags_are_included(#[case] flag: &str, #[case] needs_value: bool) {
        match process_config_flag(OsStr::new(flag)) {
            FlagAction::Include { needs_value: found } => assert_eq!(found, needs_value),
            FlagAction::Skip => panic!("expected include for {flag}"),
        }
    }

    #[rstest]
    #[case("meta")]
    #[case("--unknown")]
    fn other_tokens_stop_the_scan(#[case] token: &str) {
        assert!(matches!(
            process_config_flag(OsStr::new(token)),
            FlagAction::Skip
        ));
    }

    #[test]
    fn splits_config_flags_from_command() {
        let args = os_args(&[
            "jitrelay",
            "--cache-socket",
            "/run/cache.socket",
            "--relay-mode=fallback",
            "trace",
            "/l",
            "p",
            "--log-filter",
        ]);
        let split = split_config_arguments(&args);

        assert_eq!(
            split.config_arguments,
            os_args(&[
                "jitrelay",
                "--cache-socket",
                "/run/cache.socket",
                "--relay-mode=fallback"
            ])
        );
        assert_eq!(
            prepare_cli_arguments(&args, &split),
            os_args(&["jitrelay", "trace", "/l", "p", "--log-filter"])
        );
    }

    #[test]
    fn empty_arguments_split_cleanly() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert_eq!(split.command_start, 0);
    }
}
