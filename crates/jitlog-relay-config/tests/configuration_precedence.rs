//! Layering tests for relay configuration sources.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use jitlog_relay_config::{Config, DEFAULT_CACHE_SOCKET, LogFormat, RelayMode};
use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::{fixture, rstest};
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const ENV_KEYS: &[&str] = &[
    "JITRELAY_CACHE_SOCKET",
    "JITRELAY_RELAY_MODE",
    "JITRELAY_CONFIG_PATH",
];

/// Serialises environment mutation and restores the previous values on drop.
struct EnvScope {
    previous: Vec<(&'static str, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvScope {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = ENV_KEYS
            .iter()
            .map(|key| (*key, std::env::var_os(key)))
            .collect();
        for key in ENV_KEYS {
            // Environment mutation is `unsafe` in edition 2024; the mutex keeps
            // the tests in this binary from racing each other.
            unsafe { std::env::remove_var(key) };
        }
        Self {
            previous,
            _guard: guard,
        }
    }

    fn set(&self, key: &'static str, value: &OsStr) {
        unsafe { std::env::set_var(key, value) };
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn args(extra: &[&str]) -> Vec<OsString> {
    std::iter::once("jitrelay")
        .chain(extra.iter().copied())
        .map(OsString::from)
        .collect()
}

#[rstest]
fn defaults_apply_without_sources() {
    let _env = EnvScope::new();
    let config = Config::load_from_iter(args(&[])).expect("defaults should load");
    assert_eq!(config.cache_socket().path().as_str(), DEFAULT_CACHE_SOCKET);
    assert_eq!(config.relay_mode(), RelayMode::Auto);
    assert_eq!(config.log_format(), LogFormat::Json);
}

#[rstest]
fn file_values_override_defaults(temp_dir: TempDir) {
    let env = EnvScope::new();
    let path = temp_dir.path().join("jitrelay.toml");
    fs::write(
        &path,
        "cache_socket = \"/run/forestcache/cache.socket\"\nrelay_mode = \"probe\"\n",
    )
    .expect("write config file");
    env.set("JITRELAY_CONFIG_PATH", path.as_os_str());

    let config = Config::load_from_iter(args(&[])).expect("file config should load");
    assert_eq!(
        config.cache_socket().path().as_str(),
        "/run/forestcache/cache.socket"
    );
    assert_eq!(config.relay_mode(), RelayMode::Probe);
}

#[rstest]
fn environment_overrides_file(temp_dir: TempDir) {
    let env = EnvScope::new();
    let path = temp_dir.path().join("jitrelay.toml");
    fs::write(&path, "cache_socket = \"/from/file.socket\"\n").expect("write config file");
    env.set("JITRELAY_CONFIG_PATH", path.as_os_str());
    env.set("JITRELAY_CACHE_SOCKET", OsStr::new("/from/env.socket"));

    let config = Config::load_from_iter(args(&[])).expect("env config should load");
    assert_eq!(config.cache_socket().path().as_str(), "/from/env.socket");
}

#[rstest]
fn cli_flags_override_environment() {
    let env = EnvScope::new();
    env.set("JITRELAY_CACHE_SOCKET", OsStr::new("/from/env.socket"));
    env.set("JITRELAY_RELAY_MODE", OsStr::new("live"));

    let config = Config::load_from_iter(args(&[
        "--cache-socket",
        "unix:///from/cli.socket",
        "--relay-mode",
        "fallback",
    ]))
    .expect("cli config should load");
    assert_eq!(config.cache_socket().path().as_str(), "/from/cli.socket");
    assert_eq!(config.relay_mode(), RelayMode::Fallback);
}

#[rstest]
fn malformed_file_is_reported(temp_dir: TempDir) {
    let env = EnvScope::new();
    let path = temp_dir.path().join("jitrelay.toml");
    fs::write(&path, "relay_mode = [\"not\", \"a\", \"mode\"]\n").expect("write config file");
    env.set("JITRELAY_CONFIG_PATH", path.as_os_str());

    let error = Config::load_from_iter(args(&[])).expect_err("malformed config must fail");
    assert!(!error.to_string().is_empty());
}
