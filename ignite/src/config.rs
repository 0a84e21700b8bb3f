use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde_derive::Deserialize;

///
/// Engine wide settings. Every field has a default, so a partial document
/// deserializes fine.
///
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound, in bytes, for a parsed multipart body.
    pub max_multipart_memory: u64,
    /// Idle contexts kept around for reuse. Extra contexts are dropped on release.
    pub pool_capacity: usize,
    /// Make `fail` always answer 500 with a body code of 500, whatever the caller asked for.
    pub legacy_fail_envelope: bool,
    /// How long the server waits for a request body.
    pub read_timeout_ms: u64,
    /// Sent back as the `Server` header.
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_multipart_memory: 32 << 21,
            pool_capacity: 1024,
            legacy_fail_envelope: false,
            read_timeout_ms: 30_000,
            server_name: "ignite".to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Could not parse {}='{}', using the default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    ///
    /// Reads `IGNITE_MAX_MULTIPART_MEMORY`, `IGNITE_POOL_CAPACITY`,
    /// `IGNITE_LEGACY_FAIL_ENVELOPE`, `IGNITE_READ_TIMEOUT_MS` and `IGNITE_SERVER_NAME`.
    /// Missing or unparsable variables keep their default.
    ///
    pub fn from_env() -> Config {
        let defaults = Config::default();

        Config {
            max_multipart_memory: env_or(
                "IGNITE_MAX_MULTIPART_MEMORY",
                defaults.max_multipart_memory,
            ),
            pool_capacity: env_or("IGNITE_POOL_CAPACITY", defaults.pool_capacity),
            legacy_fail_envelope: env_or(
                "IGNITE_LEGACY_FAIL_ENVELOPE",
                defaults.legacy_fail_envelope,
            ),
            read_timeout_ms: env_or("IGNITE_READ_TIMEOUT_MS", defaults.read_timeout_ms),
            server_name: env::var("IGNITE_SERVER_NAME").unwrap_or(defaults.server_name),
        }
    }

    pub fn with_max_multipart_memory(mut self, bytes: u64) -> Config {
        self.max_multipart_memory = bytes;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Config {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_legacy_fail_envelope(mut self, legacy: bool) -> Config {
        self.legacy_fail_envelope = legacy;
        self
    }

    pub fn with_read_timeout_ms(mut self, millis: u64) -> Config {
        self.read_timeout_ms = millis;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Config {
        self.server_name = name.into();
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
