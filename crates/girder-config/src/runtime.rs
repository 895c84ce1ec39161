//! Resolved runtime configuration for a server process.
//!
//! Configuration is deliberately flat: defaults from [`crate::defaults`]
//! overridden by `GIRDER_*` environment variables. Every override is
//! validated at load time so a typo surfaces as a startup error rather
//! than a silently ignored value.

use std::env;

use thiserror::Error;

use crate::compat::{HeaderCompat, PositionEncoding};
use crate::defaults;
use crate::logging::LogFormat;

/// Environment variable overriding the framer buffer capacity.
pub const ENV_READ_BUFFER_CAPACITY: &str = "GIRDER_READ_BUFFER_CAPACITY";
/// Environment variable overriding the reactor idle interval.
pub const ENV_IDLE_INTERVAL_MS: &str = "GIRDER_IDLE_INTERVAL_MS";
/// Environment variable overriding the log filter expression.
pub const ENV_LOG_FILTER: &str = "GIRDER_LOG_FILTER";
/// Environment variable overriding the log output format.
pub const ENV_LOG_FORMAT: &str = "GIRDER_LOG_FORMAT";
/// Environment variable overriding the header matching mode.
pub const ENV_HEADER_COMPAT: &str = "GIRDER_HEADER_COMPAT";
/// Environment variable overriding the position column unit.
pub const ENV_POSITION_ENCODING: &str = "GIRDER_POSITION_ENCODING";

/// Resolved configuration shared by the scaffolding crates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    read_buffer_capacity: usize,
    idle_interval_ms: u64,
    log_filter: String,
    log_format: LogFormat,
    header_compat: HeaderCompat,
    position_encoding: PositionEncoding,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_buffer_capacity: defaults::DEFAULT_READ_BUFFER_CAPACITY,
            idle_interval_ms: defaults::DEFAULT_IDLE_INTERVAL_MS,
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            header_compat: defaults::default_header_compat(),
            position_encoding: defaults::default_position_encoding(),
        }
    }
}

impl RuntimeConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is present but cannot be
    /// parsed as the expected type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Loads the configuration from an injected variable source.
    ///
    /// The indirection keeps the parsing logic testable without mutating
    /// process-global environment state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is present but cannot be
    /// parsed as the expected type.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_READ_BUFFER_CAPACITY) {
            config.read_buffer_capacity = parse_number(ENV_READ_BUFFER_CAPACITY, &value)?;
            if config.read_buffer_capacity == 0 {
                return Err(ConfigError::InvalidNumber {
                    name: ENV_READ_BUFFER_CAPACITY,
                    value,
                });
            }
        }
        if let Some(value) = lookup(ENV_IDLE_INTERVAL_MS) {
            config.idle_interval_ms = parse_number(ENV_IDLE_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_FILTER) {
            config.log_filter = value;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            config.log_format = parse_choice(ENV_LOG_FORMAT, &value)?;
        }
        if let Some(value) = lookup(ENV_HEADER_COMPAT) {
            config.header_compat = parse_choice(ENV_HEADER_COMPAT, &value)?;
        }
        if let Some(value) = lookup(ENV_POSITION_ENCODING) {
            config.position_encoding = parse_choice(ENV_POSITION_ENCODING, &value)?;
        }
        Ok(config)
    }

    /// Capacity of the framer's read buffer in bytes.
    #[must_use]
    pub fn read_buffer_capacity(&self) -> usize {
        self.read_buffer_capacity
    }

    /// Reactor idle interval in milliseconds.
    #[must_use]
    pub fn idle_interval_ms(&self) -> u64 {
        self.idle_interval_ms
    }

    /// Log filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format for the tracing subscriber.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Header matching mode for the framer.
    #[must_use]
    pub fn header_compat(&self) -> HeaderCompat {
        self.header_compat
    }

    /// Position column unit for the document model.
    #[must_use]
    pub fn position_encoding(&self) -> PositionEncoding {
        self.position_encoding
    }
}

fn parse_number<N>(name: &'static str, value: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
{
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

fn parse_choice<C>(name: &'static str, value: &str) -> Result<C, ConfigError>
where
    C: std::str::FromStr,
{
    value.trim().parse().map_err(|_| ConfigError::InvalidChoice {
        name,
        value: value.to_string(),
    })
}

/// Errors raised while resolving the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An override was present but is not a valid non-negative number.
    #[error("{name} is not a valid number: '{value}'")]
    InvalidNumber {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// An override was present but names no known variant.
    #[error("{name} is not a recognised option: '{value}'")]
    InvalidChoice {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[rstest]
    fn defaults_apply_without_overrides() {
        let config = RuntimeConfig::load_with(|_| None).expect("defaults should load");

        assert_eq!(config.read_buffer_capacity(), 1 << 20);
        assert_eq!(config.idle_interval_ms(), 50);
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.header_compat(), HeaderCompat::Strict);
        assert_eq!(config.position_encoding(), PositionEncoding::Utf8ByteOffset);
    }

    #[rstest]
    fn overrides_take_effect() {
        let lookup = lookup_from(&[
            (ENV_READ_BUFFER_CAPACITY, "4096"),
            (ENV_IDLE_INTERVAL_MS, "10"),
            (ENV_LOG_FILTER, "debug"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_HEADER_COMPAT, "case_insensitive"),
            (ENV_POSITION_ENCODING, "utf16"),
        ]);

        let config = RuntimeConfig::load_with(lookup).expect("overrides should parse");

        assert_eq!(config.read_buffer_capacity(), 4096);
        assert_eq!(config.idle_interval_ms(), 10);
        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.header_compat(), HeaderCompat::CaseInsensitive);
        assert_eq!(config.position_encoding(), PositionEncoding::Utf16CodeUnit);
    }

    #[rstest]
    #[case(ENV_READ_BUFFER_CAPACITY, "not-a-number")]
    #[case(ENV_READ_BUFFER_CAPACITY, "0")]
    #[case(ENV_IDLE_INTERVAL_MS, "-5")]
    fn rejects_invalid_numbers(#[case] name: &'static str, #[case] value: &str) {
        let lookup = lookup_from(&[(name, value)]);

        let error = RuntimeConfig::load_with(lookup).expect_err("override should be rejected");

        assert!(matches!(error, ConfigError::InvalidNumber { .. }));
    }

    #[rstest]
    #[case(ENV_LOG_FORMAT, "yaml")]
    #[case(ENV_HEADER_COMPAT, "lenient")]
    #[case(ENV_POSITION_ENCODING, "utf32")]
    fn rejects_unknown_choices(#[case] name: &'static str, #[case] value: &str) {
        let lookup = lookup_from(&[(name, value)]);

        let error = RuntimeConfig::load_with(lookup).expect_err("override should be rejected");

        assert!(matches!(error, ConfigError::InvalidChoice { .. }));
    }
}
