//! Server configuration loaded from environment variables.

use std::time::Duration;

use engine::{ActivityOptions, RetryPolicy};
use thiserror::Error;
use trip_saga::{TripBranch, default_activity_options};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `ACTIVITY_TIMEOUT_MS`: start-to-close timeout per attempt (default: `3000`)
/// - `ACTIVITY_MAX_ATTEMPTS`: attempts per activity (default: `3`)
/// - `ACTIVITY_LATENCY_MS`: simulated latency of the reservation services
///   (default: `1000`)
/// - `FAIL_BOOKINGS`: comma-separated branches whose bookings always fail,
///   e.g. `car,flight` (default: none)
/// - `DATABASE_URL`: PostgreSQL history store; without it history is kept
///   in memory and lost on restart (default: unset)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub activity_timeout: Duration,
    pub activity_max_attempts: u32,
    pub activity_latency: Duration,
    pub fail_bookings: Vec<TripBranch>,
    pub database_url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset keys. Set but unparsable values are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            activity_timeout: parse(&lookup, "ACTIVITY_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.activity_timeout),
            activity_max_attempts: parse(&lookup, "ACTIVITY_MAX_ATTEMPTS")?
                .unwrap_or(defaults.activity_max_attempts),
            activity_latency: parse(&lookup, "ACTIVITY_LATENCY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.activity_latency),
            fail_bookings: match lookup("FAIL_BOOKINGS") {
                Some(value) => parse_branches(&value)?,
                None => defaults.fail_bookings,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Activity options for the `book-trip` workflow.
    pub fn activity_options(&self) -> ActivityOptions {
        default_activity_options()
            .with_start_to_close_timeout(self.activity_timeout)
            .with_retry_policy(
                RetryPolicy::default().with_maximum_attempts(self.activity_max_attempts),
            )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            activity_timeout: Duration::from_millis(3000),
            activity_max_attempts: 3,
            activity_latency: Duration::from_millis(1000),
            fail_bookings: Vec::new(),
            database_url: None,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key, value })
        })
        .transpose()
}

fn parse_branches(value: &str) -> Result<Vec<TripBranch>, ConfigError> {
    let mut branches = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let branch: TripBranch = part.parse().map_err(|_| ConfigError::InvalidValue {
            key: "FAIL_BOOKINGS",
            value: value.to_string(),
        })?;
        if !branches.contains(&branch) {
            branches.push(branch);
        }
    }
    Ok(branches)
}
