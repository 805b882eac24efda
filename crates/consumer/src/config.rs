//! Consumer configuration loaded from environment variables.

use std::time::Duration;

use service::RetryPolicy;
use service::bootstrap::{DEFAULT_ALLOCATED_CHANNEL, DEFAULT_OUT_OF_STOCK_RECIPIENT};
use service::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Consumer configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON lines, anything else for human-readable output
/// - `RETRY_MAX_ATTEMPTS` — attempts per event handler (default: `3`)
/// - `RETRY_BASE_DELAY_MS` — first retry delay (default: `100`)
/// - `RETRY_MAX_DELAY_MS` — retry delay cap (default: `5000`)
/// - `STOCK_NOTIFICATION_RECIPIENT` — out-of-stock mail recipient
/// - `ALLOCATED_CHANNEL` — channel receiving `Allocated` events (default: `"line_allocated"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub stock_notification_recipient: String,
    pub allocated_channel: String,
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            retry_max_attempts: env_parsed::<u32>("RETRY_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.retry_max_attempts),
            retry_base_delay: env_parsed::<u64>("RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: env_parsed::<u64>("RETRY_MAX_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_max_delay),
            stock_notification_recipient: std::env::var("STOCK_NOTIFICATION_RECIPIENT")
                .unwrap_or(defaults.stock_notification_recipient),
            allocated_channel: std::env::var("ALLOCATED_CHANNEL")
                .unwrap_or(defaults.allocated_channel),
        }
    }

    /// Returns the retry policy applied to event handlers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry_max_attempts,
            self.retry_base_delay,
            self.retry_max_delay.max(self.retry_base_delay),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            retry_max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_BASE_DELAY,
            retry_max_delay: DEFAULT_MAX_DELAY,
            stock_notification_recipient: DEFAULT_OUT_OF_STOCK_RECIPIENT.to_string(),
            allocated_channel: DEFAULT_ALLOCATED_CHANNEL.to_string(),
        }
    }
}
