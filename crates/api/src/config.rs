//! Application configuration loaded from environment variables.

use std::time::Duration;

use application::Settings;

/// Output format of the log subscriber.
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

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `MAX_OPEN_TRANSACTIONS`: write-store transaction slots (default `64`)
/// - `PRODUCT_CACHE_TTL_SECS`: product read cache TTL (default `300`)
/// - `TOP_SELLING_CACHE_TTL_SECS`: top-selling read cache TTL (default `600`)
/// - `TRANSACTION_TIMEOUT_MS`: per-command transaction deadline (default `5000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub max_open_transactions: usize,
    pub product_cache_ttl: Duration,
    pub top_selling_cache_ttl: Duration,
    pub transaction_timeout: Duration,
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            max_open_transactions: parsed::<usize>("MAX_OPEN_TRANSACTIONS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_open_transactions),
            product_cache_ttl: parsed("PRODUCT_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.product_cache_ttl),
            top_selling_cache_ttl: parsed("TOP_SELLING_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.top_selling_cache_ttl),
            transaction_timeout: parsed("TRANSACTION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.transaction_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Core tunables handed to [`application::Application::build`].
    pub fn settings(&self) -> Settings {
        Settings {
            max_open_transactions: self.max_open_transactions,
            transaction_timeout: self.transaction_timeout,
            product_cache_ttl: self.product_cache_ttl,
            top_selling_cache_ttl: self.top_selling_cache_ttl,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            max_open_transactions: settings.max_open_transactions,
            product_cache_ttl: settings.product_cache_ttl,
            top_selling_cache_ttl: settings.top_selling_cache_ttl,
            transaction_timeout: settings.transaction_timeout,
        }
    }
}
