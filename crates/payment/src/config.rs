//! Processor configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use common::topics::SETTLEMENT_CURRENCY;
use messaging::ConsumerSettings;
use messaging::runtime::{env_lookup, parse_var};

/// Payment processor configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string (default: none, in-memory storage)
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9000"`)
/// - `PAYMENT_CURRENCY`: currency passed to the gateway (default: `"EUR"`)
/// - `GATEWAY_TIMEOUT_MS`: time limit of a gateway call (default: `10000`)
/// - broker settings, see [`ConsumerSettings`]
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub metrics_addr: SocketAddr,
    pub currency: String,
    pub gateway_timeout: Duration,
    pub consumer: ConsumerSettings,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL"),
            metrics_addr: parse_var(&lookup, "METRICS_ADDR", defaults.metrics_addr),
            currency: lookup("PAYMENT_CURRENCY")
                .map(|c| c.trim().to_ascii_uppercase())
                .unwrap_or(defaults.currency),
            gateway_timeout: Duration::from_millis(parse_var(&lookup, "GATEWAY_TIMEOUT_MS", 10_000)),
            consumer: ConsumerSettings::from_lookup(&lookup),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            currency: SETTLEMENT_CURRENCY.to_string(),
            gateway_timeout: Duration::from_secs(10),
            consumer: ConsumerSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.metrics_addr.port(), 9000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|name| match name {
            "PAYMENT_CURRENCY" => Some("usd".into()),
            "GATEWAY_TIMEOUT_MS" => Some("250".into()),
            "METRICS_ADDR" => Some("127.0.0.1:9100".into()),
            _ => None,
        });
        assert_eq!(config.currency, "USD");
        assert_eq!(config.gateway_timeout, Duration::from_millis(250));
        assert_eq!(config.metrics_addr.to_string(), "127.0.0.1:9100");
    }
}
