//! Dispatcher configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use messaging::ConsumerSettings;
use messaging::runtime::{env_lookup, parse_var};

use crate::retry::RetryPolicy;

/// Notification dispatcher configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string (default: none, in-memory storage)
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9002"`)
/// - `NOTIFICATION_MAX_ATTEMPTS`: delivery attempts per notification (default: `3`)
/// - `NOTIFICATION_BACKOFF_MS`: wait before the second attempt (default: `1000`)
/// - `NOTIFICATION_BACKOFF_MULTIPLIER`: growth of later waits (default: `2.0`)
/// - `NOTIFICATION_SEND_TIMEOUT_MS`: time limit per attempt (default: `10000`)
/// - `MAIL_FROM`: sender address of e-mails (default: `"noreply@ecommerce-platform.local"`)
/// - broker settings, see [`ConsumerSettings`]
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub metrics_addr: SocketAddr,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub backoff_multiplier: f64,
    pub send_timeout: Duration,
    pub mail_from: String,
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
            max_attempts: parse_var(&lookup, "NOTIFICATION_MAX_ATTEMPTS", defaults.max_attempts),
            backoff: Duration::from_millis(parse_var(&lookup, "NOTIFICATION_BACKOFF_MS", 1000)),
            backoff_multiplier: parse_var(
                &lookup,
                "NOTIFICATION_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            ),
            send_timeout: Duration::from_millis(parse_var(
                &lookup,
                "NOTIFICATION_SEND_TIMEOUT_MS",
                10_000,
            )),
            mail_from: lookup("MAIL_FROM").unwrap_or(defaults.mail_from),
            consumer: ConsumerSettings::from_lookup(&lookup),
        }
    }

    /// The delivery retry schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff, self.backoff_multiplier)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            send_timeout: Duration::from_secs(10),
            mail_from: "noreply@ecommerce-platform.local".to_string(),
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
        assert!(config.database_url.is_none());
        assert_eq!(config.metrics_addr.port(), 9002);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.send_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://localhost/notifications".into()),
            "NOTIFICATION_MAX_ATTEMPTS" => Some("5".into()),
            "NOTIFICATION_BACKOFF_MS" => Some("10".into()),
            "MAIL_FROM" => Some("shop@example.com".into()),
            "BROKER_PARTITIONS" => Some("2".into()),
            _ => None,
        });
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/notifications")
        );
        assert_eq!(config.retry_policy().max_attempts(), 5);
        assert_eq!(
            config.retry_policy().delay_after(1),
            Duration::from_millis(10)
        );
        assert_eq!(config.mail_from, "shop@example.com");
        assert_eq!(config.consumer.partitions, 2);
    }
}
