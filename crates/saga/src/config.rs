//! Configuration of the in-process saga.

use std::net::SocketAddr;

use messaging::runtime::{env_lookup, parse_var};

/// Configuration of all three components run in one process.
///
/// Each component reads its own variables (see [`payment::Config`] and
/// [`notification::Config`]); on top of that:
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9003"`)
/// - `SAGA_DEMO_ORDERS`: orders settled at startup by `saga-local` (default: `1`)
///
/// Storage is always in memory.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    pub metrics_addr: SocketAddr,
    pub demo_orders: u32,
    pub payment: payment::Config,
    pub notification: notification::Config,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            metrics_addr: parse_var(&lookup, "METRICS_ADDR", defaults.metrics_addr),
            demo_orders: parse_var(&lookup, "SAGA_DEMO_ORDERS", defaults.demo_orders),
            payment: payment::Config::from_lookup(&lookup),
            notification: notification::Config::from_lookup(&lookup),
        }
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9003)),
            demo_orders: 1,
            payment: payment::Config::default(),
            notification: notification::Config::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = SagaConfig::from_lookup(|_| None);
        assert_eq!(config.metrics_addr.port(), 9003);
        assert_eq!(config.demo_orders, 1);
        assert_eq!(config.payment.currency, "EUR");
        assert_eq!(config.notification.max_attempts, 3);
    }

    #[test]
    fn test_component_variables_are_shared() {
        let config = SagaConfig::from_lookup(|name| match name {
            "SAGA_DEMO_ORDERS" => Some("5".into()),
            "REDELIVERY_DELAY_MS" => Some("20".into()),
            "NOTIFICATION_BACKOFF_MS" => Some("10".into()),
            _ => None,
        });
        assert_eq!(config.demo_orders, 5);
        assert_eq!(
            config.payment.consumer.redelivery_delay,
            Duration::from_millis(20)
        );
        assert_eq!(config.notification.backoff, Duration::from_millis(10));
    }
}
