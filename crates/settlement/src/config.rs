//! Settlement service configuration loaded from environment variables.

use std::net::SocketAddr;

use messaging::ConsumerSettings;
use messaging::runtime::{env_lookup, parse_var};

/// Settlement service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string (default: none, in-memory storage)
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9001"`)
/// - broker settings, see [`ConsumerSettings`]
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub metrics_addr: SocketAddr,
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
            consumer: ConsumerSettings::from_lookup(&lookup),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9001)),
            consumer: ConsumerSettings::default(),
        }
    }
}
