//! Process plumbing shared by the service binaries: configuration lookup,
//! tracing, the Prometheus exporter and graceful shutdown.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use sqlx::PgPool;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::memory::DEFAULT_PARTITIONS;
use crate::postgres::DEFAULT_POLL_INTERVAL;
use crate::{ConsumerConfig, InMemoryBroker, MessageBroker, PostgresBroker};

/// Parses a variable through `lookup`, falling back to `default` when it is
/// missing or malformed.
pub fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Environment lookup used by every `from_env` constructor.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Broker and consumer settings shared by all services.
///
/// Reads from environment variables:
/// - `BROKER_URL`: PostgreSQL database holding the topics (default: none, in-process broker)
/// - `BROKER_PARTITIONS`: partitions per topic, equal in every service (default: `8`)
/// - `BROKER_POLL_INTERVAL_MS`: pause between reads of an empty partition (default: `100`)
/// - `REDELIVERY_DELAY_MS`: pause before a retried message is handled again (default: `1000`)
/// - `CONSUMER_MAX_IN_FLIGHT`: unfinished messages per partition (default: `256`)
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    pub broker_url: Option<String>,
    pub partitions: u32,
    pub poll_interval: Duration,
    pub redelivery_delay: Duration,
    pub max_in_flight: usize,
}

impl ConsumerSettings {
    /// Loads settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            broker_url: lookup("BROKER_URL"),
            partitions: parse_var(&lookup, "BROKER_PARTITIONS", defaults.partitions).max(1),
            poll_interval: Duration::from_millis(parse_var(
                &lookup,
                "BROKER_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            redelivery_delay: Duration::from_millis(parse_var(
                &lookup,
                "REDELIVERY_DELAY_MS",
                defaults.redelivery_delay.as_millis() as u64,
            )),
            max_in_flight: parse_var(&lookup, "CONSUMER_MAX_IN_FLIGHT", defaults.max_in_flight)
                .max(1),
        }
    }

    /// Builds the consumer configuration for one group and topic.
    pub fn consumer(&self, group: &str, topic: &str) -> ConsumerConfig {
        ConsumerConfig::new(group, topic)
            .with_redelivery_delay(self.redelivery_delay)
            .with_max_in_flight(self.max_in_flight)
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            broker_url: None,
            partitions: DEFAULT_PARTITIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            redelivery_delay: Duration::from_secs(1),
            max_in_flight: 256,
        }
    }
}

/// Connects the broker named by `BROKER_URL` and migrates its tables.
///
/// Without a URL the process gets a private in-process broker, which only
/// makes sense when every saga component runs inside this process.
pub async fn connect_broker(
    settings: &ConsumerSettings,
) -> crate::Result<Arc<dyn MessageBroker>> {
    match &settings.broker_url {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            let broker = PostgresBroker::new(pool, settings.partitions)
                .with_poll_interval(settings.poll_interval);
            broker.run_migrations().await?;
            tracing::info!(partitions = settings.partitions, "connected to PostgreSQL broker");
            Ok(Arc::new(broker))
        }
        None => {
            tracing::warn!(
                "BROKER_URL not set, using an in-process broker no other service can reach"
            );
            Ok(Arc::new(InMemoryBroker::with_partitions(settings.partitions)))
        }
    }
}

/// Output format of the tracing subscriber, chosen by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match env_lookup("LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` sets the filter
/// (default: `info`).
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Installs the Prometheus recorder and serves `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

/// Broadcasts a stop request to every consumer of a process.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Returns a receiver to hand to a consumer worker.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Asks every subscriber to stop.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
