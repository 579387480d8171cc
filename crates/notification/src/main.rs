//! Notification dispatcher entry point.

use std::sync::Arc;

use common::topics;
use messaging::runtime::{
    connect_broker, init_tracing, install_metrics_exporter, shutdown_signal,
};
use messaging::{ConsumerWorker, LogFormat, Shutdown};
use notification::{
    ChannelTransport, Config, InMemoryNotificationRepository, LogTransport, NotificationDispatcher,
    NotificationRepository, NotificationRequestedHandler, PostgresNotificationRepository,
    SenderRegistry, TemplateRegistry,
};

#[tokio::main]
async fn main() {
    // 1. Initialize tracing and configuration
    init_tracing(LogFormat::from_env());
    let config = Config::from_env();

    // 2. Install Prometheus metrics exporter
    install_metrics_exporter(config.metrics_addr).expect("failed to install Prometheus exporter");

    // 3. Create the repository
    let repository: Arc<dyn NotificationRepository> = match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .expect("failed to connect to database");
            let repository = PostgresNotificationRepository::new(pool);
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            Arc::new(repository)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, notifications are kept in memory");
            Arc::new(InMemoryNotificationRepository::new())
        }
    };

    // 4. Build the dispatcher; templates and senders are fixed from here on
    let email: Arc<dyn ChannelTransport> =
        Arc::new(LogTransport::new("email").with_from(config.mail_from.clone()));
    let sms: Arc<dyn ChannelTransport> = Arc::new(LogTransport::new("sms"));
    let dispatcher = NotificationDispatcher::new(
        repository,
        Arc::new(TemplateRegistry::standard()),
        Arc::new(SenderRegistry::standard(email, sms)),
    )
    .with_retry_policy(config.retry_policy())
    .with_send_timeout(config.send_timeout);

    // 5. Start consuming
    let broker = connect_broker(&config.consumer)
        .await
        .expect("failed to connect to broker");
    let shutdown = Shutdown::new();
    let worker = ConsumerWorker::new(
        broker,
        Arc::new(NotificationRequestedHandler::new(dispatcher)),
        config.consumer.consumer(
            topics::NOTIFICATION_SERVICE_GROUP,
            topics::NOTIFICATION_REQUESTED,
        ),
    );
    let consumer = tokio::spawn(worker.run(shutdown.subscribe()));
    tracing::info!("notification dispatcher started");

    // 6. Stop on SIGINT/SIGTERM
    shutdown_signal().await;
    shutdown.trigger();
    match consumer.await {
        Ok(Ok(())) => tracing::info!("notification dispatcher shut down gracefully"),
        Ok(Err(e)) => tracing::error!(error = %e, "consumer stopped with error"),
        Err(e) => tracing::error!(error = %e, "consumer task panicked"),
    }
}
