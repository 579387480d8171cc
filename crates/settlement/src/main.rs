//! Settlement service entry point.

use std::sync::Arc;

use common::topics;
use messaging::runtime::{
    connect_broker, init_tracing, install_metrics_exporter, shutdown_signal,
};
use messaging::{ConsumerWorker, LogFormat, Shutdown};
use settlement::{
    Config, InMemoryOrderDirectory, InMemorySettlementPaymentRepository, PaymentResultHandler,
    PostgresSettlementPaymentRepository, ResultReconciler, SettlementPaymentRepository,
};

#[tokio::main]
async fn main() {
    // 1. Initialize tracing and configuration
    init_tracing(LogFormat::from_env());
    let config = Config::from_env();

    // 2. Install Prometheus metrics exporter
    install_metrics_exporter(config.metrics_addr).expect("failed to install Prometheus exporter");

    // 3. Create the repository
    let repository: Arc<dyn SettlementPaymentRepository> = match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .expect("failed to connect to database");
            let repository = PostgresSettlementPaymentRepository::new(pool);
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            Arc::new(repository)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory");
            Arc::new(InMemorySettlementPaymentRepository::new())
        }
    };

    // 4. Build the reconciler
    let broker = connect_broker(&config.consumer)
        .await
        .expect("failed to connect to broker");
    let reconciler = ResultReconciler::new(
        repository,
        Arc::new(InMemoryOrderDirectory::new()),
        broker.clone(),
    );

    // 5. Start consuming
    let shutdown = Shutdown::new();
    let worker = ConsumerWorker::new(
        broker,
        Arc::new(PaymentResultHandler::new(reconciler)),
        config
            .consumer
            .consumer(topics::SETTLEMENT_SERVICE_GROUP, topics::PAYMENT_RESULT),
    );
    let consumer = tokio::spawn(worker.run(shutdown.subscribe()));
    tracing::info!("settlement service started");

    // 6. Stop on SIGINT/SIGTERM
    shutdown_signal().await;
    shutdown.trigger();
    match consumer.await {
        Ok(Ok(())) => tracing::info!("settlement service shut down gracefully"),
        Ok(Err(e)) => tracing::error!(error = %e, "consumer stopped with error"),
        Err(e) => tracing::error!(error = %e, "consumer task panicked"),
    }
}
