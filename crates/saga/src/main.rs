//! Runs the whole saga in one process and settles a few demo orders.

use common::{Money, OrderId};
use messaging::LogFormat;
use messaging::runtime::{init_tracing, install_metrics_exporter, shutdown_signal};
use saga::{SagaConfig, SagaRuntime};
use settlement::CustomerContact;

#[tokio::main]
async fn main() {
    // 1. Initialize tracing and configuration
    init_tracing(LogFormat::from_env());
    let config = SagaConfig::from_env();

    // 2. Install Prometheus metrics exporter
    install_metrics_exporter(config.metrics_addr).expect("failed to install Prometheus exporter");

    // 3. Start all components
    let runtime = SagaRuntime::start(&config);

    // 4. Settle the demo orders
    for n in 1..=i64::from(config.demo_orders) {
        let order_id = OrderId::new(n);
        let contact = CustomerContact::email(format!("customer{n}@example.com"));
        runtime
            .order_directory()
            .register(order_id, contact.clone())
            .await;

        if let Err(e) = runtime
            .initiator()
            .request_welcome_notification(&contact.contact)
            .await
        {
            tracing::error!(error = %e, %order_id, "welcome notification not requested");
        }
        match runtime
            .initiator()
            .initiate_payment(order_id, Money::from_minor_units(n * 1000), "tok_demo", Some(contact))
            .await
        {
            Ok(payment) => tracing::info!(%order_id, payment_id = %payment.id, "demo order submitted"),
            Err(e) => tracing::error!(error = %e, %order_id, "demo order not submitted"),
        }
    }

    // 5. Stop on SIGINT/SIGTERM
    shutdown_signal().await;
    if let Err(e) = runtime.shutdown().await {
        tracing::error!(error = %e, "saga runtime stopped with error");
    }
}
