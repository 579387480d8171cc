//! All three saga components against one in-memory broker.

use std::sync::Arc;

use common::topics;
use messaging::{ConsumerWorker, InMemoryBroker, MessageBroker, MessageHandler, Shutdown};
use notification::{
    ChannelTransport, InMemoryNotificationRepository, LogTransport, NotificationDispatcher,
    NotificationRequestedHandler, SenderRegistry, TemplateRegistry,
};
use payment::{InMemoryProcessedPaymentRepository, MockGateway, PaymentProcessor, PaymentRequestedHandler};
use settlement::{
    InMemoryOrderDirectory, InMemorySettlementPaymentRepository, PaymentResultHandler,
    ResultReconciler, SettlementInitiator,
};
use tokio::task::JoinSet;

use crate::config::SagaConfig;
use crate::error::SagaError;

type WorkerOutcome = (&'static str, messaging::Result<()>);

/// A running saga: initiator, processor, reconciler and dispatcher, each
/// with its own in-memory store, connected only through the broker.
///
/// Must be started inside a Tokio runtime.
pub struct SagaRuntime {
    broker: InMemoryBroker,
    initiator: SettlementInitiator<InMemoryBroker>,
    directory: InMemoryOrderDirectory,
    settlement_payments: InMemorySettlementPaymentRepository,
    processed_payments: InMemoryProcessedPaymentRepository,
    notifications: InMemoryNotificationRepository,
    gateway: MockGateway,
    shutdown: Shutdown,
    workers: JoinSet<WorkerOutcome>,
}

impl SagaRuntime {
    /// Starts the saga, delivering notifications to the log.
    pub fn start(config: &SagaConfig) -> Self {
        let email: Arc<dyn ChannelTransport> = Arc::new(
            LogTransport::new("email").with_from(config.notification.mail_from.clone()),
        );
        let sms: Arc<dyn ChannelTransport> = Arc::new(LogTransport::new("sms"));
        Self::start_with_transports(config, email, sms)
    }

    /// Starts the saga with the given e-mail and SMS transports.
    pub fn start_with_transports(
        config: &SagaConfig,
        email: Arc<dyn ChannelTransport>,
        sms: Arc<dyn ChannelTransport>,
    ) -> Self {
        let settings = &config.payment.consumer;
        let broker = InMemoryBroker::with_partitions(settings.partitions);
        let shutdown = Shutdown::new();
        let mut workers = JoinSet::new();

        // Settlement initiator and reconciler
        let settlement_payments = InMemorySettlementPaymentRepository::new();
        let directory = InMemoryOrderDirectory::new();
        let initiator = SettlementInitiator::new(Arc::new(settlement_payments.clone()), broker.clone());
        let reconciler = ResultReconciler::new(
            Arc::new(settlement_payments.clone()),
            Arc::new(directory.clone()),
            broker.clone(),
        );

        // Payment processor
        let gateway = MockGateway::new();
        let processed_payments = InMemoryProcessedPaymentRepository::new();
        let processor = PaymentProcessor::new(
            Arc::new(gateway.clone()),
            Arc::new(processed_payments.clone()),
            config.payment.currency.clone(),
            config.payment.gateway_timeout,
        );

        // Notification dispatcher
        let notifications = InMemoryNotificationRepository::new();
        let dispatcher = NotificationDispatcher::new(
            Arc::new(notifications.clone()),
            Arc::new(TemplateRegistry::standard()),
            Arc::new(SenderRegistry::standard(email, sms)),
        )
        .with_retry_policy(config.notification.retry_policy())
        .with_send_timeout(config.notification.send_timeout);

        spawn_worker(
            &mut workers,
            &shutdown,
            ConsumerWorker::new(
                broker.clone(),
                Arc::new(PaymentRequestedHandler::new(processor, broker.clone())),
                settings.consumer(topics::PAYMENT_SERVICE_GROUP, topics::PAYMENT_REQUESTED),
            ),
            "payment-processor",
        );
        spawn_worker(
            &mut workers,
            &shutdown,
            ConsumerWorker::new(
                broker.clone(),
                Arc::new(PaymentResultHandler::new(reconciler)),
                settings.consumer(topics::SETTLEMENT_SERVICE_GROUP, topics::PAYMENT_RESULT),
            ),
            "result-reconciler",
        );
        spawn_worker(
            &mut workers,
            &shutdown,
            ConsumerWorker::new(
                broker.clone(),
                Arc::new(NotificationRequestedHandler::new(dispatcher)),
                settings.consumer(
                    topics::NOTIFICATION_SERVICE_GROUP,
                    topics::NOTIFICATION_REQUESTED,
                ),
            ),
            "notification-dispatcher",
        );
        tracing::info!(partitions = settings.partitions, "saga runtime started");

        Self {
            broker,
            initiator,
            directory,
            settlement_payments,
            processed_payments,
            notifications,
            gateway,
            shutdown,
            workers,
        }
    }

    /// The broker every component publishes to.
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Entry point for starting settlements.
    pub fn initiator(&self) -> &SettlementInitiator<InMemoryBroker> {
        &self.initiator
    }

    pub fn order_directory(&self) -> &InMemoryOrderDirectory {
        &self.directory
    }

    /// The initiator's payment records.
    pub fn settlement_payments(&self) -> &InMemorySettlementPaymentRepository {
        &self.settlement_payments
    }

    /// The processor's payment records.
    pub fn processed_payments(&self) -> &InMemoryProcessedPaymentRepository {
        &self.processed_payments
    }

    pub fn notifications(&self) -> &InMemoryNotificationRepository {
        &self.notifications
    }

    /// The gateway stub the processor charges.
    pub fn gateway(&self) -> &MockGateway {
        &self.gateway
    }

    /// Stops every consumer and waits for them. In-flight messages finish
    /// first; the first worker failure is returned.
    pub async fn shutdown(mut self) -> Result<(), SagaError> {
        self.shutdown.trigger();

        let mut first_error = None;
        while let Some(joined) = self.workers.join_next().await {
            let error = match joined {
                Ok((component, Ok(()))) => {
                    tracing::debug!(component, "consumer stopped");
                    None
                }
                Ok((component, Err(source))) => Some(SagaError::Worker { component, source }),
                Err(e) => Some(SagaError::WorkerAborted {
                    component: "unknown",
                    reason: e.to_string(),
                }),
            };
            if let Some(error) = error {
                tracing::error!(error = %error, "consumer did not stop cleanly");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                tracing::info!("saga runtime shut down gracefully");
                Ok(())
            }
        }
    }
}

fn spawn_worker<B, H>(
    workers: &mut JoinSet<WorkerOutcome>,
    shutdown: &Shutdown,
    worker: ConsumerWorker<B, H>,
    component: &'static str,
) where
    B: MessageBroker + Clone + 'static,
    H: MessageHandler + 'static,
{
    let signal = shutdown.subscribe();
    workers.spawn(async move { (component, worker.run(signal).await) });
}
