//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p settlement --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{
    ContactType, Money, NotificationRequested, OrderId, PaymentId, PaymentOutcome, PaymentResult,
    PaymentStatus,
};
use messaging::{InMemoryBroker, testing::fresh_pool};
use rust_decimal_macros::dec;
use settlement::{
    CustomerContact, InMemoryOrderDirectory, NewSettlementPayment,
    PostgresSettlementPaymentRepository, ResultReconciler, SettlementError,
    SettlementPaymentRepository,
};

const SCHEMA: &str = include_str!("../migrations/001_create_settlement_payments_table.sql");

/// Get a fresh repository with its own pool and a cleared table
async fn get_test_repository() -> PostgresSettlementPaymentRepository {
    PostgresSettlementPaymentRepository::new(fresh_pool(SCHEMA, &["settlement_payments"]).await)
}

fn new_payment(contact: Option<CustomerContact>) -> NewSettlementPayment {
    NewSettlementPayment {
        order_id: OrderId::new(1),
        amount: Money::new(dec!(99.99)),
        contact,
    }
}

#[tokio::test]
async fn create_and_find() {
    let repo = get_test_repository().await;

    let created = repo
        .create(new_payment(Some(CustomerContact::sms("+4912345"))))
        .await
        .unwrap();
    assert_eq!(created.id, PaymentId::new(1));
    assert_eq!(created.status, PaymentStatus::Pending);

    let found = repo.find(created.id).await.unwrap().unwrap();
    assert_eq!(found.amount, Money::new(dec!(99.99)));
    assert_eq!(found.contact, Some(CustomerContact::sms("+4912345")));
    assert!(found.external_payment_id.is_none());

    let without_contact = repo.create(new_payment(None)).await.unwrap();
    assert!(repo.find(without_contact.id).await.unwrap().unwrap().contact.is_none());
    assert_eq!(repo.find_by_order(OrderId::new(1)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn status_moves_out_of_pending_once() {
    let repo = get_test_repository().await;
    let mut payment = repo.create(new_payment(None)).await.unwrap();

    payment
        .apply_outcome(PaymentOutcome::Succeeded, Some("pi_1".into()))
        .unwrap();
    repo.save(&payment).await.unwrap();

    let mut flipped = repo.find(payment.id).await.unwrap().unwrap();
    assert_eq!(flipped.status, PaymentStatus::Succeeded);
    assert_eq!(flipped.external_payment_id.as_deref(), Some("pi_1"));

    flipped.status = PaymentStatus::Failed;
    flipped.external_payment_id = None;
    let result = repo.save(&flipped).await;
    assert!(matches!(
        result,
        Err(SettlementError::InvalidTransition {
            from: PaymentStatus::Succeeded,
            to: PaymentStatus::Failed
        })
    ));

    payment.id = PaymentId::new(999);
    assert!(matches!(
        repo.save(&payment).await,
        Err(SettlementError::NotFound(_))
    ));
}

#[tokio::test]
async fn reconciler_updates_postgres_row() {
    let repo = get_test_repository().await;
    let broker = InMemoryBroker::new();
    let payment = repo
        .create(new_payment(Some(CustomerContact::email("user@example.com"))))
        .await
        .unwrap();
    let reconciler = ResultReconciler::new(
        Arc::new(repo.clone()),
        Arc::new(InMemoryOrderDirectory::new()),
        broker.clone(),
    );

    reconciler
        .reconcile(&PaymentResult::failed(OrderId::new(1), payment.id, "card_declined"))
        .await
        .unwrap();

    let stored = repo.find(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);

    let notifications = broker.published::<NotificationRequested>().await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].contact_type, ContactType::Email);
    assert_eq!(notifications[0].contact, "user@example.com");
}

#[tokio::test]
async fn success_without_gateway_reference_is_stored() {
    let repo = get_test_repository().await;
    let mut payment = repo.create(new_payment(None)).await.unwrap();

    payment.apply_outcome(PaymentOutcome::Succeeded, None).unwrap();
    repo.save(&payment).await.unwrap();

    let stored = repo.find(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Succeeded);
    assert!(stored.external_payment_id.is_none());
}
