use async_trait::async_trait;
use common::{Money, OrderId, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{PaymentError, Result};
use crate::model::{NewProcessedPayment, ProcessedPayment};
use crate::repository::ProcessedPaymentRepository;

const COLUMNS: &str = "id, request_payment_id, order_id, external_payment_id, amount, currency, \
                       status, failure_reason, created_at";

/// PostgreSQL-backed payment repository.
#[derive(Clone)]
pub struct PostgresProcessedPaymentRepository {
    pool: PgPool,
}

impl PostgresProcessedPaymentRepository {
    /// Creates a new repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn row_to_payment(row: PgRow) -> Result<ProcessedPayment> {
        let status: String = row.try_get("status")?;
        let status: PaymentStatus = status.parse().map_err(|e: common::UnknownVariant| {
            PaymentError::Database(sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })
        })?;
        let amount: Decimal = row.try_get("amount")?;

        Ok(ProcessedPayment {
            id: PaymentId::new(row.try_get("id")?),
            request_payment_id: PaymentId::new(row.try_get("request_payment_id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            external_payment_id: row.try_get("external_payment_id")?,
            amount: Money::new(amount),
            currency: row.try_get("currency")?,
            status,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProcessedPaymentRepository for PostgresProcessedPaymentRepository {
    async fn insert(&self, new: NewProcessedPayment) -> Result<ProcessedPayment> {
        let request_payment_id = new.request_payment_id;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO processed_payments
                (request_payment_id, order_id, external_payment_id, amount, currency, status, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.request_payment_id.as_i64())
        .bind(new.order_id.as_i64())
        .bind(&new.external_payment_id)
        .bind(new.amount.as_decimal())
        .bind(&new.currency)
        .bind(new.status.as_str())
        .bind(&new.failure_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_request_payment_id")
            {
                return PaymentError::Duplicate(request_payment_id);
            }
            PaymentError::Database(e)
        })?;

        Self::row_to_payment(row)
    }

    async fn find_by_request(
        &self,
        request_payment_id: PaymentId,
    ) -> Result<Option<ProcessedPayment>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM processed_payments WHERE request_payment_id = $1"
        ))
        .bind(request_payment_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<ProcessedPayment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM processed_payments WHERE order_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
