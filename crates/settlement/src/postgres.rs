use async_trait::async_trait;
use chrono::Utc;
use common::{ContactType, Money, OrderId, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{Result, SettlementError};
use crate::model::{CustomerContact, NewSettlementPayment, SettlementPayment};
use crate::repository::SettlementPaymentRepository;

const COLUMNS: &str = "id, order_id, external_payment_id, amount, status, contact, contact_type, \
                       created_at, updated_at";

/// PostgreSQL-backed settlement repository.
#[derive(Clone)]
pub struct PostgresSettlementPaymentRepository {
    pool: PgPool,
}

impl PostgresSettlementPaymentRepository {
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

    fn row_to_payment(row: PgRow) -> Result<SettlementPayment> {
        let amount: Decimal = row.try_get("amount")?;
        let contact: Option<String> = row.try_get("contact")?;
        let contact = match contact {
            Some(contact) => Some(CustomerContact {
                contact_type: parse_column::<ContactType>(&row, "contact_type")?,
                contact,
            }),
            None => None,
        };

        Ok(SettlementPayment {
            id: PaymentId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            external_payment_id: row.try_get("external_payment_id")?,
            amount: Money::new(amount),
            status: parse_column::<PaymentStatus>(&row, "status")?,
            contact,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = common::UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: common::UnknownVariant| {
        SettlementError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
}

#[async_trait]
impl SettlementPaymentRepository for PostgresSettlementPaymentRepository {
    async fn create(&self, new: NewSettlementPayment) -> Result<SettlementPayment> {
        let (contact, contact_type) = match &new.contact {
            Some(c) => (Some(c.contact.as_str()), Some(c.contact_type.as_str())),
            None => (None, None),
        };

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO settlement_payments (order_id, amount, status, contact, contact_type)
            VALUES ($1, $2, 'PENDING', $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.order_id.as_i64())
        .bind(new.amount.as_decimal())
        .bind(contact)
        .bind(contact_type)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_payment(row)
    }

    async fn find(&self, id: PaymentId) -> Result<Option<SettlementPayment>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM settlement_payments WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<SettlementPayment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM settlement_payments WHERE order_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn save(&self, payment: &SettlementPayment) -> Result<()> {
        // Only PENDING rows change.
        let updated = sqlx::query(
            r#"
            UPDATE settlement_payments
            SET status = $2, external_payment_id = $3, updated_at = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(payment.id.as_i64())
        .bind(payment.status.as_str())
        .bind(&payment.external_payment_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        match self.find(payment.id).await? {
            None => Err(SettlementError::NotFound(payment.id)),
            Some(stored) => Err(SettlementError::InvalidTransition {
                from: stored.status,
                to: payment.status,
            }),
        }
    }
}
