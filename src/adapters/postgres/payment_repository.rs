//! PostgreSQL implementation of PaymentRepository.
//!
//! Provides persistent storage for PaymentRecord aggregates. Per-user
//! serialization of the create-or-update path uses a transaction-scoped
//! advisory lock keyed on the user id; the reconcile path is a single
//! conditional UPDATE, atomic by construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{BillingStatus, PaymentRecord};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::ports::PaymentRepository;

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    /// Creates a new PostgresPaymentRepository with the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment record.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    payment_intent_id: String,
    payment_method_id: Option<String>,
    gateway_customer_id: String,
    amount_cents: i64,
    currency: String,
    subscription_id: Option<String>,
    status: String,
    last_event_at: Option<DateTime<Utc>>,
    client_secret: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = BillingStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid status value: {}", row.status),
            )
        })?;

        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            payment_intent_id: row.payment_intent_id,
            payment_method_id: row.payment_method_id,
            gateway_customer_id: row.gateway_customer_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            subscription_id: row.subscription_id,
            status,
            last_event_at: row.last_event_at.map(Timestamp::from_datetime),
            client_secret: row.client_secret,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, payment_intent_id, payment_method_id, gateway_customer_id,
           amount_cents, currency, subscription_id, status, last_event_at,
           client_secret, created_at, updated_at
    FROM payments
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn upsert_active(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // Serialize concurrent create-or-update per user. The lock is
        // released at transaction end.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(record.user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to acquire user lock", e))?;

        sqlx::query("DELETE FROM payments WHERE user_id = $1 AND id <> $2")
            .bind(record.user_id.as_uuid())
            .bind(record.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to clear previous payment record", e))?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, payment_intent_id, payment_method_id, gateway_customer_id,
                amount_cents, currency, subscription_id, status, last_event_at,
                client_secret, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                payment_intent_id = EXCLUDED.payment_intent_id,
                payment_method_id = EXCLUDED.payment_method_id,
                gateway_customer_id = EXCLUDED.gateway_customer_id,
                amount_cents = EXCLUDED.amount_cents,
                currency = EXCLUDED.currency,
                subscription_id = EXCLUDED.subscription_id,
                status = EXCLUDED.status,
                last_event_at = EXCLUDED.last_event_at,
                client_secret = EXCLUDED.client_secret,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(&record.payment_intent_id)
        .bind(&record.payment_method_id)
        .bind(&record.gateway_customer_id)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(&record.subscription_id)
        .bind(record.status.as_str())
        .bind(record.last_event_at.map(|t| *t.as_datetime()))
        .bind(&record.client_secret)
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to upsert payment record", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit payment upsert", e))?;

        Ok(())
    }

    async fn update(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                payment_method_id = $2,
                subscription_id = $3,
                status = $4,
                last_event_at = $5,
                client_secret = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.payment_method_id)
        .bind(&record.subscription_id)
        .bind(record.status.as_str())
        .bind(record.last_event_at.map(|t| *t.as_datetime()))
        .bind(&record.client_secret)
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update payment record", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "Payment record not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load payment record", e))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load payment record", e))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_by_intent_id(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE payment_intent_id = $1", SELECT_COLUMNS))
                .bind(intent_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load payment record", e))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE subscription_id = $1", SELECT_COLUMNS))
                .bind(subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load payment record", e))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn apply_status_if_newer(
        &self,
        subscription_id: &str,
        status: BillingStatus,
        client_secret: Option<&str>,
        event_time: Timestamp,
    ) -> Result<bool, DomainError> {
        // Atomic compare-and-set on the stored event time: concurrent
        // webhook and user-initiated reconciliations cannot lose updates.
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                client_secret = $3,
                last_event_at = $4,
                updated_at = NOW()
            WHERE subscription_id = $1
              AND (last_event_at IS NULL OR last_event_at < $4)
            "#,
        )
        .bind(subscription_id)
        .bind(status.as_str())
        .bind(client_secret)
        .bind(event_time.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to reconcile payment status", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a stale event from a missing record.
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM payments WHERE subscription_id = $1")
                .bind(subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to check payment record", e))?;

        if exists.is_some() {
            Ok(false)
        } else {
            Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                "No payment record for subscription",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Row conversion is the only logic testable without a live database;
    // query behavior is covered by the in-memory twin and integration
    // environments.

    fn row(status: &str) -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            payment_intent_id: "pi_1".to_string(),
            payment_method_id: Some("pm_1".to_string()),
            gateway_customer_id: "cus_1".to_string(),
            amount_cents: 1999,
            currency: "usd".to_string(),
            subscription_id: Some("sub_1".to_string()),
            status: status.to_string(),
            last_event_at: None,
            client_secret: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = PaymentRecord::try_from(row("requires_action")).unwrap();
        assert_eq!(record.status, BillingStatus::RequiresAction);
        assert_eq!(record.subscription_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        let result = PaymentRecord::try_from(row("mystery"));
        assert!(result.is_err());
    }
}
