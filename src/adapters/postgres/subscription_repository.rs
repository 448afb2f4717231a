//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Provides persistent storage for Subscription aggregates using PostgreSQL.
//! The subscription row and the payments appended since the last save are
//! written in one transaction; the row update is guarded by `WHERE version = $n`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{
    Payment, PaymentMethod, Subscription, SubscriptionSnapshot, SubscriptionStatus, SubscriptionType,
};
use crate::domain::foundation::{Currency, DomainError, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

use super::payment_reader::{corrupt, db_error, load_payments};

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: SubscriptionRow) -> Result<Subscription, DomainError> {
        let id = SubscriptionId::from_uuid(row.id);
        let payments = load_payments(&self.pool, &id).await?;
        row.into_snapshot(payments)
            .and_then(|snapshot| Subscription::reconstitute(snapshot).map_err(corrupt))
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    subscription_type: String,
    payment_method: String,
    currency: String,
    status: String,
    start_date: NaiveDate,
    failed_attempts: i32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    fn into_snapshot(
        self,
        payments: Vec<Payment>,
    ) -> Result<SubscriptionSnapshot, DomainError> {
        Ok(SubscriptionSnapshot {
            id: SubscriptionId::from_uuid(self.id),
            user_id: UserId::new(self.user_id).map_err(corrupt)?,
            subscription_type: self.subscription_type.parse::<SubscriptionType>().map_err(corrupt)?,
            payment_method: self.payment_method.parse::<PaymentMethod>().map_err(corrupt)?,
            currency: Currency::new(self.currency.trim()).map_err(corrupt)?,
            status: self.status.parse::<SubscriptionStatus>().map_err(corrupt)?,
            start_date: self.start_date,
            payments,
            failed_attempts: u32::try_from(self.failed_attempts).map_err(corrupt)?,
            version: u64::try_from(self.version).map_err(corrupt)?,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
            cancelled_at: self.cancelled_at.map(Timestamp::from_datetime),
        })
    }
}

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT id, user_id, subscription_type, payment_method, currency, status, start_date,
           failed_attempts, version, created_at, updated_at, cancelled_at
    FROM subscriptions
"#;

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let current = subscription.version() as i64;
        let next = current + 1;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let written = if current == 0 {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (
                    id, user_id, subscription_type, payment_method, currency, status,
                    start_date, period_end, failed_attempts, version, created_at, updated_at,
                    cancelled_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(subscription.id.as_uuid())
            .bind(subscription.user_id.as_str())
            .bind(subscription.subscription_type.as_str())
            .bind(subscription.payment_method.as_str())
            .bind(subscription.currency.as_str())
            .bind(subscription.status().as_str())
            .bind(subscription.start_date())
            .bind(subscription.period_end())
            .bind(subscription.failed_attempts() as i32)
            .bind(next)
            .bind(subscription.created_at.as_datetime())
            .bind(*subscription.updated_at().as_datetime())
            .bind(subscription.cancelled_at().map(|t| *t.as_datetime()))
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert subscription"))?
        } else {
            sqlx::query(
                r#"
                UPDATE subscriptions SET
                    status = $3,
                    start_date = $4,
                    period_end = $5,
                    failed_attempts = $6,
                    updated_at = $7,
                    cancelled_at = $8,
                    version = $9
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(subscription.id.as_uuid())
            .bind(current)
            .bind(subscription.status().as_str())
            .bind(subscription.start_date())
            .bind(subscription.period_end())
            .bind(subscription.failed_attempts() as i32)
            .bind(*subscription.updated_at().as_datetime())
            .bind(subscription.cancelled_at().map(|t| *t.as_datetime()))
            .bind(next)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to update subscription"))?
        };

        if written.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(DomainError::conflict(format!(
                "subscription {} was modified concurrently (expected version {})",
                subscription.id, current
            )));
        }

        // The row lock taken above keeps this count stable until commit.
        let stored: i64 = if current == 0 {
            0
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE subscription_id = $1")
                .bind(subscription.id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error("Failed to count payments"))?
        };
        let stored = usize::try_from(stored).map_err(corrupt)?;

        for (position, payment) in subscription.payments().since(stored) {
            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, subscription_id, position, user_id, amount, currency, status,
                    occurred_on, external_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(payment.id.as_uuid())
            .bind(subscription.id.as_uuid())
            .bind(position as i32)
            .bind(payment.user_id.as_str())
            .bind(payment.amount.amount())
            .bind(payment.amount.currency().as_str())
            .bind(payment.status.as_str())
            .bind(payment.occurred_on)
            .bind(&payment.external_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert payment"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit subscription"))?;

        Ok(subscription.clone().with_version(next as u64))
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_SUBSCRIPTION))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Failed to find subscription"))?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_SUBSCRIPTION
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find subscription by user"))?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_expired(
        &self,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE status <> 'cancelled' AND period_end <= $1 ORDER BY period_end LIMIT $2",
            SELECT_SUBSCRIPTION
        ))
        .bind(as_of)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find expired subscriptions"))?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            subscriptions.push(self.hydrate(row).await?);
        }
        Ok(subscriptions)
    }
}
