//! PostgreSQL implementation of PaymentReader.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::billing::{Payment, PaymentStatus};
use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, PaymentId, SubscriptionId, UserId,
};
use crate::ports::PaymentReader;

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct PaymentRow {
    id: Uuid,
    subscription_id: Uuid,
    user_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    occurred_on: NaiveDate,
    external_id: Option<String>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = Currency::new(row.currency.trim()).map_err(corrupt)?;
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            user_id: UserId::new(row.user_id).map_err(corrupt)?,
            amount: Money::new(row.amount, currency),
            status: row.status.parse::<PaymentStatus>().map_err(corrupt)?,
            occurred_on: row.occurred_on,
            external_id: row.external_id,
        })
    }
}

/// Maps a malformed stored value to a database error.
pub(super) fn corrupt(err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored value: {}", err))
}

pub(super) fn db_error(context: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::database(format!("{}: {}", context, e))
}

/// Payments of one subscription in arrival order.
pub(super) async fn load_payments<'e>(
    executor: impl PgExecutor<'e>,
    subscription_id: &SubscriptionId,
) -> Result<Vec<Payment>, DomainError> {
    let rows: Vec<PaymentRow> = sqlx::query_as(
        r#"
        SELECT id, subscription_id, user_id, amount, currency, status, occurred_on, external_id
        FROM payments
        WHERE subscription_id = $1
        ORDER BY position
        "#,
    )
    .bind(subscription_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(db_error("Failed to load payments"))?;

    rows.into_iter().map(Payment::try_from).collect()
}

/// PostgreSQL implementation of the PaymentReader port.
pub struct PostgresPaymentReader {
    pool: PgPool,
}

impl PostgresPaymentReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentReader for PostgresPaymentReader {
    async fn find_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        load_payments(&self.pool, subscription_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, currency: &str) -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            amount: Decimal::new(999, 2),
            currency: currency.to_string(),
            status: status.to_string(),
            occurred_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            external_id: Some("evt_1".to_string()),
        }
    }

    #[test]
    fn row_maps_to_payment() {
        let payment = Payment::try_from(row("succeeded", "USD")).unwrap();

        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.amount, Money::from_minor_units(999, Currency::USD));
        assert_eq!(payment.external_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn high_scale_amount_maps_exactly() {
        let mut fine = row("succeeded", "USD");
        fine.amount = Decimal::new(1_234_567_891, 8);

        let payment = Payment::try_from(fine).unwrap();

        assert_eq!(payment.amount.amount(), Decimal::new(1_234_567_891, 8));
    }

    #[test]
    fn amount_column_keeps_full_decimal_precision() {
        let schema = include_str!("../../../migrations/20260101000000_billing.sql");
        let amount = schema
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("amount"))
            .unwrap();

        assert_eq!(amount.split_whitespace().nth(1), Some("NUMERIC"));
        assert!(!amount.contains('('), "amount column is constrained: {}", amount);
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = Payment::try_from(row("refunded", "USD")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
