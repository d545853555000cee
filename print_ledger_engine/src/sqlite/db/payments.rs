use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use super::ts;
use crate::db_types::{MinorUnits, NewPayment, Payment, PaymentStatus, PaymentTransition};

/// Inserts a new `INITIATED` payment. Unique constraint violations on the job or the idempotency key are returned
/// as-is, so that the caller can resolve them to the existing payment.
pub async fn insert_payment(
    payment: &NewPayment,
    amount: MinorUnits,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payments (job_id, amount, method, status, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(payment.job_id)
    .bind(amount)
    .bind(payment.method)
    .bind(PaymentStatus::Initiated)
    .bind(&payment.idempotency_key)
    .bind(ts(now))
    .fetch_one(conn)
    .await
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await
}

pub async fn fetch_for_job(job_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE job_id = $1").bind(job_id).fetch_optional(conn).await
}

pub async fn fetch_by_idempotency_key(key: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE idempotency_key = $1").bind(key).fetch_optional(conn).await
}

pub async fn fetch_by_gateway_order(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE gateway_order_id = $1")
        .bind(gateway_order_id)
        .fetch_optional(conn)
        .await
}

pub async fn lock_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    trace!("🗃️ Locking payment #{payment_id}");
    sqlx::query_as("UPDATE payments SET id = id WHERE id = $1 RETURNING *").bind(payment_id).fetch_optional(conn).await
}

pub async fn lock_by_gateway_order(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    trace!("🗃️ Locking payment for gateway order {gateway_order_id}");
    sqlx::query_as("UPDATE payments SET id = id WHERE gateway_order_id = $1 RETURNING *")
        .bind(gateway_order_id)
        .fetch_optional(conn)
        .await
}

/// Sets the payment status without touching any other field. Used by the cancellation rule.
pub async fn set_status(
    payment_id: i64,
    status: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as("UPDATE payments SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(ts(now))
        .bind(payment_id)
        .fetch_one(conn)
        .await
}

/// Writes the fields that go with `transition`. The caller must already have checked that the transition applies.
pub async fn apply_transition(
    payment_id: i64,
    transition: &PaymentTransition,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let now = ts(now);
    let status = transition.to_status();
    let query = match transition {
        PaymentTransition::ConfirmOffline => sqlx::query_as(
            "UPDATE payments SET status = $1, paid_at = $2, vendor_confirmed_at = $2, updated_at = $2 WHERE id = $3 \
             RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(payment_id),
        PaymentTransition::ConfirmMock => {
            sqlx::query_as("UPDATE payments SET status = $1, paid_at = $2, updated_at = $2 WHERE id = $3 RETURNING *")
                .bind(status)
                .bind(now)
                .bind(payment_id)
        },
        PaymentTransition::GatewayPaid { gateway_payment_id } => sqlx::query_as(
            "UPDATE payments SET status = $1, paid_at = $2, updated_at = $2, gateway_payment_id = $3 WHERE id = $4 \
             RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(gateway_payment_id.clone())
        .bind(payment_id),
        PaymentTransition::GatewayFailed { reason } | PaymentTransition::RefundFailed { reason } => sqlx::query_as(
            "UPDATE payments SET status = $1, updated_at = $2, failure_reason = $3 WHERE id = $4 RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(reason.clone())
        .bind(payment_id),
        PaymentTransition::Refunded => sqlx::query_as(
            "UPDATE payments SET status = $1, refunded_at = $2, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(payment_id),
    };
    query.fetch_one(conn).await
}

pub async fn set_gateway_order(
    payment_id: i64,
    gateway_order_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as("UPDATE payments SET gateway_order_id = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(gateway_order_id)
        .bind(ts(now))
        .bind(payment_id)
        .fetch_one(conn)
        .await
}
