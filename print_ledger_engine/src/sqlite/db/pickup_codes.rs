use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ts;
use crate::db_types::{NewPickupCode, PickupCode};

pub async fn insert_code(
    code: NewPickupCode,
    requester_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PickupCode, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO pickup_codes (job_id, requester_id, code, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(code.job_id)
    .bind(requester_id)
    .bind(code.code)
    .bind(ts(code.expires_at))
    .bind(ts(now))
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_job(job_id: i64, conn: &mut SqliteConnection) -> Result<Option<PickupCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM pickup_codes WHERE job_id = $1").bind(job_id).fetch_optional(conn).await
}

/// Deletes the job's code. Returns `false` if there was nothing to delete.
pub async fn delete_for_job(job_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pickup_codes WHERE job_id = $1").bind(job_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes every code that expired at or before `now` and returns the job ids they belonged to.
pub async fn delete_expired(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("DELETE FROM pickup_codes WHERE expires_at <= $1 RETURNING job_id")
        .bind(ts(now))
        .fetch_all(conn)
        .await
}
