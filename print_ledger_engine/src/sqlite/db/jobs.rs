use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use super::ts;
use crate::{
    db_types::{Job, JobStatus, MinorUnits, NewJob},
    job_objects::JobQueryFilter,
};

/// Inserts a new `PENDING` job, but only if its shop exists and is active. Returns `None` otherwise.
pub async fn insert_job(job: NewJob, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Option<Job>, sqlx::Error> {
    let job = sqlx::query_as(
        r#"
            INSERT INTO jobs (
                requester_id,
                shop_id,
                copies,
                color_mode,
                paper_size,
                status,
                artifact_ref,
                created_at,
                updated_at
            )
            SELECT $1, id, $2, $3, $4, $5, $6, $7, $7 FROM shops WHERE id = $8 AND is_active = 1
            RETURNING *;
        "#,
    )
    .bind(job.requester_id)
    .bind(job.copies)
    .bind(job.color_mode)
    .bind(job.paper_size)
    .bind(JobStatus::Pending)
    .bind(job.artifact_ref)
    .bind(ts(now))
    .bind(job.shop_id)
    .fetch_optional(conn)
    .await?;
    Ok(job)
}

pub async fn fetch_job(job_id: i64, conn: &mut SqliteConnection) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM jobs WHERE id = $1").bind(job_id).fetch_optional(conn).await
}

/// Takes the write lock and returns the job. See the module docs for why.
pub async fn lock_job(job_id: i64, conn: &mut SqliteConnection) -> Result<Option<Job>, sqlx::Error> {
    trace!("🗃️ Locking job #{job_id}");
    sqlx::query_as("UPDATE jobs SET id = id WHERE id = $1 RETURNING *").bind(job_id).fetch_optional(conn).await
}

pub async fn set_price(
    job_id: i64,
    price: MinorUnits,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Job, sqlx::Error> {
    sqlx::query_as("UPDATE jobs SET price = $1, priced_at = $2, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(price)
        .bind(ts(now))
        .bind(job_id)
        .fetch_one(conn)
        .await
}

pub async fn accept_price(job_id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Job, sqlx::Error> {
    sqlx::query_as(
        "UPDATE jobs SET price_accepted = 1, price_accepted_at = $1, updated_at = $1 WHERE id = $2 RETURNING *",
    )
    .bind(ts(now))
    .bind(job_id)
    .fetch_one(conn)
    .await
}

pub async fn set_status(
    job_id: i64,
    status: JobStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Job, sqlx::Error> {
    sqlx::query_as("UPDATE jobs SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(ts(now))
        .bind(job_id)
        .fetch_one(conn)
        .await
}

pub async fn complete(job_id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Job, sqlx::Error> {
    sqlx::query_as("UPDATE jobs SET status = $1, completed_at = $2, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(JobStatus::Completed)
        .bind(ts(now))
        .bind(job_id)
        .fetch_one(conn)
        .await
}

/// Marks the job as cancelled and clears its artifact reference.
pub async fn cancel(job_id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Job, sqlx::Error> {
    sqlx::query_as("UPDATE jobs SET status = $1, artifact_ref = NULL, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(JobStatus::Cancelled)
        .bind(ts(now))
        .bind(job_id)
        .fetch_one(conn)
        .await
}

/// Locks and returns completed or cancelled jobs created before `cutoff` that still hold an artifact reference.
pub async fn lock_stale_artifacts(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Job>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE jobs SET id = id
            WHERE status IN ($1, $2) AND artifact_ref IS NOT NULL AND created_at < $3
            RETURNING *;
        "#,
    )
    .bind(JobStatus::Completed)
    .bind(JobStatus::Cancelled)
    .bind(ts(cutoff))
    .fetch_all(conn)
    .await
}

pub async fn clear_artifact(job_id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE jobs SET artifact_ref = NULL, updated_at = $1 WHERE id = $2")
        .bind(ts(now))
        .bind(job_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fetches jobs according to criteria specified in the `JobQueryFilter`
///
/// Resulting jobs are ordered by `created_at` in ascending order
pub async fn search_jobs(query: JobQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Job>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM jobs ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(requester_id) = query.requester_id {
        where_clause.push("requester_id = ");
        where_clause.push_bind_unseparated(requester_id);
    }
    if let Some(shop_id) = query.shop_id {
        where_clause.push("shop_id = ");
        where_clause.push_bind_unseparated(shop_id);
    }
    if !query.statuses.is_empty() {
        // statuses come from a closed enum, so they are safe to inline
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Job>().fetch_all(conn).await
}
