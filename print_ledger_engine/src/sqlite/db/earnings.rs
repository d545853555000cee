use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use super::ts;
use crate::{
    db_types::{Earning, NewEarning},
    traits::{EarningsSummary, UnsettledBalance},
};

pub async fn insert_earning(
    earning: NewEarning,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Earning, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO earnings (shop_id, job_id, gross_amount, platform_fee, net_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(earning.shop_id)
    .bind(earning.job_id)
    .bind(earning.gross_amount)
    .bind(earning.platform_fee)
    .bind(earning.net_amount)
    .bind(ts(now))
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_job(job_id: i64, conn: &mut SqliteConnection) -> Result<Option<Earning>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM earnings WHERE job_id = $1").bind(job_id).fetch_optional(conn).await
}

pub async fn fetch_for_shop(shop_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Earning>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM earnings WHERE shop_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(shop_id)
        .fetch_all(conn)
        .await
}

/// Takes the write lock and returns the shop's unsettled earnings, oldest first.
pub async fn lock_unsettled(shop_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Earning>, sqlx::Error> {
    trace!("🗃️ Locking unsettled earnings for shop {shop_id}");
    let mut earnings: Vec<Earning> =
        sqlx::query_as("UPDATE earnings SET id = id WHERE shop_id = $1 AND settled_at IS NULL RETURNING *")
            .bind(shop_id)
            .fetch_all(conn)
            .await?;
    // RETURNING does not honour ORDER BY
    earnings.sort_by_key(|e| e.id);
    Ok(earnings)
}

/// Stamps a single earning as settled. Returns the number of rows changed, which is zero if it was already settled.
pub async fn mark_settled(
    earning_id: i64,
    settlement_ref: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE earnings SET settled_at = $1, settlement_ref = $2 WHERE id = $3 AND settled_at IS NULL")
            .bind(ts(now))
            .bind(settlement_ref)
            .bind(earning_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}

pub async fn unsettled_balances(
    shop_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<UnsettledBalance>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        "SELECT shop_id, SUM(net_amount) AS total_net, COUNT(*) AS count FROM earnings WHERE settled_at IS NULL",
    );
    if let Some(shop_id) = shop_id {
        builder.push(" AND shop_id = ");
        builder.push_bind(shop_id);
    }
    builder.push(" GROUP BY shop_id ORDER BY shop_id");
    builder.build_query_as::<UnsettledBalance>().fetch_all(conn).await
}

pub async fn summary(shop_id: &str, conn: &mut SqliteConnection) -> Result<EarningsSummary, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                COALESCE(SUM(gross_amount), 0) AS total_gross,
                COALESCE(SUM(platform_fee), 0) AS total_platform_fee,
                COALESCE(SUM(net_amount), 0) AS total_net,
                COALESCE(SUM(CASE WHEN settled_at IS NOT NULL THEN net_amount ELSE 0 END), 0) AS total_settled,
                COALESCE(SUM(CASE WHEN settled_at IS NULL THEN net_amount ELSE 0 END), 0) AS pending_settlement
            FROM earnings
            WHERE shop_id = $1;
        "#,
    )
    .bind(shop_id)
    .fetch_one(conn)
    .await
}
