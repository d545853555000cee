use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use super::ts;
use crate::db_types::{AuditEntry, EntityType, NewAuditEntry};

/// Appends an entry to the audit log. Call this inside the transaction that makes the change being recorded.
pub async fn insert_entry(
    entry: NewAuditEntry,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let metadata = entry.metadata.to_string();
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO audit_log (entity_type, entity_id, action, actor_type, actor_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id;
        "#,
    )
    .bind(entry.entity_type)
    .bind(&entry.entity_id)
    .bind(entry.action)
    .bind(entry.actor.actor_type())
    .bind(entry.actor.id())
    .bind(metadata)
    .bind(ts(now))
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Audit #{id}: {} {} {} by {}", entry.entity_type, entry.entity_id, entry.action, entry.actor);
    Ok(id)
}

pub async fn fetch_entries(
    entity_type: EntityType,
    entity_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM audit_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY id ASC")
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(conn)
        .await
}
