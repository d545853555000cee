use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::ts;
use crate::db_types::{NewShop, Shop};

pub async fn insert_shop(shop: NewShop, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Shop, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO shops (id, name, is_active, created_at, updated_at)
            VALUES ($1, $2, 1, $3, $3)
            RETURNING *;
        "#,
    )
    .bind(shop.id)
    .bind(shop.name)
    .bind(ts(now))
    .fetch_one(conn)
    .await
}

pub async fn fetch_shop(shop_id: &str, conn: &mut SqliteConnection) -> Result<Option<Shop>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shops WHERE id = $1").bind(shop_id).fetch_optional(conn).await
}

pub async fn set_active(
    shop_id: &str,
    active: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Shop>, sqlx::Error> {
    sqlx::query_as("UPDATE shops SET is_active = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(active)
        .bind(ts(now))
        .bind(shop_id)
        .fetch_optional(conn)
        .await
}
