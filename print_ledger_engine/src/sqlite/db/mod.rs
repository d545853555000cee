//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Functions named `lock_*` issue an `UPDATE` that changes nothing and return the matched rows. Used as the first
//! statement of a transaction, they take SQLite's write lock up front, so that the rows they return cannot change
//! until the transaction ends.
use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod audit;
pub mod earnings;
pub mod jobs;
pub mod payments;
pub mod pickup_codes;
pub mod shops;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    info!("🗃️ Connected to {url} with up to {max_connections} connections");
    Ok(pool)
}

/// Timestamps are stored as fixed-width RFC 3339 text in UTC, so that SQL string comparison orders them correctly.
pub(crate) fn ts(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 59).unwrap();
        let b = a + chrono::Duration::milliseconds(500);
        let c = a + chrono::Duration::seconds(1);
        assert_eq!(ts(a), "2024-05-01T09:59:59.000000Z");
        assert!(ts(a) < ts(b));
        assert!(ts(b) < ts(c));
    }
}
