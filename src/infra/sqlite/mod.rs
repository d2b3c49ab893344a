//! SQLite implementations of the desk stores
//!
//! All stores share one [`SqlitePool`]. Timestamps are written as fixed-width
//! RFC 3339 strings so that lexical comparison in SQL matches time order.

mod accounts;
mod bills;
mod catalog;
mod complaints;
mod ledger;
mod otp;

pub use accounts::*;
pub use bills::*;
pub use catalog::*;
pub use complaints::*;
pub use ledger::*;
pub use otp::*;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::infra::{DeskError, Result};

/// Open a pool for `database_url`, creating the file if needed.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory pool with migrations applied.
///
/// An in-memory SQLite database lives on one connection, so the pool is
/// capped at one.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    crate::migrations::run_sqlite(&pool)
        .await
        .map_err(|e| DeskError::Internal(format!("migration failed: {e}")))?;
    Ok(pool)
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DeskError::Internal(format!("invalid {column}: {e}")))
}

pub(crate) fn parse_opt_ts(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(column, &v)).transpose()
}

pub(crate) fn parse_enum<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse::<T>().map_err(DeskError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn timestamps_sort_lexically() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + Duration::milliseconds(1500);
        assert!(fmt_ts(a) < fmt_ts(b));
        assert_eq!(parse_ts("t", &fmt_ts(b)).unwrap(), b);
    }

    #[tokio::test]
    async fn in_memory_pool_is_migrated() {
        let pool = connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM complaints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
