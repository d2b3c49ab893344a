//! One-time passcode records, one per email

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, FromRow};

use super::{fmt_ts, parse_ts};
use crate::infra::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct OtpRecord {
    pub email: String,
    pub otp_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

pub struct SqliteOtpStore {
    pool: SqlitePool,
}

impl SqliteOtpStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a fresh code for `email`, replacing any previous record.
    pub async fn replace(&self, email: &str, otp_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_records (email, otp_hash, expires_at, is_used, created_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(email) DO UPDATE SET
                otp_hash = excluded.otp_hash,
                expires_at = excluded.expires_at,
                is_used = 0,
                created_at = excluded.created_at
            "#,
        )
        .bind(email)
        .bind(otp_hash)
        .bind(fmt_ts(expires_at))
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, email: &str) -> Result<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRow>(
            "SELECT email, otp_hash, expires_at, is_used FROM otp_records WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(OtpRecord {
                expires_at: parse_ts("expires_at", &r.expires_at)?,
                email: r.email,
                otp_hash: r.otp_hash,
                is_used: r.is_used != 0,
            })
        })
        .transpose()
    }

    /// Mark the record used. Returns false if it was already used.
    pub async fn mark_used(&self, email: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE otp_records SET is_used = 1 WHERE email = ? AND is_used = 0")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM otp_records WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct OtpRow {
    email: String,
    otp_hash: String,
    expires_at: String,
    is_used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::sqlite::connect_in_memory;
    use chrono::Duration;

    #[tokio::test]
    async fn replace_resets_used_flag() {
        let store = SqliteOtpStore::new(connect_in_memory().await.unwrap());
        let expires = Utc::now() + Duration::minutes(5);

        store.replace("a@x.in", "h1", expires).await.unwrap();
        assert!(store.mark_used("a@x.in").await.unwrap());
        assert!(!store.mark_used("a@x.in").await.unwrap());

        store.replace("a@x.in", "h2", expires).await.unwrap();
        let record = store.get("a@x.in").await.unwrap().unwrap();
        assert_eq!(record.otp_hash, "h2");
        assert!(!record.is_used);

        store.delete("a@x.in").await.unwrap();
        assert!(store.get("a@x.in").await.unwrap().is_none());
    }
}
