//! Officer points ledger and leaderboard aggregation

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, FromRow, SqliteConnection};

use super::{fmt_ts, parse_enum, parse_ts};
use crate::domain::{
    rank_officers, ComplaintId, LeaderboardEntry, LedgerDraft, OfficerId, OfficerTotals, Outcome,
};
use crate::infra::Result;

/// A stored ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub officer_id: OfficerId,
    pub complaint_id: ComplaintId,
    pub points: f64,
    pub outcome: Outcome,
    pub reason: String,
    pub formula_snapshot: String,
    pub created_at: DateTime<Utc>,
}

pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an entry unless the complaint was already scored.
    pub async fn record(&self, draft: &LedgerDraft, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, draft, now).await
    }

    pub async fn entries_for(&self, officer_id: &OfficerId) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT officer_id, complaint_id, points, outcome, reason, formula_snapshot, created_at
            FROM points_ledger WHERE officer_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(officer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(LedgerEntry {
                    outcome: parse_enum(&r.outcome)?,
                    created_at: parse_ts("created_at", &r.created_at)?,
                    officer_id: OfficerId(r.officer_id),
                    complaint_id: ComplaintId(r.complaint_id),
                    points: r.points,
                    reason: r.reason,
                    formula_snapshot: r.formula_snapshot,
                })
            })
            .collect()
    }

    /// Every officer ranked by total points, including officers with no entries.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let rows: Vec<(String, String, f64, i64)> = sqlx::query_as(
            r#"
            SELECT o.off_id,
                   o.name,
                   COALESCE(SUM(l.points), 0.0) AS total_points,
                   COALESCE(SUM(CASE WHEN l.outcome IN ('on_time', 'late') THEN 1 ELSE 0 END), 0) AS resolved
            FROM officers o
            LEFT JOIN points_ledger l ON l.officer_id = o.off_id
            GROUP BY o.off_id, o.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rank_officers(
            rows.into_iter()
                .map(|(officer_id, name, total_points, resolved)| OfficerTotals {
                    officer_id: OfficerId(officer_id),
                    name,
                    total_points,
                    resolved,
                })
                .collect(),
        ))
    }

    /// Ranking row for a single officer.
    pub async fn standing(&self, officer_id: &OfficerId) -> Result<Option<LeaderboardEntry>> {
        Ok(self
            .leaderboard()
            .await?
            .into_iter()
            .find(|e| &e.officer_id == officer_id))
    }
}

/// Insert a ledger entry on an open connection or transaction.
///
/// Returns false when the complaint already has an entry.
pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    draft: &LedgerDraft,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO points_ledger (officer_id, complaint_id, points, outcome, reason, formula_snapshot, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(complaint_id) DO NOTHING
        "#,
    )
    .bind(draft.officer_id.as_str())
    .bind(draft.complaint_id.0)
    .bind(draft.points)
    .bind(draft.outcome.as_str())
    .bind(&draft.reason)
    .bind(&draft.formula_snapshot)
    .bind(fmt_ts(now))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    officer_id: String,
    complaint_id: i64,
    points: f64,
    outcome: String,
    reason: String,
    formula_snapshot: String,
    created_at: String,
}
