//! Complaint persistence: filing, listing, upvotes, comments and status changes
//!
//! Status changes are compare-and-set on the current status so two concurrent
//! updates cannot both apply. Verification records the officer's ledger entry
//! in the same transaction.

use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqlitePool, FromRow, SqliteConnection};
use tracing::warn;

use super::{fmt_ts, parse_enum, parse_opt_ts, parse_ts};
use crate::domain::{
    calculate_priority, citizen_verify, evaluate_verified, Comment, Complaint, ComplaintId,
    ComplaintStatus, LedgerDraft, OfficerId, PriorityLevel, ReviewFlag, UserId,
    CANDIDATE_WINDOW_DAYS,
};
use crate::infra::sqlite::ledger::insert_entry;
use crate::infra::sqlite::accounts::unique_violation;
use crate::infra::{DeskError, Result};

const COMPLAINT_COLUMNS: &str = r#"
    id, title, description, issue_type, image, latitude, longitude, area, status,
    upvote_count, created_by, officer_id, proof, priority_score, priority_level,
    duplicate_of, review_flag, created_at, updated_at, resolved_at, verified_at
"#;

/// A complaint ready to be stored, with routing and screening already done.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub issue_type: String,
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
    pub area: String,
    pub created_by: UserId,
    pub officer_id: OfficerId,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub duplicate_of: Option<ComplaintId>,
    pub review_flag: Option<ReviewFlag>,
    pub created_at: DateTime<Utc>,
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub created_by: Option<UserId>,
    pub officer_id: Option<OfficerId>,
    pub status: Option<ComplaintStatus>,
}

/// Upvote result returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpvoteOutcome {
    pub upvote_count: i64,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
}

/// Verification result, including the ledger entry if one was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub complaint_id: ComplaintId,
    pub verified_at: DateTime<Utc>,
    pub ledger_entry: Option<LedgerDraft>,
}

pub struct SqliteComplaintStore {
    pool: SqlitePool,
}

impl SqliteComplaintStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, complaint: &NewComplaint) -> Result<ComplaintId> {
        let created_at = fmt_ts(complaint.created_at);
        let result = sqlx::query(
            r#"
            INSERT INTO complaints (
                title, description, issue_type, image, latitude, longitude, area,
                status, upvote_count, created_by, officer_id, priority_score, priority_level,
                duplicate_of, review_flag, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&complaint.title)
        .bind(&complaint.description)
        .bind(&complaint.issue_type)
        .bind(&complaint.image)
        .bind(complaint.latitude)
        .bind(complaint.longitude)
        .bind(&complaint.area)
        .bind(complaint.created_by.0)
        .bind(complaint.officer_id.as_str())
        .bind(complaint.priority_score)
        .bind(complaint.priority_level.as_str())
        .bind(complaint.duplicate_of.map(|id| id.0))
        .bind(complaint.review_flag.map(|f| f.as_str()))
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(ComplaintId(result.last_insert_rowid()))
    }

    pub async fn get(&self, id: ComplaintId) -> Result<Option<Complaint>> {
        let row = sqlx::query_as::<_, ComplaintRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Complaint::try_from).transpose()
    }

    pub async fn require(&self, id: ComplaintId) -> Result<Complaint> {
        self.get(id)
            .await?
            .ok_or_else(|| DeskError::not_found("complaint", id))
    }

    /// Complaints matching `filter`, newest first.
    pub async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints
            WHERE (?1 IS NULL OR created_by = ?1)
              AND (?2 IS NULL OR officer_id = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.created_by.map(|id| id.0))
        .bind(filter.officer_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    /// Complaints filed inside the duplicate-screening window that are not
    /// themselves confirmed duplicates.
    pub async fn recent_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Complaint>> {
        let cutoff = fmt_ts(now - Duration::days(CANDIDATE_WINDOW_DAYS));
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints
            WHERE (review_flag IS NULL OR review_flag != 'duplicate') AND created_at >= ?
            ORDER BY created_at DESC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    /// Comment thread, oldest first, with commenter names.
    pub async fn comments(&self, id: ComplaintId) -> Result<Vec<Comment>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT c.comment_text, u.name, c.created_at
            FROM complaint_comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.complaint_id = ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(text, user, time)| {
                Ok(Comment {
                    text,
                    user,
                    time: parse_ts("created_at", &time)?,
                })
            })
            .collect()
    }

    /// Append a comment. Length and emptiness are checked by the caller.
    pub async fn add_comment(&self, id: ComplaintId, user: UserId, text: &str) -> Result<()> {
        self.require(id).await?;
        sqlx::query(
            "INSERT INTO complaint_comments (complaint_id, user_id, comment_text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(user.0)
        .bind(text)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record one upvote per citizen and recompute priority.
    pub async fn upvote(&self, id: ComplaintId, user: UserId, now: DateTime<Utc>) -> Result<UpvoteOutcome> {
        let mut tx = self.pool.begin().await?;

        let complaint = fetch_in(&mut tx, id).await?;
        if complaint.is_owned_by(user) {
            return Err(DeskError::validation("you cannot upvote your own complaint"));
        }

        sqlx::query("INSERT INTO complaint_upvotes (complaint_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id.0)
            .bind(user.0)
            .bind(fmt_ts(now))
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, "you have already upvoted this complaint"))?;

        let severity: Option<(i64,)> =
            sqlx::query_as("SELECT base_severity FROM issue_types WHERE name = ?")
                .bind(&complaint.issue_type)
                .fetch_optional(&mut *tx)
                .await?;

        let upvote_count = complaint.upvote_count + 1;
        let priority_score = calculate_priority(
            upvote_count,
            complaint.hours_open(now),
            severity.map(|s| s.0).unwrap_or(0),
        );
        let priority_level = PriorityLevel::from_score(priority_score);

        sqlx::query(
            r#"
            UPDATE complaints
            SET upvote_count = ?, priority_score = ?, priority_level = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(upvote_count)
        .bind(priority_score)
        .bind(priority_level.as_str())
        .bind(fmt_ts(now))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpvoteOutcome {
            upvote_count,
            priority_score,
            priority_level,
        })
    }

    /// Apply an officer status change if the complaint is still in `expected`.
    pub async fn apply_officer_update(
        &self,
        id: ComplaintId,
        expected: ComplaintStatus,
        next: ComplaintStatus,
        proof: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let resolved_at = (next == ComplaintStatus::Resolved).then(|| fmt_ts(now));
        let result = sqlx::query(
            r#"
            UPDATE complaints
            SET status = ?, proof = ?, updated_at = ?, resolved_at = COALESCE(?, resolved_at)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(proof)
        .bind(fmt_ts(now))
        .bind(resolved_at)
        .bind(id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::Conflict(format!(
                "complaint {id} changed while updating"
            )));
        }
        Ok(())
    }

    /// Verify a resolved complaint on behalf of its filer and score the
    /// assigned officer.
    pub async fn verify(&self, id: ComplaintId, user: UserId, now: DateTime<Utc>) -> Result<VerifyOutcome> {
        let mut tx = self.pool.begin().await?;

        let complaint = fetch_in(&mut tx, id).await?;
        if !complaint.is_owned_by(user) {
            return Err(DeskError::Forbidden(
                "only the citizen who filed a complaint can verify it".into(),
            ));
        }
        let next = citizen_verify(complaint.status)?;

        mark_verified(&mut tx, id, complaint.status, next, now).await?;

        let mut ledger_entry = None;
        if let Some(officer_id) = complaint.officer_id.clone() {
            let deadline: Option<(i64,)> = sqlx::query_as(
                "SELECT deadline_hours FROM sla_rules WHERE issue_type = ? AND priority_level = ?",
            )
            .bind(&complaint.issue_type)
            .bind(complaint.priority_level.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            match deadline {
                Some((hours,)) => {
                    let draft = evaluate_verified(
                        officer_id,
                        complaint.id,
                        complaint.priority_level,
                        complaint.created_at,
                        now,
                        Duration::hours(hours),
                    );
                    if insert_entry(&mut tx, &draft, now).await? {
                        ledger_entry = Some(draft);
                    }
                }
                None => warn!(
                    complaint_id = %complaint.id,
                    issue_type = %complaint.issue_type,
                    priority = %complaint.priority_level,
                    "No SLA rule; skipping officer scoring"
                ),
            }
        }

        tx.commit().await?;
        Ok(VerifyOutcome {
            complaint_id: id,
            verified_at: now,
            ledger_entry,
        })
    }

    /// Unverified, assigned complaints without a ledger entry.
    pub async fn unscored_open(&self) -> Result<Vec<Complaint>> {
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints
            WHERE status != 'verified'
              AND officer_id IS NOT NULL
              AND id NOT IN (SELECT complaint_id FROM points_ledger)
            ORDER BY created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }
}

/// Compare-and-set the verification transition.
async fn mark_verified(
    conn: &mut SqliteConnection,
    id: ComplaintId,
    expected: ComplaintStatus,
    next: ComplaintStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE complaints SET status = ?, verified_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next.as_str())
    .bind(fmt_ts(now))
    .bind(fmt_ts(now))
    .bind(id.0)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DeskError::Conflict(format!(
            "complaint {id} changed while verifying"
        )));
    }
    Ok(())
}

async fn fetch_in(conn: &mut SqliteConnection, id: ComplaintId) -> Result<Complaint> {
    let row = sqlx::query_as::<_, ComplaintRow>(&format!(
        "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Complaint::try_from)
        .transpose()?
        .ok_or_else(|| DeskError::not_found("complaint", id))
}

#[derive(Debug, FromRow)]
struct ComplaintRow {
    id: i64,
    title: String,
    description: String,
    issue_type: String,
    image: String,
    latitude: f64,
    longitude: f64,
    area: String,
    status: String,
    upvote_count: i64,
    created_by: i64,
    officer_id: Option<String>,
    proof: Option<String>,
    priority_score: f64,
    priority_level: String,
    duplicate_of: Option<i64>,
    review_flag: Option<String>,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
    verified_at: Option<String>,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = DeskError;

    fn try_from(row: ComplaintRow) -> Result<Self> {
        Ok(Complaint {
            id: ComplaintId(row.id),
            status: parse_enum(&row.status)?,
            priority_level: parse_enum(&row.priority_level)?,
            review_flag: row.review_flag.as_deref().map(parse_enum).transpose()?,
            created_at: parse_ts("created_at", &row.created_at)?,
            updated_at: parse_ts("updated_at", &row.updated_at)?,
            resolved_at: parse_opt_ts("resolved_at", row.resolved_at)?,
            verified_at: parse_opt_ts("verified_at", row.verified_at)?,
            title: row.title,
            description: row.description,
            issue_type: row.issue_type,
            image: row.image,
            latitude: row.latitude,
            longitude: row.longitude,
            area: row.area,
            upvote_count: row.upvote_count,
            created_by: UserId(row.created_by),
            officer_id: row.officer_id.map(OfficerId),
            proof: row.proof,
            priority_score: row.priority_score,
            duplicate_of: row.duplicate_of.map(ComplaintId),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewCitizen, NewOfficer, Outcome, Polygon, Ward};
    use crate::infra::sqlite::{connect_in_memory, SqliteAccountStore, SqliteCatalog};

    struct Fixture {
        store: SqliteComplaintStore,
        catalog: SqliteCatalog,
        owner: UserId,
        neighbour: UserId,
    }

    async fn fixture() -> Fixture {
        let pool = connect_in_memory().await.unwrap();
        let catalog = SqliteCatalog::new(pool.clone());
        catalog
            .upsert_ward(&Ward {
                ward_id: 1,
                name: "Central".into(),
                polygon: Polygon(vec![[77.5, 12.8], [77.7, 12.8], [77.7, 13.0], [77.5, 13.0]]),
            })
            .await
            .unwrap();
        catalog.upsert_issue_type("pothole", 15).await.unwrap();

        let accounts = SqliteAccountStore::new(pool.clone());
        let mut ids = Vec::new();
        for email in ["owner@x.in", "n@x.in"] {
            ids.push(
                accounts
                    .create_citizen(
                        &NewCitizen {
                            name: email.into(),
                            email: email.into(),
                            area: "a".into(),
                            state: "s".into(),
                            phone_number: None,
                        },
                        "h",
                    )
                    .await
                    .unwrap(),
            );
        }
        accounts
            .create_officer(
                &NewOfficer {
                    off_id: OfficerId::new("OFF1"),
                    name: "Ravi".into(),
                    email: "ravi@city.gov".into(),
                    ward_id: 1,
                    phone_number: "1".into(),
                    designation: "ward".into(),
                },
                "h",
            )
            .await
            .unwrap();

        Fixture {
            store: SqliteComplaintStore::new(pool),
            catalog,
            owner: ids[0],
            neighbour: ids[1],
        }
    }

    fn new_complaint(owner: UserId, created_at: DateTime<Utc>) -> NewComplaint {
        NewComplaint {
            title: "Pothole on 5th".into(),
            description: "Large pothole causing traffic".into(),
            issue_type: "pothole".into(),
            image: "img.png".into(),
            latitude: 12.9,
            longitude: 77.6,
            area: "1".into(),
            created_by: owner,
            officer_id: OfficerId::new("OFF1"),
            priority_score: 20.0,
            priority_level: PriorityLevel::Medium,
            duplicate_of: None,
            review_flag: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn insert_and_list_by_owner() {
        let fx = fixture().await;
        let id = fx.store.insert(&new_complaint(fx.owner, Utc::now())).await.unwrap();

        let mine = fx
            .store
            .list(&ComplaintFilter {
                created_by: Some(fx.owner),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);
        assert_eq!(mine[0].status, ComplaintStatus::Pending);

        let resolved = fx
            .store
            .list(&ComplaintFilter {
                status: Some(ComplaintStatus::Resolved),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn upvote_rules() {
        let fx = fixture().await;
        let now = Utc::now();
        let id = fx.store.insert(&new_complaint(fx.owner, now)).await.unwrap();

        let own = fx.store.upvote(id, fx.owner, now).await.unwrap_err();
        assert!(matches!(own, DeskError::Validation(_)));

        let outcome = fx.store.upvote(id, fx.neighbour, now).await.unwrap();
        assert_eq!(outcome.upvote_count, 1);
        assert_eq!(outcome.priority_score, 22.0);

        let again = fx.store.upvote(id, fx.neighbour, now).await.unwrap_err();
        assert!(matches!(again, DeskError::Conflict(_)));
        assert_eq!(fx.store.require(id).await.unwrap().upvote_count, 1);
    }

    #[tokio::test]
    async fn officer_update_is_compare_and_set() {
        let fx = fixture().await;
        let now = Utc::now();
        let id = fx.store.insert(&new_complaint(fx.owner, now)).await.unwrap();

        fx.store
            .apply_officer_update(id, ComplaintStatus::Pending, ComplaintStatus::Resolved, "p.png", now)
            .await
            .unwrap();
        let stale = fx
            .store
            .apply_officer_update(id, ComplaintStatus::Pending, ComplaintStatus::InProgress, "p.png", now)
            .await
            .unwrap_err();
        assert!(matches!(stale, DeskError::Conflict(_)));

        let complaint = fx.store.require(id).await.unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Resolved);
        assert_eq!(complaint.proof.as_deref(), Some("p.png"));
        assert!(complaint.resolved_at.is_some());
    }

    #[tokio::test]
    async fn verify_scores_officer_once() {
        let fx = fixture().await;
        fx.catalog
            .upsert_sla_rule("pothole", PriorityLevel::Medium, 72)
            .await
            .unwrap();
        let created = Utc::now() - Duration::hours(10);
        let id = fx.store.insert(&new_complaint(fx.owner, created)).await.unwrap();

        let early = fx.store.verify(id, fx.owner, Utc::now()).await.unwrap_err();
        assert!(matches!(early, DeskError::Transition(_)));

        fx.store
            .apply_officer_update(id, ComplaintStatus::Pending, ComplaintStatus::Resolved, "p.png", Utc::now())
            .await
            .unwrap();

        let stranger = fx.store.verify(id, fx.neighbour, Utc::now()).await.unwrap_err();
        assert!(matches!(stranger, DeskError::Forbidden(_)));

        let outcome = fx.store.verify(id, fx.owner, Utc::now()).await.unwrap();
        let entry = outcome.ledger_entry.unwrap();
        assert_eq!(entry.outcome, Outcome::OnTime);
        assert!(entry.points > 0.0);

        assert!(fx.store.unscored_open().await.unwrap().is_empty());
        assert_eq!(
            fx.store.require(id).await.unwrap().status,
            ComplaintStatus::Verified
        );
    }

    #[tokio::test]
    async fn verification_is_compare_and_set() {
        let fx = fixture().await;
        let id = fx.store.insert(&new_complaint(fx.owner, Utc::now())).await.unwrap();

        let mut conn = fx.store.pool.acquire().await.unwrap();
        let stale = mark_verified(
            &mut conn,
            id,
            ComplaintStatus::Resolved,
            ComplaintStatus::Verified,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(stale, DeskError::Conflict(_)));
        drop(conn);

        let complaint = fx.store.require(id).await.unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Pending);
        assert!(complaint.verified_at.is_none());
    }

    #[tokio::test]
    async fn verify_without_sla_rule_skips_scoring() {
        let fx = fixture().await;
        let id = fx.store.insert(&new_complaint(fx.owner, Utc::now())).await.unwrap();
        fx.store
            .apply_officer_update(id, ComplaintStatus::Pending, ComplaintStatus::Resolved, "p.png", Utc::now())
            .await
            .unwrap();

        let outcome = fx.store.verify(id, fx.owner, Utc::now()).await.unwrap();
        assert!(outcome.ledger_entry.is_none());
    }

    #[tokio::test]
    async fn comments_are_appended_in_order() {
        let fx = fixture().await;
        let id = fx.store.insert(&new_complaint(fx.owner, Utc::now())).await.unwrap();
        fx.store.add_comment(id, fx.neighbour, "first").await.unwrap();
        fx.store.add_comment(id, fx.owner, "second").await.unwrap();

        let thread = fx.store.comments(id).await.unwrap();
        let texts: Vec<_> = thread.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(thread[0].user, "n@x.in");

        let missing = fx
            .store
            .add_comment(ComplaintId(999), fx.owner, "x")
            .await
            .unwrap_err();
        assert!(matches!(missing, DeskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn recent_candidates_exclude_old_and_duplicates() {
        let fx = fixture().await;
        let now = Utc::now();
        let parent = fx.store.insert(&new_complaint(fx.owner, now)).await.unwrap();
        fx.store
            .insert(&new_complaint(fx.owner, now - Duration::days(10)))
            .await
            .unwrap();
        let mut linked = new_complaint(fx.owner, now);
        linked.duplicate_of = Some(parent);
        linked.review_flag = Some(ReviewFlag::Duplicate);
        fx.store.insert(&linked).await.unwrap();
        let mut possible = new_complaint(fx.owner, now);
        possible.duplicate_of = Some(parent);
        possible.review_flag = Some(ReviewFlag::PossibleDuplicate);
        let possible = fx.store.insert(&possible).await.unwrap();

        let mut ids: Vec<_> = fx
            .store
            .recent_candidates(now)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        assert_eq!(ids, vec![parent, possible]);
    }
}
