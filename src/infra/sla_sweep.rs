//! Periodic SLA sweep
//!
//! Scores assigned complaints whose deadline passed without citizen
//! verification. Each complaint is scored at most once; the ledger's unique
//! constraint makes repeated sweeps idempotent.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::domain::evaluate_missed;
use crate::infra::{Result, ShutdownSignal, SqliteCatalog, SqliteComplaintStore, SqliteLedger};

#[derive(Debug, Clone)]
pub struct SlaSweepConfig {
    pub interval: Duration,
}

impl Default for SlaSweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Unverified, unscored complaints looked at.
    pub examined: usize,
    /// Missed-SLA entries written.
    pub scored: usize,
    /// Complaints with no SLA rule for their issue type and priority.
    pub skipped_no_rule: usize,
}

pub struct SlaSweeper {
    config: SlaSweepConfig,
    complaints: Arc<SqliteComplaintStore>,
    catalog: Arc<SqliteCatalog>,
    ledger: Arc<SqliteLedger>,
}

impl SlaSweeper {
    pub fn new(
        config: SlaSweepConfig,
        complaints: Arc<SqliteComplaintStore>,
        catalog: Arc<SqliteCatalog>,
        ledger: Arc<SqliteLedger>,
    ) -> Self {
        Self {
            config,
            complaints,
            catalog,
            ledger,
        }
    }

    /// Score every overdue complaint as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for complaint in self.complaints.unscored_open().await? {
            report.examined += 1;
            let Some(officer_id) = complaint.officer_id.clone() else {
                continue;
            };

            let deadline = match self
                .catalog
                .sla_deadline(&complaint.issue_type, complaint.priority_level)
                .await?
            {
                Some(deadline) => deadline,
                None => {
                    warn!(
                        complaint_id = %complaint.id,
                        issue_type = %complaint.issue_type,
                        priority = %complaint.priority_level,
                        "No SLA rule; skipping"
                    );
                    report.skipped_no_rule += 1;
                    continue;
                }
            };

            let Some(draft) = evaluate_missed(
                officer_id,
                complaint.id,
                complaint.priority_level,
                complaint.created_at,
                now,
                deadline,
            ) else {
                continue;
            };

            if self.ledger.record(&draft, now).await? {
                debug!(
                    complaint_id = %complaint.id,
                    officer_id = %draft.officer_id,
                    points = draft.points,
                    "SLA missed"
                );
                report.scored += 1;
            }
        }

        Ok(report)
    }

    /// Sweep on every tick until shutdown.
    pub async fn run(self, shutdown: ShutdownSignal) {
        info!(interval_secs = self.config.interval.as_secs(), "Starting SLA sweeper");

        let mut ticker = interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once(Utc::now()).await {
                        Ok(report) if report.scored > 0 || report.skipped_no_rule > 0 => {
                            info!(
                                examined = report.examined,
                                scored = report.scored,
                                skipped_no_rule = report.skipped_no_rule,
                                "SLA sweep complete"
                            );
                        }
                        Ok(_) => debug!("SLA sweep found nothing overdue"),
                        Err(e) => error!(error = %e, "SLA sweep failed"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("SLA sweeper shutting down");
                    break;
                }
            }
        }
    }
}

/// Spawn the sweeper as a background task.
pub fn spawn_sla_sweeper(sweeper: SlaSweeper, shutdown: ShutdownSignal) -> tokio::task::JoinHandle<()> {
    tokio::spawn(sweeper.run(shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        NewCitizen, NewOfficer, OfficerId, Outcome, Polygon, PriorityLevel, UserId, Ward,
    };
    use crate::infra::sqlite::{connect_in_memory, NewComplaint, SqliteAccountStore};
    use crate::infra::ShutdownCoordinator;
    use chrono::Duration as ChronoDuration;
    use sqlx::SqlitePool;

    async fn fixture() -> (SqlitePool, SlaSweeper, Arc<SqliteComplaintStore>, Arc<SqliteLedger>) {
        let pool = connect_in_memory().await.unwrap();
        let catalog = Arc::new(SqliteCatalog::new(pool.clone()));
        catalog
            .upsert_ward(&Ward {
                ward_id: 1,
                name: "Central".into(),
                polygon: Polygon(vec![[77.5, 12.8], [77.7, 12.8], [77.7, 13.0], [77.5, 13.0]]),
            })
            .await
            .unwrap();
        catalog.upsert_issue_type("pothole", 15).await.unwrap();
        catalog.upsert_issue_type("graffiti", 5).await.unwrap();
        catalog
            .upsert_sla_rule("pothole", PriorityLevel::Medium, 72)
            .await
            .unwrap();

        let accounts = SqliteAccountStore::new(pool.clone());
        accounts
            .create_citizen(
                &NewCitizen {
                    name: "Asha".into(),
                    email: "asha@example.com".into(),
                    area: "1".into(),
                    state: "KA".into(),
                    phone_number: None,
                },
                "hash",
            )
            .await
            .unwrap();
        accounts
            .create_officer(
                &NewOfficer {
                    off_id: OfficerId::new("OFF1"),
                    name: "Ravi".into(),
                    email: "ravi@example.com".into(),
                    ward_id: 1,
                    phone_number: "9000000001".into(),
                    designation: "ward".into(),
                },
                "hash",
            )
            .await
            .unwrap();

        let complaints = Arc::new(SqliteComplaintStore::new(pool.clone()));
        let ledger = Arc::new(SqliteLedger::new(pool.clone()));
        let sweeper = SlaSweeper::new(
            SlaSweepConfig::default(),
            complaints.clone(),
            catalog,
            ledger.clone(),
        );
        (pool, sweeper, complaints, ledger)
    }

    fn complaint(issue_type: &str, created_at: DateTime<Utc>) -> NewComplaint {
        NewComplaint {
            title: "Pothole".into(),
            description: "Deep pothole".into(),
            issue_type: issue_type.into(),
            image: "a.png".into(),
            latitude: 12.9,
            longitude: 77.6,
            area: "1".into(),
            created_by: UserId(1),
            officer_id: OfficerId::new("OFF1"),
            priority_score: 25.0,
            priority_level: PriorityLevel::Medium,
            duplicate_of: None,
            review_flag: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn overdue_complaint_is_scored_once() {
        let (_pool, sweeper, complaints, ledger) = fixture().await;
        let now = Utc::now();
        complaints
            .insert(&complaint("pothole", now - ChronoDuration::hours(100)))
            .await
            .unwrap();
        complaints
            .insert(&complaint("pothole", now - ChronoDuration::hours(10)))
            .await
            .unwrap();

        let report = sweeper.run_once(now).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 2,
                scored: 1,
                skipped_no_rule: 0
            }
        );

        let entries = ledger.entries_for(&OfficerId::new("OFF1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, Outcome::Missed);
        assert_eq!(entries[0].points, -3.0);

        // The scored complaint drops out of the next pass.
        let again = sweeper.run_once(now).await.unwrap();
        assert_eq!(again.examined, 1);
        assert_eq!(again.scored, 0);
    }

    #[tokio::test]
    async fn missing_rule_is_skipped() {
        let (_pool, sweeper, complaints, ledger) = fixture().await;
        let now = Utc::now();
        complaints
            .insert(&complaint("graffiti", now - ChronoDuration::days(30)))
            .await
            .unwrap();

        let report = sweeper.run_once(now).await.unwrap();
        assert_eq!(report.skipped_no_rule, 1);
        assert_eq!(report.scored, 0);
        assert!(ledger
            .entries_for(&OfficerId::new("OFF1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let (_pool, sweeper, _, _) = fixture().await;
        let coordinator = ShutdownCoordinator::new();
        let handle = spawn_sla_sweeper(sweeper, coordinator.signal());

        coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
