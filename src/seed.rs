//! Reference data loaded by `civic-desk-admin seed`.
//!
//! Seeding is idempotent: issue types and SLA rules are upserted, unpaid
//! sample bills are refreshed, and paid bills are left as they are.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::domain::{BillType, PriorityLevel};
use crate::infra::{Result, SqliteBillStore, SqliteCatalog};

/// Issue types and their base severity.
pub const ISSUE_TYPES: [(&str, i64); 9] = [
    ("pothole", 15),
    ("garbage", 20),
    ("streetlight", 12),
    ("open_manhole", 25),
    ("sewage_overflow", 28),
    ("drainage_block", 22),
    ("traffic_signal", 30),
    ("electric_hazard", 35),
    ("fallen_tree", 18),
];

/// Deadline hours per priority level, in `PriorityLevel::ALL` order.
pub const SLA_HOURS: [(&str, [i64; 4]); 5] = [
    ("pothole", [168, 72, 48, 24]),
    ("garbage", [48, 24, 12, 6]),
    ("open_manhole", [24, 12, 6, 3]),
    ("sewage_overflow", [24, 12, 6, 3]),
    ("drainage_block", [48, 24, 12, 6]),
];

/// Applied to issue types without an entry in [`SLA_HOURS`].
pub const DEFAULT_SLA_HOURS: [i64; 4] = [120, 48, 24, 12];

/// Sample bills: number, type, amount, already paid.
pub const SAMPLE_BILLS: [(&str, BillType, f64, bool); 5] = [
    ("TAX1001", BillType::Tax, 1500.0, false),
    ("TAX1002", BillType::Tax, 2750.5, false),
    ("WATER2001", BillType::Water, 420.75, true),
    ("WATER2002", BillType::Water, 980.0, false),
    ("TAX1003", BillType::Tax, 12500.0, false),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub issue_types: usize,
    pub sla_rules: usize,
    pub bills: usize,
}

fn sla_hours_for(issue_type: &str) -> [i64; 4] {
    SLA_HOURS
        .iter()
        .find(|(name, _)| *name == issue_type)
        .map(|(_, hours)| *hours)
        .unwrap_or(DEFAULT_SLA_HOURS)
}

/// Load issue types, SLA rules and sample bills.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<SeedReport> {
    let catalog = SqliteCatalog::new(pool.clone());
    let bills = SqliteBillStore::new(pool.clone());
    let mut report = SeedReport::default();

    for (name, severity) in ISSUE_TYPES {
        catalog.upsert_issue_type(name, severity).await?;
        report.issue_types += 1;

        for (level, hours) in PriorityLevel::ALL.into_iter().zip(sla_hours_for(name)) {
            catalog.upsert_sla_rule(name, level, hours).await?;
            report.sla_rules += 1;
        }
    }

    let now = Utc::now();
    for (number, bill_type, amount, paid) in SAMPLE_BILLS {
        bills
            .upsert_bill(number, bill_type, amount, Some(now + Duration::days(30)))
            .await?;
        if paid {
            bills.mark_paid_offline(number, now).await?;
        }
        report.bills += 1;
    }

    info!(
        issue_types = report.issue_types,
        sla_rules = report.sla_rules,
        bills = report.bills,
        "Reference data seeded"
    );
    Ok(report)
}
