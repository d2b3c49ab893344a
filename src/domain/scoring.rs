//! SLA-based officer scoring and leaderboard ranking
//!
//! Points are recorded once per complaint in the points ledger:
//! - verified within the SLA deadline: `base * efficiency * 1.0`
//! - verified after the deadline: `base * efficiency * 0.5`
//! - deadline passed without verification: `base * -1.5`

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ComplaintId, OfficerId, PriorityLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    OnTime,
    Late,
    Missed,
}

impl Outcome {
    pub fn multiplier(&self) -> f64 {
        match self {
            Outcome::OnTime => 1.0,
            Outcome::Late => 0.5,
            Outcome::Missed => -1.5,
        }
    }

    /// Whether the complaint was actually resolved and verified.
    pub fn counts_as_resolved(&self) -> bool {
        matches!(self, Outcome::OnTime | Outcome::Late)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::OnTime => "on_time",
            Outcome::Late => "late",
            Outcome::Missed => "missed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_time" => Ok(Outcome::OnTime),
            "late" => Ok(Outcome::Late),
            "missed" => Ok(Outcome::Missed),
            other => Err(format!("unknown outcome: {other}")),
        }
    }
}

pub fn priority_weight(level: PriorityLevel) -> f64 {
    match level {
        PriorityLevel::Low => 1.0,
        PriorityLevel::Medium => 2.0,
        PriorityLevel::High => 3.0,
        PriorityLevel::Critical => 5.0,
    }
}

/// How efficiently a complaint was handled relative to its deadline.
///
/// On time: `0.5..=1.0`, higher the earlier. Late: decays as `1/ratio`,
/// floored at `0.1`.
pub fn time_efficiency(created_at: DateTime<Utc>, action_at: DateTime<Utc>, deadline: Duration) -> f64 {
    let allowed = deadline.num_seconds().max(1) as f64;
    let elapsed = (action_at - created_at).num_seconds().max(0) as f64;
    let ratio = elapsed / allowed;

    if ratio <= 1.0 {
        (1.0 - 0.5 * ratio).max(0.5)
    } else {
        (1.0 / ratio).max(0.1)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A ledger entry ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDraft {
    pub officer_id: OfficerId,
    pub complaint_id: ComplaintId,
    pub points: f64,
    pub outcome: Outcome,
    pub reason: String,
    pub formula_snapshot: String,
}

/// Score a verified complaint.
pub fn evaluate_verified(
    officer_id: OfficerId,
    complaint_id: ComplaintId,
    level: PriorityLevel,
    created_at: DateTime<Utc>,
    verified_at: DateTime<Utc>,
    deadline: Duration,
) -> LedgerDraft {
    let base = priority_weight(level);
    let efficiency = time_efficiency(created_at, verified_at, deadline);
    let outcome = if verified_at <= created_at + deadline {
        Outcome::OnTime
    } else {
        Outcome::Late
    };

    LedgerDraft {
        officer_id,
        complaint_id,
        points: round2(base * efficiency * outcome.multiplier()),
        outcome,
        reason: "SLA-based officer evaluation".to_string(),
        formula_snapshot: format!("base={base}, efficiency={efficiency:.3}, outcome={outcome}"),
    }
}

/// Score an unverified complaint, or `None` while its deadline is still open.
pub fn evaluate_missed(
    officer_id: OfficerId,
    complaint_id: ComplaintId,
    level: PriorityLevel,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    deadline: Duration,
) -> Option<LedgerDraft> {
    if now <= created_at + deadline {
        return None;
    }
    let base = priority_weight(level);
    let outcome = Outcome::Missed;
    Some(LedgerDraft {
        officer_id,
        complaint_id,
        points: round2(base * outcome.multiplier()),
        outcome,
        reason: "SLA missed (auto-evaluated)".to_string(),
        formula_snapshot: format!("base={base}, outcome={outcome}"),
    })
}

/// Aggregated ledger totals for one officer.
#[derive(Debug, Clone, PartialEq)]
pub struct OfficerTotals {
    pub officer_id: OfficerId,
    pub name: String,
    pub total_points: f64,
    pub resolved: i64,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub officer_id: OfficerId,
    pub name: String,
    pub total_points: f64,
    pub resolved: i64,
}

/// Rank officers by points (descending), breaking ties by officer id.
pub fn rank_officers(mut totals: Vec<OfficerTotals>) -> Vec<LeaderboardEntry> {
    totals.sort_by(|a, b| {
        b.total_points
            .total_cmp(&a.total_points)
            .then_with(|| a.officer_id.cmp(&b.officer_id))
    });

    totals
        .into_iter()
        .enumerate()
        .map(|(i, t)| LeaderboardEntry {
            rank: i as u32 + 1,
            officer_id: t.officer_id,
            name: t.name,
            total_points: round2(t.total_points),
            resolved: t.resolved,
        })
        .collect()
}
