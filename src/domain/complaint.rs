//! Complaint lifecycle
//!
//! A complaint moves strictly forward:
//!
//! ```text
//! pending ──► in_progress ──► resolved ──► verified
//!    └──────────────────────────┘
//! ```
//!
//! Officers drive `pending`/`in_progress` to `in_progress`/`resolved` and must
//! attach proof. Only the filing citizen moves `resolved` to `verified`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ComplaintId, OfficerId, UserId};

/// Longest comment accepted.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Upvotes beyond this count no longer raise priority.
pub const UPVOTE_PRIORITY_CAP: i64 = 20;

/// Complaint status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    #[serde(alias = "in-progress")]
    InProgress,
    Resolved,
    Verified,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Pending,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Verified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Verified => "verified",
        }
    }

    /// Position in the lifecycle; transitions never decrease it.
    pub fn rank(&self) -> u8 {
        match self {
            ComplaintStatus::Pending => 0,
            ComplaintStatus::InProgress => 1,
            ComplaintStatus::Resolved => 2,
            ComplaintStatus::Verified => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Verified)
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(&self, next: ComplaintStatus) -> bool {
        use ComplaintStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Resolved) | (InProgress, Resolved) | (Resolved, Verified)
        )
    }

    /// Statuses an assigned officer may move a complaint to from `self`.
    pub fn officer_targets(&self) -> &'static [ComplaintStatus] {
        use ComplaintStatus::*;
        match self {
            Pending => &[InProgress, Resolved],
            InProgress => &[Resolved],
            Resolved | Verified => &[],
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ComplaintStatus::Pending),
            "in_progress" | "in-progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "verified" => Ok(ComplaintStatus::Verified),
            other => Err(format!("unknown complaint status: {other}")),
        }
    }
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("proof image is required to update a complaint")]
    ProofRequired,

    #[error("officers cannot set status {0}")]
    NotOfficerSettable(ComplaintStatus),

    #[error("cannot move complaint from {from} to {to}")]
    NotAllowed {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },

    #[error("only resolved complaints can be verified (current status: {0})")]
    NotResolved(ComplaintStatus),
}

/// Validate an officer's resolution update.
///
/// Proof is checked first so a missing file is reported regardless of the
/// selected status.
pub fn officer_update(
    current: ComplaintStatus,
    target: ComplaintStatus,
    proof_attached: bool,
) -> Result<ComplaintStatus, TransitionError> {
    if !proof_attached {
        return Err(TransitionError::ProofRequired);
    }
    if !matches!(target, ComplaintStatus::InProgress | ComplaintStatus::Resolved) {
        return Err(TransitionError::NotOfficerSettable(target));
    }
    if !current.can_transition_to(target) {
        return Err(TransitionError::NotAllowed {
            from: current,
            to: target,
        });
    }
    Ok(target)
}

/// Validate a citizen's verification of a resolved complaint.
pub fn citizen_verify(current: ComplaintStatus) -> Result<ComplaintStatus, TransitionError> {
    if current != ComplaintStatus::Resolved {
        return Err(TransitionError::NotResolved(current));
    }
    Ok(ComplaintStatus::Verified)
}

/// Priority bucket used for SLA deadlines and officer scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 4] = [
        PriorityLevel::Low,
        PriorityLevel::Medium,
        PriorityLevel::High,
        PriorityLevel::Critical,
    ];

    pub fn from_score(score: f64) -> Self {
        if score >= 50.0 {
            PriorityLevel::Critical
        } else if score >= 35.0 {
            PriorityLevel::High
        } else if score >= 20.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(PriorityLevel::Low),
            "medium" => Ok(PriorityLevel::Medium),
            "high" => Ok(PriorityLevel::High),
            "critical" => Ok(PriorityLevel::Critical),
            other => Err(format!("unknown priority level: {other}")),
        }
    }
}

/// Priority score from community interest, age and issue severity.
pub fn calculate_priority(upvotes: i64, hours_open: f64, base_severity: i64) -> f64 {
    let upvote_score = upvotes.clamp(0, UPVOTE_PRIORITY_CAP) * 2;
    let age_score = if hours_open > 72.0 {
        15
    } else if hours_open > 24.0 {
        10
    } else {
        5
    };
    (upvote_score + age_score + base_severity) as f64
}

/// Outcome of duplicate screening at filing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFlag {
    /// Near-certain duplicate of `duplicate_of`.
    Duplicate,
    /// Similar enough to `duplicate_of` to warrant a manual look.
    PossibleDuplicate,
}

impl ReviewFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewFlag::Duplicate => "duplicate",
            ReviewFlag::PossibleDuplicate => "possible_duplicate",
        }
    }
}

impl FromStr for ReviewFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicate" => Ok(ReviewFlag::Duplicate),
            "possible_duplicate" => Ok(ReviewFlag::PossibleDuplicate),
            other => Err(format!("unknown review flag: {other}")),
        }
    }
}

/// Issue category with its base severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: i64,
    pub name: String,
    pub base_severity: i64,
}

/// A stored complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub title: String,
    pub description: String,
    pub issue_type: String,
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
    pub area: String,
    pub status: ComplaintStatus,
    pub upvote_count: i64,
    pub created_by: UserId,
    pub officer_id: Option<OfficerId>,
    pub proof: Option<String>,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub duplicate_of: Option<ComplaintId>,
    pub review_flag: Option<ReviewFlag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Complaint {
    pub fn hours_open(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 3600.0
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.created_by == user
    }

    pub fn is_assigned_to(&self, officer: &OfficerId) -> bool {
        self.officer_id.as_ref() == Some(officer)
    }
}

/// Listing row returned by the dashboard, "my complaints" and profile views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintSummary {
    pub id: ComplaintId,
    pub title: String,
    pub description: String,
    pub issue_type: String,
    pub area: String,
    pub status: ComplaintStatus,
    pub image: String,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub officer_id: Option<OfficerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Complaint> for ComplaintSummary {
    fn from(c: &Complaint) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            issue_type: c.issue_type.clone(),
            area: c.area.clone(),
            status: c.status,
            image: c.image.clone(),
            upvote_count: c.upvote_count,
            created_by: Some(c.created_by),
            officer_id: c.officer_id.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// A comment as shown under a complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub user: String,
    pub time: DateTime<Utc>,
}

/// Full complaint view with its comment thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDetail {
    pub id: ComplaintId,
    pub title: String,
    pub description: String,
    pub issue_type: String,
    pub area: String,
    pub status: ComplaintStatus,
    pub image: String,
    #[serde(default)]
    pub proof: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub upvote_count: i64,
    pub priority_level: PriorityLevel,
    pub created_by: UserId,
    #[serde(default)]
    pub officer_id: Option<OfficerId>,
    #[serde(default)]
    pub duplicate_of: Option<ComplaintId>,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
}

impl ComplaintDetail {
    pub fn from_complaint(c: &Complaint, comments: Vec<Comment>) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            issue_type: c.issue_type.clone(),
            area: c.area.clone(),
            status: c.status,
            image: c.image.clone(),
            proof: c.proof.clone(),
            latitude: c.latitude,
            longitude: c.longitude,
            upvote_count: c.upvote_count,
            priority_level: c.priority_level,
            created_by: c.created_by,
            officer_id: c.officer_id.clone(),
            duplicate_of: c.duplicate_of,
            created_at: c.created_at,
            comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_status() -> impl Strategy<Value = ComplaintStatus> {
        prop::sample::select(ComplaintStatus::ALL.to_vec())
    }

    #[test]
    fn lifecycle_edges() {
        use ComplaintStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(Resolved.can_transition_to(Verified));

        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(Pending));
        assert!(Verified.officer_targets().is_empty());
    }

    #[test]
    fn officer_update_requires_proof_for_every_status() {
        for status in ComplaintStatus::ALL {
            assert_eq!(
                officer_update(ComplaintStatus::Pending, status, false),
                Err(TransitionError::ProofRequired)
            );
        }
    }

    #[test]
    fn officer_cannot_verify() {
        assert_eq!(
            officer_update(ComplaintStatus::Resolved, ComplaintStatus::Verified, true),
            Err(TransitionError::NotOfficerSettable(ComplaintStatus::Verified))
        );
    }

    #[test]
    fn officer_cannot_reopen_resolved() {
        assert!(matches!(
            officer_update(ComplaintStatus::Resolved, ComplaintStatus::InProgress, true),
            Err(TransitionError::NotAllowed { .. })
        ));
    }

    #[test]
    fn verify_only_from_resolved() {
        assert_eq!(
            citizen_verify(ComplaintStatus::Resolved),
            Ok(ComplaintStatus::Verified)
        );
        assert_eq!(
            citizen_verify(ComplaintStatus::InProgress),
            Err(TransitionError::NotResolved(ComplaintStatus::InProgress))
        );
    }

    #[test]
    fn status_parsing_accepts_dashed_form() {
        assert_eq!(
            "in-progress".parse::<ComplaintStatus>().unwrap(),
            ComplaintStatus::InProgress
        );
        let parsed: ComplaintStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, ComplaintStatus::InProgress);
    }

    #[test]
    fn priority_examples() {
        // fresh pothole (severity 15): 0 + 5 + 15
        assert_eq!(calculate_priority(0, 1.0, 15), 20.0);
        assert_eq!(PriorityLevel::from_score(20.0), PriorityLevel::Medium);
        // capped upvotes, old electric hazard: 40 + 15 + 35
        assert_eq!(calculate_priority(50, 100.0, 35), 90.0);
        assert_eq!(PriorityLevel::from_score(90.0), PriorityLevel::Critical);
        assert_eq!(PriorityLevel::from_score(19.9), PriorityLevel::Low);
        assert_eq!(PriorityLevel::from_score(35.0), PriorityLevel::High);
    }

    proptest! {
        #[test]
        fn transitions_never_move_backward(from in arb_status(), to in arb_status()) {
            if from.can_transition_to(to) {
                prop_assert!(to.rank() > from.rank());
            }
        }

        #[test]
        fn accepted_officer_updates_are_forward(
            from in arb_status(),
            to in arb_status(),
            proof in any::<bool>(),
        ) {
            if let Ok(next) = officer_update(from, to, proof) {
                prop_assert!(proof);
                prop_assert!(next.rank() > from.rank());
                prop_assert!(from.officer_targets().contains(&next));
            }
        }

        #[test]
        fn priority_is_monotonic_in_upvotes(
            upvotes in 0i64..100,
            hours in 0f64..500.0,
            severity in 0i64..50,
        ) {
            prop_assert!(
                calculate_priority(upvotes + 1, hours, severity)
                    >= calculate_priority(upvotes, hours, severity)
            );
        }
    }
}
