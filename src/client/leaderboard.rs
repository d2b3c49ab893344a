//! Leaderboard and officer profile views
//!
//! Rankings are computed by the server. The client keeps the fetched
//! snapshot and only re-orders or filters it for display.

use crate::api::types::{OfficerProfileResponse, PublicOfficerProfileResponse};
use crate::domain::{ComplaintStatus, ComplaintSummary, LeaderboardEntry};

use super::api::{CivicApi, ClientError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeaderboardSort {
    /// Server rank order.
    #[default]
    Rank,
    Resolved,
    Name,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardView {
    snapshot: Vec<LeaderboardEntry>,
    pub sort: LeaderboardSort,
    pub search: String,
}

impl LeaderboardView {
    pub async fn load(api: &dyn CivicApi) -> Result<Self, ClientError> {
        Ok(Self::from_snapshot(api.leaderboard().await?))
    }

    pub fn from_snapshot(snapshot: Vec<LeaderboardEntry>) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Rows to display. Ranks always come from the snapshot.
    pub fn rows(&self) -> Vec<&LeaderboardEntry> {
        let needle = self.search.trim().to_lowercase();
        let mut rows: Vec<&LeaderboardEntry> = self
            .snapshot
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.name.to_lowercase().contains(&needle)
                    || e.officer_id.as_str().to_lowercase().contains(&needle)
            })
            .collect();

        match self.sort {
            LeaderboardSort::Rank => rows.sort_by_key(|e| e.rank),
            LeaderboardSort::Resolved => {
                rows.sort_by(|a, b| b.resolved.cmp(&a.resolved).then(a.rank.cmp(&b.rank)))
            }
            LeaderboardSort::Name => rows.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then(a.rank.cmp(&b.rank))
            }),
        }
        rows
    }

    /// Top three by rank, for the podium.
    pub fn podium(&self) -> Vec<&LeaderboardEntry> {
        let mut top: Vec<&LeaderboardEntry> = self.snapshot.iter().collect();
        top.sort_by_key(|e| e.rank);
        top.truncate(3);
        top
    }
}

/// Counts shown on a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplaintStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub verified: usize,
}

impl ComplaintStats {
    pub fn from_complaints(complaints: &[ComplaintSummary]) -> Self {
        complaints.iter().fold(Self::default(), |mut s, c| {
            s.total += 1;
            match c.status {
                ComplaintStatus::Pending => s.pending += 1,
                ComplaintStatus::InProgress => s.in_progress += 1,
                ComplaintStatus::Resolved => s.resolved += 1,
                ComplaintStatus::Verified => s.verified += 1,
            }
            s
        })
    }

    /// Resolved or verified over total, as a whole percentage.
    pub fn resolution_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (((self.resolved + self.verified) as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// The signed-in officer's own profile.
#[derive(Debug, Clone, PartialEq)]
pub struct OfficerProfileView {
    pub profile: OfficerProfileResponse,
    pub stats: ComplaintStats,
}

impl OfficerProfileView {
    pub async fn load(api: &dyn CivicApi) -> Result<Self, ClientError> {
        let profile = api.officer_profile().await?;
        let stats = ComplaintStats::from_complaints(&profile.complaints);
        Ok(Self { profile, stats })
    }
}

/// An officer's public page, reachable without signing in.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicOfficerView {
    pub profile: PublicOfficerProfileResponse,
    pub stats: ComplaintStats,
}

impl PublicOfficerView {
    pub async fn load(api: &dyn CivicApi, off_id: &str) -> Result<Self, ClientError> {
        let profile = api.public_officer_profile(off_id).await?;
        let stats = ComplaintStats::from_complaints(&profile.complaints);
        Ok(Self { profile, stats })
    }

    pub fn rank(&self) -> Option<u32> {
        self.profile.stats.as_ref().map(|s| s.rank)
    }

    pub fn total_points(&self) -> f64 {
        self.profile.stats.as_ref().map_or(0.0, |s| s.total_points)
    }
}
