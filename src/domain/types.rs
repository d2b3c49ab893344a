//! Core type definitions for the complaint desk
//!
//! Identifiers, account roles and the authenticated principal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role carried in every credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Files, upvotes, comments on and verifies complaints; pays bills.
    Citizen,
    /// Resolves complaints assigned to their ward.
    Officer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Officer => "officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "officer" => Ok(Role::Officer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Citizen account identifier (database row id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Officer identifier (the badge id officers log in with).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficerId(pub String);

impl OfficerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfficerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complaint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplaintId(pub i64);

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Citizen(UserId),
    Officer(OfficerId),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Citizen(_) => Role::Citizen,
            Principal::Officer(_) => Role::Officer,
        }
    }

    /// Subject string stored in the credential.
    pub fn subject(&self) -> String {
        match self {
            Principal::Citizen(id) => id.0.to_string(),
            Principal::Officer(id) => id.0.clone(),
        }
    }

    /// Rebuild a principal from a credential's role and subject.
    pub fn from_parts(role: Role, subject: &str) -> Option<Self> {
        match role {
            Role::Citizen => subject.parse().ok().map(|id| Principal::Citizen(UserId(id))),
            Role::Officer if !subject.is_empty() => {
                Some(Principal::Officer(OfficerId::new(subject)))
            }
            Role::Officer => None,
        }
    }

    pub fn citizen_id(&self) -> Option<UserId> {
        match self {
            Principal::Citizen(id) => Some(*id),
            Principal::Officer(_) => None,
        }
    }

    pub fn officer_id(&self) -> Option<&OfficerId> {
        match self {
            Principal::Officer(id) => Some(id),
            Principal::Citizen(_) => None,
        }
    }
}
