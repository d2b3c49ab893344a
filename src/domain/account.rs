//! Citizen and officer accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OfficerId, UserId};

/// Minimum accepted password length.
pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub area: String,
    pub state: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub off_id: OfficerId,
    pub name: String,
    pub email: String,
    pub ward_id: i64,
    pub phone_number: String,
    /// Free-form job title ("ward", "engineer", ...). Not an access role.
    pub designation: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a citizen account.
#[derive(Debug, Clone)]
pub struct NewCitizen {
    pub name: String,
    pub email: String,
    pub area: String,
    pub state: String,
    pub phone_number: Option<String>,
}

/// Fields needed to create an officer account.
#[derive(Debug, Clone)]
pub struct NewOfficer {
    pub off_id: OfficerId,
    pub name: String,
    pub email: String,
    pub ward_id: i64,
    pub phone_number: String,
    pub designation: String,
}

/// Lowercased, trimmed email used as the lookup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Loose shape check: one `@` with text on both sides and a dot in the domain.
pub fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
