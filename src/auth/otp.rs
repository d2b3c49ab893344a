//! Email one-time passcodes for citizen registration
//!
//! A 6-digit code is hashed and stored with an expiry; it can be verified
//! once, and registration requires the verified record.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
#[cfg(test)]
use mockall::automock;
use rand::Rng;
use tracing::info;

use super::{hash_password, verify_password};
use crate::infra::{DeskError, Result, SqliteOtpStore};

/// Delivers a passcode to its recipient.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> Result<()>;
}

/// Development sender that writes the code to the log.
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, email: &str, code: &str) -> Result<()> {
        info!(email = %email, otp = %code, "Development OTP issued");
        Ok(())
    }
}

/// Why a passcode was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("Invalid or expired OTP")]
    NotFound,
    #[error("OTP already used")]
    AlreadyUsed,
    #[error("OTP expired")]
    Expired,
    #[error("Invalid OTP")]
    Mismatch,
}

impl From<OtpError> for DeskError {
    fn from(err: OtpError) -> Self {
        DeskError::Validation(err.to_string())
    }
}

/// Random code in `100000..=999999`.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Issues and checks registration passcodes.
pub struct OtpService {
    store: SqliteOtpStore,
    ttl: Duration,
}

impl OtpService {
    pub fn new(store: SqliteOtpStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Generate, store and deliver a fresh code, replacing any earlier one.
    pub async fn issue(&self, email: &str, sender: &dyn OtpSender, now: DateTime<Utc>) -> Result<()> {
        let code = generate_code();
        let hash = hash_password(&code).map_err(|e| DeskError::Internal(e.to_string()))?;
        self.store.replace(email, &hash, now + self.ttl).await?;
        sender.send(email, &code).await
    }

    /// Check a submitted code and mark it used.
    pub async fn verify(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<()> {
        let record = self.store.get(email).await?.ok_or(OtpError::NotFound)?;
        if record.is_used {
            return Err(OtpError::AlreadyUsed.into());
        }
        if record.expires_at < now {
            return Err(OtpError::Expired.into());
        }
        if !verify_password(code.trim(), &record.otp_hash) {
            return Err(OtpError::Mismatch.into());
        }
        if !self.store.mark_used(email).await? {
            return Err(OtpError::AlreadyUsed.into());
        }
        Ok(())
    }

    /// Whether `email` has completed verification.
    pub async fn is_verified(&self, email: &str) -> Result<bool> {
        Ok(self.store.get(email).await?.is_some_and(|r| r.is_used))
    }

    /// Drop the record once registration completes.
    pub async fn consume(&self, email: &str) -> Result<()> {
        self.store.delete(email).await
    }
}
