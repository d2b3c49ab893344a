//! Shared request and response types for REST API handlers.
//!
//! Request fields that the handlers report as "required" are `Option` so a
//! missing field produces the desk's own error body instead of a generic
//! extractor rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ComplaintId, ComplaintStatus, ComplaintSummary, LeaderboardEntry, OfficerId, PriorityLevel,
    ReviewFlag, Role,
};

/// Generic acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    /// Accepted as a string or a number.
    pub otp: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub area: Option<String>,
    pub state: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfficerLoginRequest {
    pub off_id: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: LoginUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerLoginResponse {
    pub access_token: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenProfile {
    pub name: String,
    pub email: String,
    pub area: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenProfileResponse {
    pub user: CitizenProfile,
    pub complaints: Vec<ComplaintSummary>,
}

// ============================================================================
// Complaint types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateComplaintResponse {
    pub message: String,
    pub complaint_id: ComplaintId,
    pub status: ComplaintStatus,
    pub priority_level: PriorityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_flag: Option<ReviewFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<ComplaintId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpvoteResponse {
    pub message: String,
    pub upvote_count: i64,
    pub priority_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyComplaintResponse {
    pub message: String,
    pub complaint_id: ComplaintId,
    pub verified_at: DateTime<Utc>,
    /// Points awarded to the assigned officer, when scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_points: Option<f64>,
}

// ============================================================================
// Officer types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerSelf {
    pub off_id: OfficerId,
    pub name: String,
    pub email: String,
    /// Ward id the officer serves.
    pub area: String,
    pub designation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerProfileResponse {
    pub officer: OfficerSelf,
    pub complaints: Vec<ComplaintSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerPublic {
    pub off_id: OfficerId,
    pub name: String,
    pub designation: String,
    pub area: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicOfficerProfileResponse {
    pub officer: OfficerPublic,
    #[serde(default)]
    pub stats: Option<LeaderboardEntry>,
    pub complaints: Vec<ComplaintSummary>,
}

// ============================================================================
// Bill types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub bill_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Public gateway key for the checkout widget.
    pub key: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub bill_number: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub message: String,
    pub bill_number: String,
    pub paid_at: Option<DateTime<Utc>>,
}
