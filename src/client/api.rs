//! Typed access to the desk's REST API
//!
//! [`CivicApi`] is the seam every view talks through; [`HttpCivicApi`] is the
//! reqwest implementation. Failures come back as [`ClientError`], decoded
//! from the server's structured error body where there is one.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::types::*;
use crate::api::ApiError;
use crate::domain::{
    Bill, ComplaintDetail, ComplaintId, ComplaintStatus, ComplaintSummary, LeaderboardEntry,
};

use super::session::TokenStore;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const NETWORK_FAILURE: &str = "Could not reach the server. Check your connection and try again.";

/// Error shown inline by the view that made the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Older endpoints answer with a bare `{ "message": ... }`.
#[derive(Deserialize)]
struct PlainMessage {
    message: String,
}

impl ClientError {
    /// Classify a non-success response.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiError>(body)
            .map(|e| e.error.message)
            .or_else(|_| serde_json::from_slice::<PlainMessage>(body).map(|m| m.message))
            .unwrap_or_default();

        match status {
            400 | 413 | 422 => ClientError::Validation(message),
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Api(message),
        }
    }

    /// Text for the view. Server messages are shown as-is; transport
    /// failures and empty messages fall back to a generic line.
    pub fn user_message(&self) -> String {
        let (message, fallback) = match self {
            ClientError::Validation(m) => (m, "Please check the form and try again."),
            ClientError::Unauthorized(m) => (m, "Please log in to continue."),
            ClientError::Forbidden(m) => (m, "You are not allowed to do that."),
            ClientError::NotFound(m) => (m, "Not found."),
            ClientError::Conflict(m) => (m, GENERIC_FAILURE),
            ClientError::Api(m) => (m, GENERIC_FAILURE),
            ClientError::Network(_) => return NETWORK_FAILURE.to_string(),
        };
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message.clone()
        }
    }
}

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Fields of a new complaint, already validated by the form.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintSubmission {
    pub title: String,
    pub description: String,
    pub issue_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image: ImageUpload,
}

/// Every backend operation the client uses.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CivicApi: Send + Sync {
    // Registration and login
    async fn check_email(&self, email: &str) -> Result<bool, ClientError>;
    async fn send_otp(&self, email: &str) -> Result<MessageResponse, ClientError>;
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<MessageResponse, ClientError>;
    async fn register(&self, request: RegisterRequest) -> Result<MessageResponse, ClientError>;
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError>;
    async fn officer_login(&self, off_id: &str, password: &str) -> Result<OfficerLoginResponse, ClientError>;
    async fn citizen_profile(&self) -> Result<CitizenProfileResponse, ClientError>;

    // Complaints
    async fn create_complaint(&self, submission: ComplaintSubmission) -> Result<CreateComplaintResponse, ClientError>;
    async fn dashboard(&self, status: Option<ComplaintStatus>) -> Result<Vec<ComplaintSummary>, ClientError>;
    async fn my_complaints(&self) -> Result<Vec<ComplaintSummary>, ClientError>;
    async fn officer_complaints(&self) -> Result<Vec<ComplaintSummary>, ClientError>;
    async fn complaint(&self, id: ComplaintId) -> Result<ComplaintDetail, ClientError>;
    async fn upvote(&self, id: ComplaintId) -> Result<UpvoteResponse, ClientError>;
    async fn comment(&self, id: ComplaintId, text: &str) -> Result<MessageResponse, ClientError>;
    async fn verify_complaint(&self, id: ComplaintId) -> Result<VerifyComplaintResponse, ClientError>;
    async fn officer_update(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        proof: Option<ImageUpload>,
    ) -> Result<MessageResponse, ClientError>;
    async fn notifications(&self) -> Result<Vec<ComplaintSummary>, ClientError>;

    // Officers
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ClientError>;
    async fn officer_profile(&self) -> Result<OfficerProfileResponse, ClientError>;
    async fn public_officer_profile(&self, off_id: &str) -> Result<PublicOfficerProfileResponse, ClientError>;

    // Bills
    async fn bill(&self, bill_number: &str) -> Result<Bill, ClientError>;
    async fn create_order(&self, bill_number: &str) -> Result<CreateOrderResponse, ClientError>;
    async fn verify_payment(&self, request: VerifyPaymentRequest) -> Result<VerifyPaymentResponse, ClientError>;
}

/// HTTP implementation over reqwest.
///
/// The bearer token is read from the [`TokenStore`] on every request so a
/// sign-in or sign-out takes effect immediately.
#[derive(Clone)]
pub struct HttpCivicApi {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl HttpCivicApi {
    /// `base_url` is the API root, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request = match self.tokens.load() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Request rejected");
            return Err(ClientError::from_response(status.as_u16(), &body));
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "Unexpected response body");
            ClientError::Api(String::new())
        })
    }

    fn image_part(image: ImageUpload) -> Part {
        Part::bytes(image.bytes).file_name(image.filename)
    }
}

#[async_trait]
impl CivicApi for HttpCivicApi {
    async fn check_email(&self, email: &str) -> Result<bool, ClientError> {
        let body = EmailRequest {
            email: Some(email.to_string()),
        };
        let response: CheckEmailResponse = self
            .send(self.http.post(self.url("/auth/check-email")).json(&body))
            .await?;
        Ok(response.exists)
    }

    async fn send_otp(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: Some(email.to_string()),
        };
        self.send(self.http.post(self.url("/auth/send-otp")).json(&body))
            .await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<MessageResponse, ClientError> {
        let body = VerifyOtpRequest {
            email: Some(email.to_string()),
            otp: Some(serde_json::Value::String(otp.to_string())),
        };
        self.send(self.http.post(self.url("/auth/verify-otp")).json(&body))
            .await
    }

    async fn register(&self, request: RegisterRequest) -> Result<MessageResponse, ClientError> {
        self.send(self.http.post(self.url("/auth/register")).json(&request))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        self.send(self.http.post(self.url("/auth/login")).json(&body))
            .await
    }

    async fn officer_login(&self, off_id: &str, password: &str) -> Result<OfficerLoginResponse, ClientError> {
        let body = OfficerLoginRequest {
            off_id: Some(off_id.to_string()),
            password: Some(password.to_string()),
        };
        self.send(self.http.post(self.url("/auth/officer-login")).json(&body))
            .await
    }

    async fn citizen_profile(&self) -> Result<CitizenProfileResponse, ClientError> {
        self.send(self.http.get(self.url("/auth/citizen-profile")))
            .await
    }

    async fn create_complaint(&self, submission: ComplaintSubmission) -> Result<CreateComplaintResponse, ClientError> {
        let form = Form::new()
            .text("title", submission.title)
            .text("description", submission.description)
            .text("issue_name", submission.issue_name)
            .text("latitude", submission.latitude.to_string())
            .text("longitude", submission.longitude.to_string())
            .part("image", Self::image_part(submission.image));
        self.send(self.http.post(self.url("/complaints")).multipart(form))
            .await
    }

    async fn dashboard(&self, status: Option<ComplaintStatus>) -> Result<Vec<ComplaintSummary>, ClientError> {
        let mut request = self.http.get(self.url("/complaints/dashboard"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        self.send(request).await
    }

    async fn my_complaints(&self) -> Result<Vec<ComplaintSummary>, ClientError> {
        self.send(self.http.get(self.url("/complaints/my"))).await
    }

    async fn officer_complaints(&self) -> Result<Vec<ComplaintSummary>, ClientError> {
        self.send(self.http.get(self.url("/complaints/officer")))
            .await
    }

    async fn complaint(&self, id: ComplaintId) -> Result<ComplaintDetail, ClientError> {
        self.send(self.http.get(self.url(&format!("/complaints/{id}"))))
            .await
    }

    async fn upvote(&self, id: ComplaintId) -> Result<UpvoteResponse, ClientError> {
        self.send(self.http.post(self.url(&format!("/complaints/{id}/upvotes"))))
            .await
    }

    async fn comment(&self, id: ComplaintId, text: &str) -> Result<MessageResponse, ClientError> {
        let body = CommentRequest {
            comment: Some(text.to_string()),
        };
        self.send(
            self.http
                .post(self.url(&format!("/complaints/{id}/comment")))
                .json(&body),
        )
        .await
    }

    async fn verify_complaint(&self, id: ComplaintId) -> Result<VerifyComplaintResponse, ClientError> {
        self.send(self.http.put(self.url(&format!("/complaints/citizen/{id}"))))
            .await
    }

    async fn officer_update(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        proof: Option<ImageUpload>,
    ) -> Result<MessageResponse, ClientError> {
        let mut form = Form::new().text("status", status.as_str().to_string());
        if let Some(proof) = proof {
            form = form.part("proof", Self::image_part(proof));
        }
        self.send(
            self.http
                .put(self.url(&format!("/complaints/officer/{id}")))
                .multipart(form),
        )
        .await
    }

    async fn notifications(&self) -> Result<Vec<ComplaintSummary>, ClientError> {
        self.send(self.http.get(self.url("/citizens/notifications")))
            .await
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ClientError> {
        self.send(self.http.get(self.url("/officers/leaderboard")))
            .await
    }

    async fn officer_profile(&self) -> Result<OfficerProfileResponse, ClientError> {
        self.send(self.http.get(self.url("/officers/profile")))
            .await
    }

    async fn public_officer_profile(&self, off_id: &str) -> Result<PublicOfficerProfileResponse, ClientError> {
        self.send(self.http.get(self.url(&format!("/citizens/off-profile/{off_id}"))))
            .await
    }

    async fn bill(&self, bill_number: &str) -> Result<Bill, ClientError> {
        self.send(self.http.get(self.url(&format!("/citizens/bill/{bill_number}"))))
            .await
    }

    async fn create_order(&self, bill_number: &str) -> Result<CreateOrderResponse, ClientError> {
        let body = CreateOrderRequest {
            bill_number: Some(bill_number.to_string()),
        };
        self.send(
            self.http
                .post(self.url("/citizens/bill/create_order"))
                .json(&body),
        )
        .await
    }

    async fn verify_payment(&self, request: VerifyPaymentRequest) -> Result<VerifyPaymentResponse, ClientError> {
        self.send(self.http.post(self.url("/citizens/bill/verify")).json(&request))
            .await
    }
}
