//! Registration, login and citizen profile handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument};

use crate::api::auth_helpers::ensure_citizen;
use crate::api::error::{validation_error, ApiError, ErrorCode};
use crate::api::types::{
    CheckEmailResponse, CitizenProfile, CitizenProfileResponse, EmailRequest, LoginRequest,
    LoginResponse, LoginUser, MessageResponse, OfficerLoginRequest, OfficerLoginResponse,
    RegisterRequest, VerifyOtpRequest,
};
use crate::api::utils::{bad_json, required};
use crate::auth::{hash_password, verify_password, AuthContextExt};
use crate::domain::{
    is_plausible_email, normalize_email, ComplaintSummary, NewCitizen, OfficerId, Principal,
    Role, MIN_PASSWORD_CHARS,
};
use crate::infra::ComplaintFilter;
use crate::server::AppState;

fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::InvalidCredentials, "Invalid credential")
}

fn email_field(value: Option<String>) -> Result<String, ApiError> {
    let email = normalize_email(&required("email", value)?);
    if !is_plausible_email(&email) {
        return Err(validation_error("email", "Invalid email address"));
    }
    Ok(email)
}

/// POST /api/auth/check-email - Report whether an email is registered.
#[instrument(skip_all)]
pub async fn check_email(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<CheckEmailResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    let email = normalize_email(&required("email", request.email)?);
    let exists = state.accounts.email_registered(&email).await?;
    Ok(Json(CheckEmailResponse { exists }))
}

/// POST /api/auth/send-otp - Email a registration passcode.
#[instrument(skip_all)]
pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    let email = email_field(request.email)?;

    if state.accounts.email_registered(&email).await? {
        return Err(ApiError::new(
            ErrorCode::AlreadyExists,
            "User already exists, please login",
        ));
    }

    state
        .otp
        .issue(&email, state.otp_sender.as_ref(), Utc::now())
        .await?;
    Ok(Json(MessageResponse::new("OTP sent to email")))
}

/// POST /api/auth/verify-otp - Check a registration passcode.
#[instrument(skip_all)]
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;

    // The form posts the code as either a string or a number.
    let code = match request.otp {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let (email, code) = match (request.email, code) {
        (Some(email), Some(code)) if !email.trim().is_empty() && !code.trim().is_empty() => {
            (normalize_email(&email), code)
        }
        _ => {
            return Err(ApiError::new(
                ErrorCode::MissingRequiredField,
                "Email and OTP are required",
            ))
        }
    };

    state.otp.verify(&email, &code, Utc::now()).await?;
    Ok(Json(MessageResponse::new("OTP verified successfully")))
}

/// POST /api/auth/register - Create a citizen account after OTP verification.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = payload.map_err(bad_json)?;

    let all_fields = (|| {
        Some((
            request.name.filter(|v| !v.trim().is_empty())?,
            request.email.filter(|v| !v.trim().is_empty())?,
            request.password.filter(|v| !v.is_empty())?,
            request.area.filter(|v| !v.trim().is_empty())?,
            request.state.filter(|v| !v.trim().is_empty())?,
        ))
    })();
    let Some((name, email, password, area, region)) = all_fields else {
        return Err(ApiError::new(
            ErrorCode::MissingRequiredField,
            "All fields are required",
        ));
    };
    let email = email_field(Some(email))?;

    if state.accounts.email_registered(&email).await? {
        return Err(ApiError::new(ErrorCode::AlreadyExists, "Email already registered"));
    }
    if !state.otp.is_verified(&email).await? {
        return Err(validation_error("email", "Email not verified"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(validation_error(
            "password",
            format!("Password must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }

    let hash = hash_password(&password)?;
    let citizen = NewCitizen {
        name: name.trim().to_string(),
        email: email.clone(),
        area: area.trim().to_string(),
        state: region.trim().to_string(),
        phone_number: request
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
    };
    let user_id = state.accounts.create_citizen(&citizen, &hash).await?;
    state.otp.consume(&email).await?;

    info!(user_id = user_id.0, "Citizen registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// POST /api/auth/login - Citizen login by email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    let email = normalize_email(&required("email", request.email)?);
    let password = required("password", request.password)?;

    let (citizen, hash) = state
        .accounts
        .citizen_credentials(&email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&password, &hash) {
        return Err(invalid_credentials());
    }

    let principal = Principal::Citizen(citizen.id);
    let access_token = state
        .jwt
        .issue(&principal, Some(&citizen.name), Some(&citizen.email))?;

    info!(user_id = citizen.id.0, "Citizen logged in");
    Ok(Json(LoginResponse {
        access_token,
        user: LoginUser {
            id: citizen.id.0,
            name: citizen.name,
            email: citizen.email,
            role: Role::Citizen,
        },
    }))
}

/// POST /api/auth/officer-login - Officer login by badge id and password.
#[instrument(skip_all)]
pub async fn officer_login(
    State(state): State<AppState>,
    payload: Result<Json<OfficerLoginRequest>, JsonRejection>,
) -> Result<Json<OfficerLoginResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    let off_id = OfficerId::new(required("off_id", request.off_id)?);
    let password = required("password", request.password)?;

    let (officer, hash) = state
        .accounts
        .officer_credentials(&off_id)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&password, &hash) {
        return Err(invalid_credentials());
    }

    let principal = Principal::Officer(officer.off_id.clone());
    let access_token = state
        .jwt
        .issue(&principal, Some(&officer.name), Some(&officer.email))?;

    info!(off_id = %officer.off_id, "Officer logged in");
    Ok(Json(OfficerLoginResponse {
        access_token,
        message: "Officer logged in successfully".to_string(),
    }))
}

/// GET /api/auth/citizen-profile - The caller's account and complaints.
#[instrument(skip_all)]
pub async fn citizen_profile(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<CitizenProfileResponse>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let citizen = state
        .accounts
        .citizen(user_id)
        .await?
        .ok_or_else(|| crate::api::error::not_found("user", user_id.0))?;

    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            created_by: Some(user_id),
            ..Default::default()
        })
        .await?;

    Ok(Json(CitizenProfileResponse {
        user: CitizenProfile {
            name: citizen.name,
            email: citizen.email,
            area: citizen.area,
            state: citizen.state,
        },
        complaints: complaints.iter().map(ComplaintSummary::from).collect(),
    }))
}
