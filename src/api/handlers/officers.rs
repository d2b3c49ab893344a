//! Leaderboard and officer profile handlers.

use axum::extract::{Extension, Path, State};
use axum::Json;
use tracing::instrument;

use crate::api::auth_helpers::{ensure_officer, ensure_role};
use crate::api::error::{not_found, ApiError};
use crate::api::types::{OfficerProfileResponse, OfficerPublic, OfficerSelf, PublicOfficerProfileResponse};
use crate::auth::{AuthContextExt, Requirement};
use crate::domain::{ComplaintSummary, LeaderboardEntry, OfficerId};
use crate::infra::ComplaintFilter;
use crate::server::AppState;

/// GET /api/officers/leaderboard - Every officer ranked by points.
#[instrument(skip_all)]
pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    ensure_role(&auth, Requirement::CITIZEN_OR_OFFICER)?;
    Ok(Json(state.ledger.leaderboard().await?))
}

/// GET /api/officers/profile - The calling officer's account and assignments.
#[instrument(skip_all)]
pub async fn officer_profile(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<OfficerProfileResponse>, ApiError> {
    let off_id = ensure_officer(&auth)?;
    let officer = state
        .accounts
        .officer(&off_id)
        .await?
        .ok_or_else(|| not_found("officer", &off_id))?;
    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            officer_id: Some(off_id),
            ..Default::default()
        })
        .await?;

    Ok(Json(OfficerProfileResponse {
        officer: OfficerSelf {
            off_id: officer.off_id,
            name: officer.name,
            email: officer.email,
            area: officer.ward_id.to_string(),
            designation: officer.designation,
        },
        complaints: complaints.iter().map(ComplaintSummary::from).collect(),
    }))
}

/// GET /api/citizens/off-profile/:id - Public officer profile with ranking.
#[instrument(skip(state, auth))]
pub async fn public_officer_profile(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<String>,
) -> Result<Json<PublicOfficerProfileResponse>, ApiError> {
    ensure_role(&auth, Requirement::CITIZEN_OR_OFFICER)?;
    let off_id = OfficerId::new(id);
    let officer = state
        .accounts
        .officer(&off_id)
        .await?
        .ok_or_else(|| not_found("officer", &off_id))?;

    let stats = state.ledger.standing(&off_id).await?;
    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            officer_id: Some(off_id),
            ..Default::default()
        })
        .await?;

    Ok(Json(PublicOfficerProfileResponse {
        officer: OfficerPublic {
            off_id: officer.off_id,
            name: officer.name,
            designation: officer.designation,
            area: officer.ward_id.to_string(),
        },
        stats,
        complaints: complaints.iter().map(ComplaintSummary::from).collect(),
    }))
}
