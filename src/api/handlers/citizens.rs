//! Citizen notification handlers.

use axum::extract::{Extension, State};
use axum::Json;
use tracing::instrument;

use crate::api::auth_helpers::ensure_citizen;
use crate::api::error::ApiError;
use crate::auth::AuthContextExt;
use crate::domain::{ComplaintStatus, ComplaintSummary};
use crate::infra::ComplaintFilter;
use crate::server::AppState;

/// GET /api/citizens/notifications - The caller's resolved complaints awaiting verification.
#[instrument(skip_all)]
pub async fn notifications(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<Vec<ComplaintSummary>>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            created_by: Some(user_id),
            status: Some(ComplaintStatus::Resolved),
            ..Default::default()
        })
        .await?;
    Ok(Json(complaints.iter().map(ComplaintSummary::from).collect()))
}
