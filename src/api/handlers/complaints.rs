//! Complaint lifecycle handlers.
//!
//! Creation runs the full intake pipeline: field validation, image checks,
//! ward lookup, officer assignment, priority and duplicate screening. The
//! image is written last and removed again if the insert fails.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::api::auth_helpers::{ensure_citizen, ensure_officer, ensure_role};
use crate::api::error::{forbidden, missing_field, validation_error, ApiError, ErrorCode};
use crate::api::types::{
    CommentRequest, CreateComplaintResponse, DashboardQuery, MessageResponse, UpvoteResponse,
    VerifyComplaintResponse,
};
use crate::api::utils::{bad_json, bad_multipart, read_file, read_text, required, UploadedFile};
use crate::auth::{AuthContextExt, Requirement};
use crate::domain::{
    calculate_priority, detect_duplicate, is_candidate, is_valid_coordinate, locate_ward,
    officer_update, ComplaintDetail, ComplaintId, ComplaintStatus, ComplaintSummary,
    PriorityLevel, Principal, MAX_COMMENT_CHARS,
};
use crate::infra::{ComplaintFilter, NewComplaint};
use crate::server::AppState;

fn summaries(complaints: &[crate::domain::Complaint]) -> Json<Vec<ComplaintSummary>> {
    Json(complaints.iter().map(ComplaintSummary::from).collect())
}

fn parse_coordinate(field: &str, value: Option<String>) -> Result<f64, ApiError> {
    let raw = required(field, value)?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| validation_error(field, format!("{field} must be a number")))
}

/// Multipart body of a new complaint.
#[derive(Default)]
struct ComplaintForm {
    title: Option<String>,
    description: Option<String>,
    issue_name: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    image: Option<UploadedFile>,
}

impl ComplaintForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ComplaintForm::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            match field.name().unwrap_or_default() {
                "title" => form.title = Some(read_text(field).await?),
                "description" => form.description = Some(read_text(field).await?),
                "issue_name" | "issue_type" => form.issue_name = Some(read_text(field).await?),
                "latitude" => form.latitude = Some(read_text(field).await?),
                "longitude" => form.longitude = Some(read_text(field).await?),
                "image" => form.image = Some(read_file(field).await?),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// POST /api/complaints - File a new complaint.
#[instrument(skip_all)]
pub async fn create_complaint(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateComplaintResponse>), ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let form = ComplaintForm::read(multipart).await?;

    let (Some(title), Some(description), Some(issue_name)) = (
        form.title.filter(|v| !v.trim().is_empty()),
        form.description.filter(|v| !v.trim().is_empty()),
        form.issue_name.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(ApiError::new(
            ErrorCode::MissingRequiredField,
            "title, description and issue type are required",
        ));
    };
    let image = form
        .image
        .filter(|f| !f.filename.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::MissingRequiredField, "Image required"))?;

    let latitude = parse_coordinate("latitude", form.latitude)?;
    let longitude = parse_coordinate("longitude", form.longitude)?;
    if !is_valid_coordinate(latitude, longitude) {
        return Err(validation_error("latitude", "Invalid coordinates"));
    }

    state.uploads.check(&image.filename, image.bytes.len())?;

    let issue_name = issue_name.trim().to_ascii_lowercase();
    let issue = state
        .catalog
        .issue_type(&issue_name)
        .await?
        .ok_or_else(|| validation_error("issue_name", "Invalid issue type"))?;

    let wards = state.catalog.wards().await?;
    let ward = locate_ward(&wards, latitude, longitude)
        .ok_or_else(|| validation_error("location", "Location is outside every ward"))?;
    let officer_id = state
        .accounts
        .officer_for_ward(ward.ward_id)
        .await?
        .ok_or_else(|| validation_error("location", "No officer available for this area"))?;

    let now = Utc::now();
    let priority_score = calculate_priority(0, 0.0, issue.base_severity);
    let priority_level = PriorityLevel::from_score(priority_score);

    let candidates: Vec<_> = state
        .complaints
        .recent_candidates(now)
        .await?
        .into_iter()
        .filter(|c| is_candidate(c, latitude, longitude, now))
        .collect();
    let verdict = detect_duplicate(&description, &candidates);

    let stored = state.uploads.save(&image.filename, &image.bytes).await?;
    let new_complaint = NewComplaint {
        title: title.trim().to_string(),
        description: description.trim().to_string(),
        issue_type: issue.name.clone(),
        image: stored.clone(),
        latitude,
        longitude,
        area: ward.ward_id.to_string(),
        created_by: user_id,
        officer_id,
        priority_score,
        priority_level,
        duplicate_of: verdict.parent(),
        review_flag: verdict.flag(),
        created_at: now,
    };

    let complaint_id = match state.complaints.insert(&new_complaint).await {
        Ok(id) => id,
        Err(e) => {
            state.uploads.discard(&stored).await;
            return Err(e.into());
        }
    };

    info!(
        complaint_id = complaint_id.0,
        ward = ward.ward_id,
        officer = %new_complaint.officer_id,
        priority = priority_level.as_str(),
        "Complaint registered"
    );
    if let Some(flag) = verdict.flag() {
        warn!(complaint_id = complaint_id.0, flag = flag.as_str(), "Complaint flagged for review");
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateComplaintResponse {
            message: "complaint registered successfully".to_string(),
            complaint_id,
            status: ComplaintStatus::Pending,
            priority_level,
            review_flag: verdict.flag(),
            duplicate_of: verdict.parent(),
        }),
    ))
}

/// GET /api/complaints/dashboard - All complaints for citizens, assigned ones for officers.
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<ComplaintSummary>>, ApiError> {
    ensure_role(&auth, Requirement::CITIZEN_OR_OFFICER)?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            s.parse::<ComplaintStatus>()
                .map_err(|e| validation_error("status", e))?,
        ),
    };
    let officer_id = match &auth.principal {
        Principal::Officer(off_id) => Some(off_id.clone()),
        Principal::Citizen(_) => None,
    };

    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            created_by: None,
            officer_id,
            status,
        })
        .await?;
    Ok(summaries(&complaints))
}

/// GET /api/complaints/my - Complaints filed by the caller.
#[instrument(skip_all)]
pub async fn my_complaints(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<Vec<ComplaintSummary>>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            created_by: Some(user_id),
            ..Default::default()
        })
        .await?;
    Ok(summaries(&complaints))
}

/// GET /api/complaints/officer - Complaints assigned to the calling officer.
#[instrument(skip_all)]
pub async fn officer_complaints(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
) -> Result<Json<Vec<ComplaintSummary>>, ApiError> {
    let off_id = ensure_officer(&auth)?;
    let complaints = state
        .complaints
        .list(&ComplaintFilter {
            officer_id: Some(off_id),
            ..Default::default()
        })
        .await?;
    Ok(summaries(&complaints))
}

/// GET /api/complaints/:id - Complaint detail with comments.
#[instrument(skip(state, auth))]
pub async fn complaint_detail(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<i64>,
) -> Result<Json<ComplaintDetail>, ApiError> {
    ensure_role(&auth, Requirement::CITIZEN_OR_OFFICER)?;
    let id = ComplaintId(id);
    let complaint = state.complaints.require(id).await?;
    let comments = state.complaints.comments(id).await?;
    Ok(Json(ComplaintDetail::from_complaint(&complaint, comments)))
}

/// POST /api/complaints/:id/upvotes - Upvote someone else's complaint.
#[instrument(skip(state, auth))]
pub async fn upvote(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<i64>,
) -> Result<Json<UpvoteResponse>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let outcome = state
        .complaints
        .upvote(ComplaintId(id), user_id, Utc::now())
        .await?;

    Ok(Json(UpvoteResponse {
        message: "complaint upvoted successfully".to_string(),
        upvote_count: outcome.upvote_count,
        priority_score: outcome.priority_score,
    }))
}

/// POST /api/complaints/:id/comment - Append a comment.
#[instrument(skip(state, auth, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<i64>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let Json(request) = payload.map_err(bad_json)?;

    let text = request
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::MissingRequiredField, "comment text is required"))?;
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(validation_error(
            "comment",
            format!("comment must be at most {MAX_COMMENT_CHARS} characters"),
        ));
    }

    state.complaints.add_comment(ComplaintId(id), user_id, &text).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("comment added successfully")),
    ))
}

/// PUT /api/complaints/citizen/:id - Filer confirms a resolved complaint.
#[instrument(skip(state, auth))]
pub async fn verify_complaint(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<i64>,
) -> Result<Json<VerifyComplaintResponse>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let outcome = state
        .complaints
        .verify(ComplaintId(id), user_id, Utc::now())
        .await?;

    if let Some(draft) = &outcome.ledger_entry {
        info!(
            complaint_id = id,
            officer = %draft.officer_id,
            points = draft.points,
            outcome = draft.outcome.as_str(),
            "Officer scored"
        );
    }

    Ok(Json(VerifyComplaintResponse {
        message: "complaint verified successfully".to_string(),
        complaint_id: outcome.complaint_id,
        verified_at: outcome.verified_at,
        officer_points: outcome.ledger_entry.map(|draft| draft.points),
    }))
}

/// PUT /api/complaints/officer/:id - Assigned officer moves a complaint forward.
#[instrument(skip(state, auth, multipart))]
pub async fn officer_update_status(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let off_id = ensure_officer(&auth)?;

    let mut status = None;
    let mut proof: Option<UploadedFile> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name().unwrap_or_default() {
            "status" => status = Some(read_text(field).await?),
            "proof" => proof = Some(read_file(field).await?),
            _ => {}
        }
    }
    let target = status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing_field("status"))?
        .parse::<ComplaintStatus>()
        .map_err(|e| validation_error("status", e))?;

    let complaint = state.complaints.require(ComplaintId(id)).await?;
    if !complaint.is_assigned_to(&off_id) {
        return Err(forbidden("You are not authorized to update this complaint"));
    }

    let proof = proof.filter(|p| !p.filename.is_empty());
    let next = officer_update(complaint.status, target, proof.is_some())?;
    let Some(proof) = proof else {
        return Err(missing_field("proof"));
    };
    state.uploads.check(&proof.filename, proof.bytes.len())?;

    let stored = state.uploads.save(&proof.filename, &proof.bytes).await?;
    if let Err(e) = state
        .complaints
        .apply_officer_update(complaint.id, complaint.status, next, &stored, Utc::now())
        .await
    {
        state.uploads.discard(&stored).await;
        return Err(e.into());
    }

    info!(
        complaint_id = id,
        officer = %off_id,
        from = complaint.status.as_str(),
        to = next.as_str(),
        "Complaint status updated"
    );
    Ok(Json(MessageResponse::new("Complaint status updated successfully")))
}
