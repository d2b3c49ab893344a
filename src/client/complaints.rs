//! Complaint views
//!
//! Filing, the dashboard listing, the detail page (upvote, comments,
//! verification), the officer resolution form and the citizen's
//! pending-verification list.

use crate::api::types::{CreateComplaintResponse, MessageResponse, VerifyComplaintResponse};
use crate::domain::{
    citizen_verify, is_valid_coordinate, officer_update, ComplaintDetail, ComplaintId,
    ComplaintStatus, ComplaintSummary, Principal, MAX_COMMENT_CHARS,
};
use crate::infra::{image_extension, MAX_IMAGE_BYTES};

use super::api::{CivicApi, ClientError, ComplaintSubmission, ImageUpload};
use super::mutation::Mutation;
use super::session::SessionContext;

fn check_image(image: &ImageUpload, what: &str) -> Result<(), ClientError> {
    if image_extension(&image.filename).is_none() {
        return Err(ClientError::Validation(format!(
            "{what} must be a PNG or JPEG file"
        )));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ClientError::Validation(format!(
            "{what} must be at most 5 MB"
        )));
    }
    Ok(())
}

/// The "File Complaint" form as the citizen fills it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintForm {
    pub title: String,
    pub description: String,
    pub issue_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image: Option<ImageUpload>,
}

impl ComplaintForm {
    /// Check the form before anything is sent.
    pub fn validate(&self) -> Result<ComplaintSubmission, ClientError> {
        let title = self.title.trim();
        let description = self.description.trim();
        let issue_name = self.issue_name.trim();
        if title.is_empty() || description.is_empty() || issue_name.is_empty() {
            return Err(ClientError::Validation("All fields are required".into()));
        }

        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(ClientError::Validation("Location is required".into()));
        };
        if !is_valid_coordinate(latitude, longitude) {
            return Err(ClientError::Validation("Location is not a valid coordinate".into()));
        }

        let image = self
            .image
            .clone()
            .ok_or_else(|| ClientError::Validation("Image required".into()))?;
        check_image(&image, "Image")?;

        Ok(ComplaintSubmission {
            title: title.to_string(),
            description: description.to_string(),
            issue_name: issue_name.to_ascii_lowercase(),
            latitude,
            longitude,
            image,
        })
    }

    pub async fn submit(&self, api: &dyn CivicApi) -> Result<CreateComplaintResponse, ClientError> {
        let submission = self.validate()?;
        api.create_complaint(submission).await
    }
}

/// Dashboard listing with an optional status filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub filter: Option<ComplaintStatus>,
    pub complaints: Vec<ComplaintSummary>,
}

impl DashboardView {
    pub async fn load(api: &dyn CivicApi, filter: Option<ComplaintStatus>) -> Result<Self, ClientError> {
        let complaints = api.dashboard(filter).await?;
        Ok(Self { filter, complaints })
    }

    /// Number of listed complaints per status, in lifecycle order.
    pub fn status_counts(&self) -> [(ComplaintStatus, usize); 4] {
        ComplaintStatus::ALL.map(|status| {
            let n = self.complaints.iter().filter(|c| c.status == status).count();
            (status, n)
        })
    }
}

/// The complaint detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintDetailView {
    detail: ComplaintDetail,
    upvotes: Mutation<i64>,
    comment: Mutation<()>,
    verify: Mutation<ComplaintStatus>,
}

impl ComplaintDetailView {
    pub async fn load(api: &dyn CivicApi, id: ComplaintId) -> Result<Self, ClientError> {
        let detail = api.complaint(id).await?;
        Ok(Self::new(detail))
    }

    pub fn new(detail: ComplaintDetail) -> Self {
        Self {
            upvotes: Mutation::new(detail.upvote_count),
            comment: Mutation::new(()),
            verify: Mutation::new(detail.status),
            detail,
        }
    }

    pub fn detail(&self) -> &ComplaintDetail {
        &self.detail
    }

    pub fn upvote_count(&self) -> i64 {
        *self.upvotes.value()
    }

    pub fn status(&self) -> ComplaintStatus {
        *self.verify.value()
    }

    /// Inline error from the most recent failed action.
    pub fn error_message(&self) -> Option<String> {
        self.verify
            .error_message()
            .or_else(|| self.comment.error_message())
            .or_else(|| self.upvotes.error_message())
    }

    /// Optimistically bump the count; the server's count wins.
    pub async fn upvote(&mut self, api: &dyn CivicApi) {
        let optimistic = self.upvote_count() + 1;
        if !self.upvotes.begin(optimistic) {
            return;
        }
        let outcome = api.upvote(self.detail.id).await.map(|r| r.upvote_count);
        self.upvotes.settle(outcome);
        self.detail.upvote_count = self.upvote_count();
    }

    /// Post a comment, then reload the thread.
    pub async fn add_comment(&mut self, api: &dyn CivicApi, text: &str) {
        let text = text.trim();
        if !self.comment.begin_unchanged() {
            return;
        }
        if text.is_empty() {
            self.comment
                .settle(Err(ClientError::Validation("comment text is required".into())));
            return;
        }
        if text.chars().count() > MAX_COMMENT_CHARS {
            self.comment.settle(Err(ClientError::Validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            ))));
            return;
        }

        let posted = match api.comment(self.detail.id, text).await {
            Ok(_) => api.complaint(self.detail.id).await,
            Err(err) => Err(err),
        };
        match posted {
            Ok(detail) => {
                *self = Self::new(detail);
                self.comment.begin_unchanged();
                self.comment.settle(Ok(()));
            }
            Err(err) => self.comment.settle(Err(err)),
        }
    }

    /// Verification is offered to the filing citizen once the complaint is
    /// resolved.
    pub fn can_verify(&self, session: &SessionContext) -> bool {
        let owner = matches!(
            session.identity().map(|i| &i.principal),
            Some(Principal::Citizen(user)) if *user == self.detail.created_by
        );
        owner && self.status() == ComplaintStatus::Resolved
    }

    pub async fn verify(&mut self, api: &dyn CivicApi, session: &SessionContext) {
        if !self.can_verify(session) || !self.verify.begin_unchanged() {
            return;
        }
        let outcome = api
            .verify_complaint(self.detail.id)
            .await
            .map(|_| ComplaintStatus::Verified);
        self.verify.settle(outcome);
        self.detail.status = self.status();
    }
}

/// Officer form for moving an assigned complaint forward.
#[derive(Debug, Clone, PartialEq)]
pub struct OfficerUpdateForm {
    complaint_id: ComplaintId,
    target: Option<ComplaintStatus>,
    proof: Option<ImageUpload>,
    submission: Mutation<ComplaintStatus>,
}

impl OfficerUpdateForm {
    pub fn new(complaint_id: ComplaintId, current: ComplaintStatus) -> Self {
        Self {
            complaint_id,
            target: None,
            proof: None,
            submission: Mutation::new(current),
        }
    }

    pub fn current(&self) -> ComplaintStatus {
        *self.submission.value()
    }

    /// Statuses offered in the selector. Never includes a backward state.
    pub fn choices(&self) -> &'static [ComplaintStatus] {
        self.current().officer_targets()
    }

    pub fn select(&mut self, target: ComplaintStatus) -> Result<(), ClientError> {
        if !self.choices().contains(&target) {
            return Err(ClientError::Validation(format!(
                "cannot move complaint from {} to {target}",
                self.current()
            )));
        }
        self.target = Some(target);
        Ok(())
    }

    pub fn attach_proof(&mut self, proof: ImageUpload) -> Result<(), ClientError> {
        check_image(&proof, "Proof image")?;
        self.proof = Some(proof);
        Ok(())
    }

    pub fn error_message(&self) -> Option<String> {
        self.submission.error_message()
    }

    /// Validate locally, then send. A missing proof never reaches the server.
    pub async fn submit(&mut self, api: &dyn CivicApi) -> Result<MessageResponse, ClientError> {
        let target = self
            .target
            .ok_or_else(|| ClientError::Validation("Select a status".into()))?;
        officer_update(self.current(), target, self.proof.is_some())
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        if !self.submission.begin_unchanged() {
            return Err(ClientError::Validation("An update is already in progress".into()));
        }
        let result = api
            .officer_update(self.complaint_id, target, self.proof.clone())
            .await;
        self.submission
            .settle(result.as_ref().map(|_| target).map_err(Clone::clone));
        if result.is_ok() {
            self.target = None;
            self.proof = None;
        }
        result
    }
}

/// One resolved complaint awaiting the citizen's confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVerification {
    pub complaint: ComplaintSummary,
    verify: Mutation<ComplaintStatus>,
}

impl PendingVerification {
    pub fn error_message(&self) -> Option<String> {
        self.verify.error_message()
    }
}

/// The notifications page: resolved complaints the citizen can verify.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationsView {
    items: Vec<PendingVerification>,
}

impl NotificationsView {
    pub async fn load(api: &dyn CivicApi) -> Result<Self, ClientError> {
        let items = api
            .notifications()
            .await?
            .into_iter()
            .filter(|c| c.status == ComplaintStatus::Resolved)
            .map(|complaint| PendingVerification {
                verify: Mutation::new(complaint.status),
                complaint,
            })
            .collect();
        Ok(Self { items })
    }

    pub fn items(&self) -> &[PendingVerification] {
        &self.items
    }

    /// Verify one item. It leaves the list on success and stays, with an
    /// inline error, on failure.
    pub async fn verify(
        &mut self,
        api: &dyn CivicApi,
        id: ComplaintId,
    ) -> Option<Result<VerifyComplaintResponse, ClientError>> {
        let index = self.items.iter().position(|i| i.complaint.id == id)?;
        let item = &mut self.items[index];
        if citizen_verify(item.complaint.status).is_err() || !item.verify.begin_unchanged() {
            return None;
        }

        let result = api.verify_complaint(id).await;
        item.verify.settle(
            result
                .as_ref()
                .map(|_| ComplaintStatus::Verified)
                .map_err(Clone::clone),
        );
        if result.is_ok() {
            self.items.remove(index);
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::UpvoteResponse;
    use crate::client::api::MockCivicApi;
    use crate::client::session::MemoryTokenStore;
    use crate::domain::{Comment, PriorityLevel, UserId};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn png() -> ImageUpload {
        ImageUpload {
            filename: "pothole.png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    fn detail(status: ComplaintStatus, owner: i64) -> ComplaintDetail {
        ComplaintDetail {
            id: ComplaintId(7),
            title: "Pothole on 5th".into(),
            description: "Large pothole causing traffic".into(),
            issue_type: "pothole".into(),
            area: "1".into(),
            status,
            image: "a.png".into(),
            proof: None,
            latitude: 12.9,
            longitude: 77.6,
            upvote_count: 2,
            priority_level: PriorityLevel::Low,
            created_by: UserId(owner),
            officer_id: None,
            duplicate_of: None,
            created_at: Utc::now(),
            comments: vec![],
        }
    }

    fn summary(id: i64, status: ComplaintStatus) -> ComplaintSummary {
        ComplaintSummary {
            id: ComplaintId(id),
            title: "t".into(),
            description: "d".into(),
            issue_type: "garbage".into(),
            area: "1".into(),
            status,
            image: "a.png".into(),
            upvote_count: 0,
            created_by: Some(UserId(3)),
            officer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn citizen(id: i64) -> SessionContext {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{id}","role":"citizen"}}"#));
        SessionContext::from_store(&MemoryTokenStore::with_token(format!("h.{payload}.s")), Utc::now())
    }

    #[test]
    fn form_requires_every_field() {
        let mut form = ComplaintForm {
            title: "Pothole on 5th".into(),
            description: "Large pothole causing traffic".into(),
            issue_name: "Pothole".into(),
            latitude: Some(12.9),
            longitude: Some(77.6),
            image: None,
        };
        assert_eq!(
            form.validate().unwrap_err(),
            ClientError::Validation("Image required".into())
        );

        form.image = Some(ImageUpload {
            filename: "scan.pdf".into(),
            bytes: vec![1],
        });
        assert!(matches!(form.validate(), Err(ClientError::Validation(_))));

        form.image = Some(png());
        let submission = form.validate().unwrap();
        assert_eq!(submission.issue_name, "pothole");

        form.latitude = Some(120.0);
        assert!(form.validate().is_err());
        form.latitude = Some(12.9);
        form.title = "   ".into();
        assert!(form.validate().is_err());
    }

    #[tokio::test]
    async fn upvote_takes_server_count() {
        let mut api = MockCivicApi::new();
        api.expect_upvote().with(eq(ComplaintId(7))).times(1).returning(|_| {
            Ok(UpvoteResponse {
                message: "complaint upvoted successfully".into(),
                upvote_count: 9,
                priority_score: 28.0,
            })
        });

        let mut view = ComplaintDetailView::new(detail(ComplaintStatus::Pending, 3));
        view.upvote(&api).await;
        assert_eq!(view.upvote_count(), 9);
        assert_eq!(view.detail().upvote_count, 9);
    }

    #[tokio::test]
    async fn rejected_upvote_reverts() {
        let mut api = MockCivicApi::new();
        api.expect_upvote()
            .returning(|_| Err(ClientError::Conflict("You have already upvoted this complaint".into())));

        let mut view = ComplaintDetailView::new(detail(ComplaintStatus::Pending, 3));
        view.upvote(&api).await;
        assert_eq!(view.upvote_count(), 2);
        assert_eq!(
            view.error_message().as_deref(),
            Some("You have already upvoted this complaint")
        );
    }

    #[tokio::test]
    async fn comment_refetches_thread() {
        let mut api = MockCivicApi::new();
        api.expect_comment()
            .with(eq(ComplaintId(7)), eq("Still there"))
            .times(1)
            .returning(|_, _| Ok(MessageResponse::new("comment added successfully")));
        api.expect_complaint().times(1).returning(|_| {
            let mut d = detail(ComplaintStatus::Pending, 3);
            d.comments.push(Comment {
                text: "Still there".into(),
                user: "Ravi".into(),
                time: Utc::now(),
            });
            Ok(d)
        });

        let mut view = ComplaintDetailView::new(detail(ComplaintStatus::Pending, 3));
        view.add_comment(&api, "  Still there ").await;
        assert_eq!(view.detail().comments.len(), 1);
        assert!(view.error_message().is_none());
    }

    #[tokio::test]
    async fn empty_or_long_comment_is_not_sent() {
        let api = MockCivicApi::new();
        let mut view = ComplaintDetailView::new(detail(ComplaintStatus::Pending, 3));

        view.add_comment(&api, "   ").await;
        assert_eq!(view.error_message().as_deref(), Some("comment text is required"));

        view.add_comment(&api, &"x".repeat(MAX_COMMENT_CHARS + 1)).await;
        assert!(view.error_message().is_some());
    }

    #[tokio::test]
    async fn verify_only_for_owner_of_resolved() {
        let owner = citizen(3);
        let other = citizen(4);

        let pending = ComplaintDetailView::new(detail(ComplaintStatus::Pending, 3));
        assert!(!pending.can_verify(&owner));

        let mut resolved = ComplaintDetailView::new(detail(ComplaintStatus::Resolved, 3));
        assert!(!resolved.can_verify(&other));
        assert!(!resolved.can_verify(&SessionContext::anonymous()));
        assert!(resolved.can_verify(&owner));

        let mut api = MockCivicApi::new();
        api.expect_verify_complaint().times(1).returning(|id| {
            Ok(VerifyComplaintResponse {
                message: "complaint verified successfully".into(),
                complaint_id: id,
                verified_at: Utc::now(),
                officer_points: Some(2.0),
            })
        });
        resolved.verify(&api, &owner).await;
        assert_eq!(resolved.status(), ComplaintStatus::Verified);
        assert!(!resolved.can_verify(&owner));
    }

    #[tokio::test]
    async fn officer_update_requires_proof_before_sending() {
        let api = MockCivicApi::new();
        let mut form = OfficerUpdateForm::new(ComplaintId(7), ComplaintStatus::Pending);
        assert_eq!(
            form.choices(),
            &[ComplaintStatus::InProgress, ComplaintStatus::Resolved]
        );
        form.select(ComplaintStatus::Resolved).unwrap();

        let err = form.submit(&api).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Validation("proof image is required to update a complaint".into())
        );
        assert_eq!(form.current(), ComplaintStatus::Pending);
    }

    #[tokio::test]
    async fn officer_update_moves_forward_only() {
        let mut api = MockCivicApi::new();
        api.expect_officer_update()
            .withf(|id, status, proof| {
                *id == ComplaintId(7) && *status == ComplaintStatus::InProgress && proof.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(MessageResponse::new("Complaint status updated successfully")));

        let mut form = OfficerUpdateForm::new(ComplaintId(7), ComplaintStatus::Pending);
        form.select(ComplaintStatus::InProgress).unwrap();
        form.attach_proof(png()).unwrap();
        form.submit(&api).await.unwrap();

        assert_eq!(form.current(), ComplaintStatus::InProgress);
        assert_eq!(form.choices(), &[ComplaintStatus::Resolved]);
        assert!(form.select(ComplaintStatus::Pending).is_err());
    }

    #[tokio::test]
    async fn failed_officer_update_keeps_status() {
        let mut api = MockCivicApi::new();
        api.expect_officer_update().returning(|_, _, _| {
            Err(ClientError::Forbidden("You are not authorized to update this complaint".into()))
        });

        let mut form = OfficerUpdateForm::new(ComplaintId(7), ComplaintStatus::InProgress);
        form.select(ComplaintStatus::Resolved).unwrap();
        form.attach_proof(png()).unwrap();
        assert!(form.submit(&api).await.is_err());
        assert_eq!(form.current(), ComplaintStatus::InProgress);
        assert_eq!(
            form.error_message().as_deref(),
            Some("You are not authorized to update this complaint")
        );
    }

    #[tokio::test]
    async fn verified_notification_leaves_the_list() {
        let mut api = MockCivicApi::new();
        api.expect_notifications().returning(|| {
            Ok(vec![
                summary(1, ComplaintStatus::Resolved),
                summary(2, ComplaintStatus::Resolved),
            ])
        });
        let mut calls = 0;
        api.expect_verify_complaint().times(2).returning(move |id| {
            calls += 1;
            if calls == 1 {
                Ok(VerifyComplaintResponse {
                    message: "complaint verified successfully".into(),
                    complaint_id: id,
                    verified_at: Utc::now(),
                    officer_points: None,
                })
            } else {
                Err(ClientError::Network("reset".into()))
            }
        });

        let mut view = NotificationsView::load(&api).await.unwrap();
        assert_eq!(view.items().len(), 2);

        assert!(view.verify(&api, ComplaintId(1)).await.unwrap().is_ok());
        assert_eq!(view.items().len(), 1);

        assert!(view.verify(&api, ComplaintId(2)).await.unwrap().is_err());
        assert_eq!(view.items().len(), 1);
        assert!(view.items()[0].error_message().is_some());

        assert!(view.verify(&api, ComplaintId(99)).await.is_none());
    }

    #[tokio::test]
    async fn dashboard_counts_by_status() {
        let mut api = MockCivicApi::new();
        api.expect_dashboard().with(eq(None::<ComplaintStatus>)).returning(|_| {
            Ok(vec![
                summary(1, ComplaintStatus::Pending),
                summary(2, ComplaintStatus::Pending),
                summary(3, ComplaintStatus::Verified),
            ])
        });

        let view = DashboardView::load(&api, None).await.unwrap();
        assert_eq!(
            view.status_counts(),
            [
                (ComplaintStatus::Pending, 2),
                (ComplaintStatus::InProgress, 0),
                (ComplaintStatus::Resolved, 0),
                (ComplaintStatus::Verified, 1),
            ]
        );
    }
}
