//! REST route table.
//!
//! [`public_router`] holds the registration and login routes; everything in
//! [`router`] sits behind the bearer-token middleware.

use axum::routing::{get, post, put};
use axum::Router;

use crate::api::handlers::*;
use crate::server::AppState;

/// Unauthenticated auth routes.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/check-email", post(check_email))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/officer-login", post(officer_login))
}

/// Routes that require a valid session token.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/citizen-profile", get(citizen_profile))
        // Complaints
        .route("/complaints", post(create_complaint))
        .route("/complaints/dashboard", get(dashboard))
        .route("/complaints/my", get(my_complaints))
        .route("/complaints/officer", get(officer_complaints))
        .route("/complaints/:id", get(complaint_detail))
        .route("/complaints/:id/upvotes", post(upvote))
        .route("/complaints/:id/comment", post(add_comment))
        .route("/complaints/citizen/:id", put(verify_complaint))
        .route("/complaints/officer/:id", put(officer_update_status))
        // Officers
        .route("/officers/leaderboard", get(leaderboard))
        .route("/officers/profile", get(officer_profile))
        // Citizens
        .route("/citizens/off-profile/:id", get(public_officer_profile))
        .route("/citizens/notifications", get(notifications))
        .route("/citizen/notifications", get(notifications))
        .route("/citizens/bill/create_order", post(create_order))
        .route("/citizens/bill/verify", post(verify_payment))
        .route("/citizens/bill/:bill_number", get(get_bill))
}
