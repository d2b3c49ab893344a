//! Client route table and guard
//!
//! Every page declares a [`Requirement`]. The guard maps the shared
//! [`authorize`](crate::auth::authorize) decision onto redirects: no usable
//! credential goes to `/login`, a role mismatch goes to the neutral `/` page.

use crate::auth::{Access, Requirement};
use crate::domain::ComplaintId;

use super::session::SessionContext;

/// Pages of the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    OfficerLogin,
    SelectRole,
    ComplaintDetail(ComplaintId),
    OfficerPublic(String),
    FileComplaint,
    MyComplaints,
    PayBill,
    Notifications,
    CitizenProfile,
    Dashboard,
    Leaderboard,
    OfficerDashboard,
    OfficerComplaints,
    OfficerProfile,
}

impl Route {
    /// Parse a path such as `/complaint/12`. Unknown paths yield `None`.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["officer-login"] => Route::OfficerLogin,
            ["select-role"] => Route::SelectRole,
            ["complaint", id] => Route::ComplaintDetail(ComplaintId(id.parse().ok()?)),
            ["officer", id] => Route::OfficerPublic((*id).to_string()),
            ["complaint"] => Route::FileComplaint,
            ["my-complaints"] => Route::MyComplaints,
            ["pay-bill"] => Route::PayBill,
            ["notifications"] => Route::Notifications,
            ["citizen-profile"] => Route::CitizenProfile,
            ["dashboard"] => Route::Dashboard,
            ["leaderboard"] => Route::Leaderboard,
            ["officer-dashboard"] => Route::OfficerDashboard,
            ["officer-complaints"] => Route::OfficerComplaints,
            ["officer-profile"] => Route::OfficerProfile,
            _ => return None,
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::OfficerLogin => "/officer-login".to_string(),
            Route::SelectRole => "/select-role".to_string(),
            Route::ComplaintDetail(id) => format!("/complaint/{id}"),
            Route::OfficerPublic(id) => format!("/officer/{id}"),
            Route::FileComplaint => "/complaint".to_string(),
            Route::MyComplaints => "/my-complaints".to_string(),
            Route::PayBill => "/pay-bill".to_string(),
            Route::Notifications => "/notifications".to_string(),
            Route::CitizenProfile => "/citizen-profile".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Leaderboard => "/leaderboard".to_string(),
            Route::OfficerDashboard => "/officer-dashboard".to_string(),
            Route::OfficerComplaints => "/officer-complaints".to_string(),
            Route::OfficerProfile => "/officer-profile".to_string(),
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Route::Home
            | Route::Login
            | Route::Register
            | Route::OfficerLogin
            | Route::SelectRole
            | Route::ComplaintDetail(_)
            | Route::OfficerPublic(_) => Requirement::Public,
            Route::FileComplaint
            | Route::MyComplaints
            | Route::PayBill
            | Route::Notifications
            | Route::CitizenProfile => Requirement::CITIZEN,
            Route::Dashboard | Route::Leaderboard => Requirement::CITIZEN_OR_OFFICER,
            Route::OfficerDashboard | Route::OfficerComplaints | Route::OfficerProfile => {
                Requirement::OFFICER
            }
        }
    }
}

/// What the guard tells the router to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Render(Route),
    Redirect(Route),
}

/// Gate `route` for the current session.
pub fn guard(route: Route, session: &SessionContext) -> GuardOutcome {
    match session.access(route.requirement()) {
        Access::Allowed => GuardOutcome::Render(route),
        Access::Unauthenticated => GuardOutcome::Redirect(Route::Login),
        Access::Forbidden => GuardOutcome::Redirect(Route::Home),
    }
}

/// Gate a raw path; unknown paths land on the neutral page.
pub fn guard_path(path: &str, session: &SessionContext) -> GuardOutcome {
    match Route::parse(path) {
        Some(route) => guard(route, session),
        None => GuardOutcome::Redirect(Route::Home),
    }
}
