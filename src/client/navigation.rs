//! Navigation bar entries per role.

use crate::domain::Role;

use super::guard::Route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub route: Route,
    /// Rendered as the primary call to action.
    pub highlighted: bool,
}

impl NavItem {
    fn link(label: &'static str, route: Route) -> Self {
        Self {
            label,
            route,
            highlighted: false,
        }
    }
}

/// Entries shown for a signed-in role. Anonymous visitors get none.
pub fn nav_items(role: Option<Role>) -> Vec<NavItem> {
    match role {
        None => Vec::new(),
        Some(Role::Citizen) => vec![
            NavItem::link("Dashboard", Route::Dashboard),
            NavItem::link("My Complaints", Route::MyComplaints),
            NavItem::link("Pay Bill", Route::PayBill),
            NavItem {
                label: "File Complaint",
                route: Route::FileComplaint,
                highlighted: true,
            },
            NavItem::link("Leaderboard", Route::Leaderboard),
        ],
        Some(Role::Officer) => vec![
            NavItem::link("Dashboard", Route::OfficerDashboard),
            NavItem::link("Assigned", Route::OfficerComplaints),
            NavItem::link("Profile", Route::OfficerProfile),
            NavItem::link("Leaderboard", Route::Leaderboard),
        ],
    }
}
