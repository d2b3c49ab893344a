//! Role-based access decision
//!
//! One function decides access for both the HTTP handlers (401/403) and the
//! client route guard (redirects).

use crate::domain::Role;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// No usable credential.
    Unauthenticated,
    /// Authenticated with a role outside the required set.
    Forbidden,
}

/// Roles allowed to reach a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    AnyOf(&'static [Role]),
}

impl Requirement {
    pub const CITIZEN: Requirement = Requirement::AnyOf(&[Role::Citizen]);
    pub const OFFICER: Requirement = Requirement::AnyOf(&[Role::Officer]);
    pub const CITIZEN_OR_OFFICER: Requirement = Requirement::AnyOf(&[Role::Citizen, Role::Officer]);
}

/// Decide access for a caller whose role is `identity` (None when anonymous
/// or when the credential could not be read).
pub fn authorize(required: Requirement, identity: Option<Role>) -> Access {
    match (required, identity) {
        (Requirement::Public, _) => Access::Allowed,
        (_, None) => Access::Unauthenticated,
        (Requirement::Authenticated, Some(_)) => Access::Allowed,
        (Requirement::AnyOf(roles), Some(role)) if roles.contains(&role) => Access::Allowed,
        (Requirement::AnyOf(_), Some(_)) => Access::Forbidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions() {
        assert_eq!(authorize(Requirement::Public, None), Access::Allowed);
        assert_eq!(authorize(Requirement::CITIZEN, None), Access::Unauthenticated);
        assert_eq!(authorize(Requirement::Authenticated, None), Access::Unauthenticated);
        assert_eq!(
            authorize(Requirement::CITIZEN, Some(Role::Citizen)),
            Access::Allowed
        );
        assert_eq!(
            authorize(Requirement::CITIZEN, Some(Role::Officer)),
            Access::Forbidden
        );
        assert_eq!(
            authorize(Requirement::CITIZEN_OR_OFFICER, Some(Role::Officer)),
            Access::Allowed
        );
        assert_eq!(
            authorize(Requirement::Authenticated, Some(Role::Officer)),
            Access::Allowed
        );
    }
}
