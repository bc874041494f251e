//! Role-based authorization.
//!
//! Elevated access is carried by the `role` column on `professors`. The old
//! email allowlist survives only as the seeding rule applied at startup.

use crate::web::auth::Professor;

/// Emails promoted to the admin role when first seen. Placeholder for a real
/// invitation flow.
pub const ADMIN_EMAIL_ALLOWLIST: &[&str] = &["admin1@admin1.com", "admin@university.edu"];

pub const ROLE_PROFESSOR: &str = "professor";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    Professor,
    Admin,
}

impl Role {
    pub fn from_str(value: &str) -> Self {
        match value {
            ROLE_ADMIN => Role::Admin,
            _ => Role::Professor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Professor => ROLE_PROFESSOR,
            Role::Admin => ROLE_ADMIN,
        }
    }
}

/// Actions gated by the capability check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    ManageProfessors,
    /// Create and maintain one's own resources.
    ManageResources,
    /// Administer any resource regardless of owner.
    ModerateResources,
    ManageSessions,
}

/// Exact-match membership in the seeded admin allowlist.
pub fn is_admin_email(email: &str) -> bool {
    ADMIN_EMAIL_ALLOWLIST.contains(&email)
}

/// Capability check applied by handlers after session resolution.
pub fn can(professor: &Professor, action: Action) -> bool {
    match Role::from_str(&professor.role) {
        Role::Admin => true,
        Role::Professor => matches!(action, Action::ManageResources),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn professor_with_role(role: &str) -> Professor {
        Professor {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            department: None,
            role: role.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn allowlist_matches_exactly() {
        assert!(is_admin_email("admin1@admin1.com"));
        assert!(is_admin_email("admin@university.edu"));
        assert!(!is_admin_email("random@x.com"));
        assert!(!is_admin_email("Admin1@admin1.com"));
    }

    #[test]
    fn admins_can_do_everything() {
        let admin = professor_with_role(ROLE_ADMIN);
        assert!(can(&admin, Action::ManageProfessors));
        assert!(can(&admin, Action::ManageResources));
        assert!(can(&admin, Action::ModerateResources));
        assert!(can(&admin, Action::ManageSessions));
    }

    #[test]
    fn professors_only_manage_their_own_resources() {
        let prof = professor_with_role(ROLE_PROFESSOR);
        assert!(can(&prof, Action::ManageResources));
        assert!(!can(&prof, Action::ManageProfessors));
        assert!(!can(&prof, Action::ModerateResources));
        assert!(!can(&prof, Action::ManageSessions));
    }

    #[test]
    fn unknown_role_falls_back_to_professor() {
        assert_eq!(Role::from_str("superuser"), Role::Professor);
    }
}
