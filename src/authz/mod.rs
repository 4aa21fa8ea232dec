//! Authorization gate.
//!
//! - [`roles`]: role normalization, the single point of role comparison
//! - [`Principal`]: the authenticated caller, extracted from a bearer header
//!   or the session cookie, with an opaque access-token fallback
//! - [`policy`]: per-operation role allow-lists
//! - [`ownership`]: teacher ownership checks on subject-scoped resources

pub mod ownership;
mod principal;
pub mod provider;
pub mod roles;

pub use principal::{bearer_token, cookie_token, resolve_principal, Principal};
pub use provider::{AccessTokenProvider, IdentityProvider, ResolvedIdentity};
pub use roles::{normalize_role, CanonicalRole};

/// Role allow-lists, expressed as canonical role keys.
///
/// An empty list admits any authenticated caller.
pub mod policy {
    use super::roles::{ADMIN, DIRECTOR, STUDENT, TEACHER};

    pub const ANY_AUTHENTICATED: &[&str] = &[];
    pub const STAFF: &[&str] = &[ADMIN, DIRECTOR];
    pub const ADMIN_ONLY: &[&str] = &[ADMIN];
    pub const ACADEMIC_STAFF: &[&str] = &[ADMIN, DIRECTOR, TEACHER];
    pub const ALL_ROLES: &[&str] = &[ADMIN, DIRECTOR, TEACHER, STUDENT];

    // Users and roles
    pub const USER_VIEW: &[&str] = STAFF;
    pub const USER_MANAGE: &[&str] = STAFF;
    pub const ROLE_VIEW: &[&str] = STAFF;
    pub const FORCE_DELETE: &[&str] = ADMIN_ONLY;

    // Subjects and enrollments
    pub const SUBJECT_VIEW: &[&str] = ALL_ROLES;
    pub const SUBJECT_MANAGE: &[&str] = STAFF;
    pub const ENROLLMENT_VIEW: &[&str] = ALL_ROLES;
    pub const ENROLLMENT_MANAGE: &[&str] = STAFF;

    // Assignments and grades
    pub const ASSIGNMENT_VIEW: &[&str] = ALL_ROLES;
    pub const ASSIGNMENT_MANAGE: &[&str] = ACADEMIC_STAFF;
    pub const GRADE_VIEW: &[&str] = ALL_ROLES;
    pub const GRADE_MANAGE: &[&str] = ACADEMIC_STAFF;
}
