//! Integrity guard.
//!
//! Destructive operations check for dependent rows and either refuse
//! (`Blocked`) or cascade children-before-parent. Every check-then-act
//! sequence runs inside a single transaction. The guard also keeps at least
//! one administrator in the system.

mod deletion;

pub use deletion::{delete_assignment, delete_grade, delete_subject, delete_user};

use serde::Serialize;
use sqlx::SqliteConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::roles::{normalize_role, CanonicalRole};
use crate::authz::Principal;
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::models::role::DbRole;
use crate::models::user::DbUser;

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Dependent row counts per entity kind. Zero counts are omitted when
/// serialized, so the keys present are exactly the kinds that block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DependentReferences {
    #[serde(skip_serializing_if = "is_zero")]
    pub enrollments: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub grades: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub assignments: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub subjects: i64,
}

impl DependentReferences {
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        [
            ("enrollments", self.enrollments),
            ("grades", self.grades),
            ("assignments", self.assignments),
            ("subjects", self.subjects),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(kind, _)| kind)
        .collect()
    }
}

/// Ids removed by a delete, children first.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct RemovedRecords {
    pub enrollments: Vec<Uuid>,
    pub grades: Vec<Uuid>,
    pub assignments: Vec<Uuid>,
    pub subjects: Vec<Uuid>,
}

impl RemovedRecords {
    pub fn counts(&self) -> DependentReferences {
        DependentReferences {
            enrollments: self.enrollments.len() as i64,
            grades: self.grades.len() as i64,
            assignments: self.assignments.len() as i64,
            subjects: self.subjects.len() as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletionSummary {
    #[schema(example = "user")]
    pub entity: String,
    pub id: Uuid,
    pub removed: RemovedRecords,
    pub counts: DependentReferences,
}

impl DeletionSummary {
    fn new(entity: &str, id: Uuid, removed: RemovedRecords) -> Self {
        let counts = removed.counts();
        Self {
            entity: entity.to_string(),
            id,
            removed,
            counts,
        }
    }
}

/// A role to store on a user row, resolved from a role id or a role label.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub role_id: Option<Uuid>,
    pub role_name: String,
    pub canonical: CanonicalRole,
}

/// Counts users whose canonical role is `admin`.
///
/// Fails closed: a lookup error aborts the calling operation instead of
/// assuming administrators exist.
pub async fn count_admins(conn: &mut SqliteConnection) -> AppResult<usize> {
    let labels: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT r.name, u.role_name FROM users u LEFT JOIN roles r ON r.id = u.role_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let admins = labels
        .iter()
        .map(|(role_label, role_name)| normalize_role(role_label.as_deref().or(role_name.as_deref())))
        .filter(CanonicalRole::is_admin)
        .count();

    Ok(admins)
}

/// Resolves the role a create/update request asks for.
///
/// `role_id` takes precedence over `role_name`. Labels are matched to a row
/// of the role table by canonical role so that the stored `role_id` never
/// contradicts the label.
pub async fn resolve_role_assignment(
    conn: &mut SqliteConnection,
    role_id: Option<Uuid>,
    role_name: Option<&str>,
) -> AppResult<Option<RoleAssignment>> {
    if let Some(role_id) = role_id {
        let role = lookups::find_role(&mut *conn, role_id)
            .await?
            .ok_or_else(|| AppError::bad_request("unknown role_id"))?;
        let canonical = CanonicalRole::from_raw(&role.name);
        return Ok(Some(RoleAssignment {
            role_id: Some(role.id),
            role_name: role.name,
            canonical,
        }));
    }

    let Some(label) = role_name else {
        return Ok(None);
    };

    let canonical = normalize_role(Some(label));
    if let CanonicalRole::Other(_) = canonical {
        return Err(AppError::bad_request(format!("unknown role '{}'", label.trim())));
    }

    let roles = sqlx::query_as::<_, DbRole>("SELECT id, name, description, created_at, updated_at FROM roles")
        .fetch_all(&mut *conn)
        .await?;
    let matching = roles
        .into_iter()
        .find(|role| CanonicalRole::from_raw(&role.name) == canonical);

    Ok(Some(RoleAssignment {
        role_id: matching.map(|role| role.id),
        role_name: label.trim().to_string(),
        canonical,
    }))
}

/// Only administrators hand out the administrator role.
pub fn ensure_can_assign(principal: &Principal, role: &CanonicalRole) -> AppResult<()> {
    if role.is_admin() && !principal.role.is_admin() {
        tracing::info!(user_id = %principal.id, "non-admin attempted to assign the admin role");
        return Err(AppError::forbidden("only administrators may assign the administrator role"));
    }
    Ok(())
}

/// Only administrators modify or remove administrator accounts.
pub fn ensure_can_manage(principal: &Principal, target: &DbUser) -> AppResult<()> {
    if target.canonical_role().is_admin() && !principal.role.is_admin() {
        return Err(AppError::forbidden("only administrators may manage administrator accounts"));
    }
    Ok(())
}

/// Guards a role change away from `admin`: the last administrator cannot be
/// demoted, and an administrator cannot demote themselves.
pub async fn ensure_role_change_allowed(
    conn: &mut SqliteConnection,
    principal: &Principal,
    target: &DbUser,
    prospective: &CanonicalRole,
) -> AppResult<()> {
    ensure_can_assign(principal, prospective)?;
    ensure_can_manage(principal, target)?;

    if !target.canonical_role().is_admin() || prospective.is_admin() {
        return Ok(());
    }

    let admins = count_admins(conn).await?;
    if admins <= 1 {
        tracing::info!(target_id = %target.id, "refused demotion of the last administrator");
        return Err(AppError::conflict("cannot remove the last administrator"));
    }

    if principal.is_self(target.id) {
        tracing::info!(user_id = %principal.id, "refused administrator self-demotion");
        return Err(AppError::forbidden("administrators may not remove their own administrator role"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_list_only_blocking_kinds() {
        let refs = DependentReferences {
            enrollments: 2,
            subjects: 1,
            ..Default::default()
        };

        assert_eq!(refs.kinds(), vec!["enrollments", "subjects"]);
        assert!(!refs.is_empty());
        assert!(DependentReferences::default().is_empty());

        let json = serde_json::to_value(&refs).unwrap();
        assert_eq!(json, serde_json::json!({"enrollments": 2, "subjects": 1}));
    }

    #[test]
    fn non_admin_cannot_assign_admin() {
        let director = Principal::new(Uuid::new_v4(), "dir", Some("Director"));
        let admin = Principal::new(Uuid::new_v4(), "root", Some("Administrador"));

        let err = ensure_can_assign(&director, &CanonicalRole::Admin).unwrap_err();
        assert!(err.to_string().starts_with("No autorizado"));
        assert!(ensure_can_assign(&director, &CanonicalRole::Teacher).is_ok());
        assert!(ensure_can_assign(&admin, &CanonicalRole::Admin).is_ok());
    }
}
