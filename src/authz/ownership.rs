//! Teacher ownership checks.
//!
//! Teachers only reach subject-scoped data of subjects whose `teacher_id` is
//! their own id, directly or through `assignment -> subject` and
//! `grade -> assignment -> subject`. Other roles pass through; their access is
//! decided by the route's allow-list.

use sqlx::SqliteConnection;
use uuid::Uuid;

use super::Principal;
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::models::assignment::Assignment;
use crate::models::grade::Grade;
use crate::models::subject::Subject;

fn not_owner(principal: &Principal, what: &str) -> AppError {
    tracing::debug!(user_id = %principal.id, resource = what, "ownership check failed");
    AppError::forbidden(format!("you do not own this {what}"))
}

fn owned_by(principal: &Principal, teacher_id: Option<Uuid>) -> bool {
    teacher_id == Some(principal.id)
}

pub async fn ensure_subject_owner(
    conn: &mut SqliteConnection,
    principal: &Principal,
    subject_id: Uuid,
) -> AppResult<Subject> {
    let subject = lookups::fetch_subject(&mut *conn, subject_id).await?;

    if principal.role.is_teacher() && !owned_by(principal, subject.teacher_id) {
        return Err(not_owner(principal, "subject"));
    }

    Ok(subject)
}

pub async fn ensure_assignment_owner(
    conn: &mut SqliteConnection,
    principal: &Principal,
    assignment_id: Uuid,
) -> AppResult<Assignment> {
    let assignment = lookups::fetch_assignment(&mut *conn, assignment_id).await?;

    if principal.role.is_teacher() {
        let owner = lookups::subject_owner(&mut *conn, assignment.subject_id).await?.flatten();
        if !owned_by(principal, owner) {
            return Err(not_owner(principal, "assignment"));
        }
    }

    Ok(assignment)
}

/// Resolves the grade's subject through its assignment, falling back to the
/// grade's own `subject_id` when the assignment row cannot be found.
pub async fn ensure_grade_owner(
    conn: &mut SqliteConnection,
    principal: &Principal,
    grade_id: Uuid,
) -> AppResult<Grade> {
    let grade = lookups::fetch_grade(&mut *conn, grade_id).await?;

    if principal.role.is_teacher() {
        let owner = match lookups::assignment_subject_owner(&mut *conn, grade.assignment_id).await? {
            Some(owner) => owner,
            None => match grade.subject_id {
                Some(subject_id) => lookups::subject_owner(&mut *conn, subject_id).await?.flatten(),
                None => None,
            },
        };

        if !owned_by(principal, owner) {
            return Err(not_owner(principal, "grade"));
        }
    }

    Ok(grade)
}
