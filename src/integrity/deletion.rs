use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{count_admins, ensure_can_manage, DeletionSummary, DependentReferences, RemovedRecords};
use crate::authz::ownership;
use crate::authz::Principal;
use crate::db::lookups;
use crate::errors::{AppError, AppResult};

const OWNED_SUBJECTS: &str = "SELECT id FROM subjects WHERE teacher_id = ?";

/// Row filters tying each dependent table to a user. Each `?` binds the user id.
struct UserFilters {
    enrollments: String,
    grades: String,
    assignments: String,
    subjects: &'static str,
}

impl UserFilters {
    fn new() -> Self {
        Self {
            enrollments: format!("student_id = ? OR subject_id IN ({OWNED_SUBJECTS})"),
            grades: format!(
                "student_id = ? OR graded_by = ? OR subject_id IN ({OWNED_SUBJECTS}) \
                 OR assignment_id IN (SELECT id FROM assignments WHERE subject_id IN ({OWNED_SUBJECTS}))"
            ),
            assignments: format!("subject_id IN ({OWNED_SUBJECTS})"),
            subjects: "teacher_id = ?",
        }
    }
}

async fn count_rows(conn: &mut SqliteConnection, table: &str, filter: &str, id: Uuid) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(1) FROM {table} WHERE {filter}");
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for _ in 0..filter.matches('?').count() {
        query = query.bind(id);
    }
    Ok(query.fetch_one(&mut *conn).await?)
}

/// Deletes the rows matching `filter` and returns their ids.
async fn take_rows(conn: &mut SqliteConnection, table: &str, filter: &str, id: Uuid) -> AppResult<Vec<Uuid>> {
    let placeholders = filter.matches('?').count();

    let select = format!("SELECT id FROM {table} WHERE {filter}");
    let mut query = sqlx::query_scalar::<_, Uuid>(&select);
    for _ in 0..placeholders {
        query = query.bind(id);
    }
    let ids = query.fetch_all(&mut *conn).await?;

    if ids.is_empty() {
        return Ok(ids);
    }

    let delete = format!("DELETE FROM {table} WHERE {filter}");
    let mut statement = sqlx::query(&delete);
    for _ in 0..placeholders {
        statement = statement.bind(id);
    }
    statement.execute(&mut *conn).await?;

    Ok(ids)
}

/// Deletes a subject together with its assignments and grades.
///
/// Enrolled students always block the delete; enrollments are never removed
/// implicitly.
pub async fn delete_subject(pool: &SqlitePool, principal: &Principal, subject_id: Uuid) -> AppResult<DeletionSummary> {
    let mut tx = pool.begin().await?;
    lookups::fetch_subject(&mut *tx, subject_id).await?;

    let enrolled = count_rows(&mut tx, "enrollments", "subject_id = ?", subject_id).await?;
    if enrolled > 0 {
        tracing::info!(subject_id = %subject_id, enrolled, "subject delete blocked by enrollments");
        return Err(AppError::blocked(
            "subject has enrolled students",
            DependentReferences {
                enrollments: enrolled,
                ..Default::default()
            },
        ));
    }

    let removed = RemovedRecords {
        grades: take_rows(
            &mut tx,
            "grades",
            "subject_id = ? OR assignment_id IN (SELECT id FROM assignments WHERE subject_id = ?)",
            subject_id,
        )
        .await?,
        assignments: take_rows(&mut tx, "assignments", "subject_id = ?", subject_id).await?,
        ..Default::default()
    };

    sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(subject_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        subject_id = %subject_id,
        deleted_by = %principal.id,
        grades = removed.grades.len(),
        assignments = removed.assignments.len(),
        "subject deleted"
    );
    Ok(DeletionSummary::new("subject", subject_id, removed))
}

/// Deletes an assignment that has no recorded grades.
pub async fn delete_assignment(pool: &SqlitePool, principal: &Principal, assignment_id: Uuid) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    lookups::fetch_assignment(&mut *tx, assignment_id).await?;

    let graded = count_rows(&mut tx, "grades", "assignment_id = ?", assignment_id).await?;
    if graded > 0 {
        tracing::info!(assignment_id = %assignment_id, graded, "assignment delete blocked by grades");
        return Err(AppError::blocked(
            "assignment has recorded grades",
            DependentReferences {
                grades: graded,
                ..Default::default()
            },
        ));
    }

    ownership::ensure_assignment_owner(&mut tx, principal, assignment_id).await?;

    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(assignment_id = %assignment_id, deleted_by = %principal.id, "assignment deleted");
    Ok(())
}

pub async fn delete_grade(pool: &SqlitePool, principal: &Principal, grade_id: Uuid) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    ownership::ensure_grade_owner(&mut tx, principal, grade_id).await?;

    sqlx::query("DELETE FROM grades WHERE id = ?")
        .bind(grade_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(grade_id = %grade_id, deleted_by = %principal.id, "grade deleted");
    Ok(())
}

/// Deletes a user.
///
/// Without `force`, any enrollment, grade, assignment or subject tied to the
/// user blocks the delete. With `force` (administrators only) those rows are
/// removed first, in the order enrollments, grades, assignments, subjects.
pub async fn delete_user(
    pool: &SqlitePool,
    principal: &Principal,
    user_id: Uuid,
    force: bool,
) -> AppResult<DeletionSummary> {
    if force && !principal.role.is_admin() {
        return Err(AppError::forbidden("only administrators may force-delete users"));
    }

    let mut tx = pool.begin().await?;
    let target = lookups::fetch_user(&mut *tx, user_id).await?;

    if target.canonical_role().is_admin() {
        ensure_can_manage(principal, &target)?;
        let admins = count_admins(&mut tx).await?;
        if admins <= 1 {
            tracing::info!(target_id = %user_id, "refused delete of the last administrator");
            return Err(AppError::conflict("cannot remove the last administrator"));
        }
    }

    if principal.is_self(user_id) {
        return Err(AppError::conflict("cannot delete your own account"));
    }

    let filters = UserFilters::new();
    let references = DependentReferences {
        enrollments: count_rows(&mut tx, "enrollments", &filters.enrollments, user_id).await?,
        grades: count_rows(&mut tx, "grades", &filters.grades, user_id).await?,
        assignments: count_rows(&mut tx, "assignments", &filters.assignments, user_id).await?,
        subjects: count_rows(&mut tx, "subjects", filters.subjects, user_id).await?,
    };

    if !references.is_empty() && !force {
        tracing::info!(target_id = %user_id, kinds = ?references.kinds(), "user delete blocked by dependents");
        return Err(AppError::blocked("user has dependent records", references));
    }

    let mut removed = RemovedRecords::default();
    if !references.is_empty() {
        removed.enrollments = take_rows(&mut tx, "enrollments", &filters.enrollments, user_id).await?;
        removed.grades = take_rows(&mut tx, "grades", &filters.grades, user_id).await?;
        removed.assignments = take_rows(&mut tx, "assignments", &filters.assignments, user_id).await?;
        removed.subjects = take_rows(&mut tx, "subjects", filters.subjects, user_id).await?;
    }

    sqlx::query("DELETE FROM access_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let summary = DeletionSummary::new("user", user_id, removed);
    if force {
        tracing::warn!(
            target_id = %user_id,
            target_username = %target.username,
            deleted_by = %principal.id,
            enrollments = summary.counts.enrollments,
            grades = summary.counts.grades,
            assignments = summary.counts.assignments,
            subjects = summary.counts.subjects,
            removed = ?summary.removed,
            "user force-deleted with dependents"
        );
    } else {
        tracing::info!(target_id = %user_id, deleted_by = %principal.id, "user deleted");
    }

    Ok(summary)
}
