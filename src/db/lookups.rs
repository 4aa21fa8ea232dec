//! Row lookups shared by the authorization gate, the integrity guard and the
//! route handlers. Every function takes any SQLite executor so it can run on
//! the pool or inside an open transaction.

use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::assignment::{Assignment, ASSIGNMENT_COLUMNS};
use crate::models::grade::{Grade, GRADE_COLUMNS};
use crate::models::role::DbRole;
use crate::models::subject::{Subject, SUBJECT_COLUMNS};
use crate::models::user::{DbUser, USER_COLUMNS, USER_FROM};

pub async fn find_user<'e, E>(executor: E, user_id: Uuid) -> AppResult<Option<DbUser>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} {USER_FROM} WHERE u.id = ?");
    let user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

pub async fn fetch_user<'e, E>(executor: E, user_id: Uuid) -> AppResult<DbUser>
where
    E: SqliteExecutor<'e>,
{
    find_user(executor, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn find_user_by_username<'e, E>(executor: E, username: &str) -> AppResult<Option<DbUser>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} {USER_FROM} WHERE u.username = ?");
    let user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(username)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

pub async fn find_role<'e, E>(executor: E, role_id: Uuid) -> AppResult<Option<DbRole>>
where
    E: SqliteExecutor<'e>,
{
    let role = sqlx::query_as::<_, DbRole>(
        "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = ?",
    )
    .bind(role_id)
    .fetch_optional(executor)
    .await?;
    Ok(role)
}

pub async fn fetch_subject<'e, E>(executor: E, subject_id: Uuid) -> AppResult<Subject>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?");
    sqlx::query_as::<_, Subject>(&sql)
        .bind(subject_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("subject not found"))
}

pub async fn fetch_assignment<'e, E>(executor: E, assignment_id: Uuid) -> AppResult<Assignment>
where
    E: SqliteExecutor<'e>,
{
    find_assignment(executor, assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("assignment not found"))
}

pub async fn find_assignment<'e, E>(executor: E, assignment_id: Uuid) -> AppResult<Option<Assignment>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?");
    let assignment = sqlx::query_as::<_, Assignment>(&sql)
        .bind(assignment_id)
        .fetch_optional(executor)
        .await?;
    Ok(assignment)
}

pub async fn fetch_grade<'e, E>(executor: E, grade_id: Uuid) -> AppResult<Grade>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?");
    sqlx::query_as::<_, Grade>(&sql)
        .bind(grade_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("grade not found"))
}

/// Owner of the subject an assignment belongs to.
///
/// Outer `None`: no such assignment (or subject). Inner `None`: the subject
/// has no teacher assigned.
pub async fn assignment_subject_owner<'e, E>(executor: E, assignment_id: Uuid) -> AppResult<Option<Option<Uuid>>>
where
    E: SqliteExecutor<'e>,
{
    let owner: Option<(Option<Uuid>,)> = sqlx::query_as(
        "SELECT s.teacher_id FROM assignments a INNER JOIN subjects s ON s.id = a.subject_id WHERE a.id = ?",
    )
    .bind(assignment_id)
    .fetch_optional(executor)
    .await?;
    Ok(owner.map(|(teacher_id,)| teacher_id))
}

pub async fn subject_owner<'e, E>(executor: E, subject_id: Uuid) -> AppResult<Option<Option<Uuid>>>
where
    E: SqliteExecutor<'e>,
{
    let owner: Option<(Option<Uuid>,)> = sqlx::query_as("SELECT teacher_id FROM subjects WHERE id = ?")
        .bind(subject_id)
        .fetch_optional(executor)
        .await?;
    Ok(owner.map(|(teacher_id,)| teacher_id))
}

pub async fn is_enrolled<'e, E>(executor: E, student_id: Uuid, subject_id: Uuid) -> AppResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = ? AND subject_id = ?)",
    )
    .bind(student_id)
    .bind(subject_id)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}
