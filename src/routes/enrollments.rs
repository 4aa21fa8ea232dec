use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::Filters;
use crate::app::AppState;
use crate::authz::{ownership, policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::models::enrollment::{Enrollment, EnrollmentCreateRequest, EnrollmentQuery};
use crate::utils::utc_now;

const ENROLLMENT_SELECT: &str = "SELECT id, student_id, subject_id, created_at FROM enrollments";

#[utoipa::path(
    get,
    path = "/enrollments",
    tag = "Enrollments",
    params(
        ("subject_id" = Option<Uuid>, Query, description = "Only enrollments in this subject"),
        ("student_id" = Option<Uuid>, Query, description = "Only enrollments of this student")
    ),
    responses(
        (status = 200, description = "Enrollments visible to the caller", body = [Enrollment]),
        (status = 403, description = "Subject not owned, or another student's enrollments")
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<EnrollmentQuery>,
) -> AppResult<Json<Vec<Enrollment>>> {
    principal.authorize(policy::ENROLLMENT_VIEW)?;

    let mut filters = Filters::default();

    if principal.role.is_student() {
        if query.student_id.is_some_and(|id| !principal.is_self(id)) {
            return Err(AppError::forbidden("students may only list their own enrollments"));
        }
        filters.push("student_id = ?", &[principal.id]);
    } else if let Some(student_id) = query.student_id {
        filters.push("student_id = ?", &[student_id]);
    }

    match query.subject_id {
        Some(subject_id) => {
            let mut conn = state.pool.acquire().await?;
            ownership::ensure_subject_owner(&mut conn, &principal, subject_id).await?;
            filters.push("subject_id = ?", &[subject_id]);
        }
        None if principal.role.is_teacher() => {
            filters.push("subject_id IN (SELECT id FROM subjects WHERE teacher_id = ?)", &[principal.id]);
        }
        None => {}
    }

    let enrollments = filters
        .fetch_all::<Enrollment>(&state.pool, ENROLLMENT_SELECT, "created_at")
        .await?;
    Ok(Json(enrollments))
}

#[utoipa::path(
    post,
    path = "/enrollments",
    tag = "Enrollments",
    request_body = EnrollmentCreateRequest,
    responses(
        (status = 201, description = "Student enrolled", body = Enrollment),
        (status = 400, description = "User is not a student"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<EnrollmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    principal.authorize(policy::ENROLLMENT_MANAGE)?;

    let mut conn = state.pool.acquire().await?;
    let student = lookups::fetch_user(&mut *conn, payload.student_id).await?;
    if !student.canonical_role().is_student() {
        return Err(AppError::bad_request("only students can be enrolled"));
    }
    lookups::fetch_subject(&mut *conn, payload.subject_id).await?;

    let enrollment = Enrollment {
        id: Uuid::new_v4(),
        student_id: payload.student_id,
        subject_id: payload.subject_id,
        created_at: utc_now(),
    };

    sqlx::query("INSERT INTO enrollments (id, student_id, subject_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.subject_id)
        .bind(enrollment.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|err| AppError::unique_violation(err, "student already enrolled in this subject"))?;

    tracing::info!(
        enrollment_id = %enrollment.id,
        student_id = %enrollment.student_id,
        subject_id = %enrollment.subject_id,
        "student enrolled"
    );
    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    responses(
        (status = 204, description = "Enrollment removed"),
        (status = 404, description = "Enrollment not found")
    )
)]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    principal.authorize(policy::ENROLLMENT_MANAGE)?;

    let affected = sqlx::query("DELETE FROM enrollments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("enrollment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
