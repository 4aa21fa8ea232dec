use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::Filters;
use crate::app::AppState;
use crate::authz::{ownership, policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::grading::{self, is_approved};
use crate::integrity;
use crate::models::grade::{
    validate_score, validate_score_within, FinalGradeQuery, FinalGradeResponse, Grade, GradeCreateRequest, GradeQuery,
    GradeUpdateRequest, GRADE_COLUMNS,
};
use crate::utils::utc_now;

const IN_SUBJECT: &str = "subject_id = ? OR assignment_id IN (SELECT id FROM assignments WHERE subject_id = ?)";
const IN_OWNED_SUBJECTS: &str = "subject_id IN (SELECT id FROM subjects WHERE teacher_id = ?) \
     OR assignment_id IN (SELECT a.id FROM assignments a INNER JOIN subjects s ON s.id = a.subject_id WHERE s.teacher_id = ?)";

#[utoipa::path(
    get,
    path = "/grades",
    tag = "Grades",
    params(
        ("student_id" = Option<Uuid>, Query, description = "Only grades of this student"),
        ("subject_id" = Option<Uuid>, Query, description = "Only grades in this subject")
    ),
    responses(
        (status = 200, description = "Grades visible to the caller", body = [Grade]),
        (status = 403, description = "Subject not owned, or another student's grades")
    )
)]
pub async fn list_grades(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<GradeQuery>,
) -> AppResult<Json<Vec<Grade>>> {
    principal.authorize(policy::GRADE_VIEW)?;

    let mut filters = Filters::default();

    if principal.role.is_student() {
        if query.student_id.is_some_and(|id| !principal.is_self(id)) {
            return Err(AppError::forbidden("students may only list their own grades"));
        }
        filters.push("student_id = ?", &[principal.id]);
    } else if let Some(student_id) = query.student_id {
        filters.push("student_id = ?", &[student_id]);
    }

    match query.subject_id {
        Some(subject_id) => {
            let mut conn = state.pool.acquire().await?;
            ownership::ensure_subject_owner(&mut conn, &principal, subject_id).await?;
            filters.push(IN_SUBJECT, &[subject_id, subject_id]);
        }
        None if principal.role.is_teacher() => {
            filters.push(IN_OWNED_SUBJECTS, &[principal.id, principal.id]);
        }
        None => {}
    }

    let select = format!("SELECT {GRADE_COLUMNS} FROM grades");
    let grades = filters.fetch_all::<Grade>(&state.pool, &select, "created_at").await?;
    Ok(Json(grades))
}

#[utoipa::path(
    post,
    path = "/grades",
    tag = "Grades",
    request_body = GradeCreateRequest,
    responses(
        (status = 201, description = "Grade recorded", body = Grade),
        (status = 400, description = "Score out of range, above max_score, or student not enrolled"),
        (status = 403, description = "Subject not owned"),
        (status = 409, description = "Student already graded for this assignment")
    )
)]
pub async fn create_grade(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<GradeCreateRequest>,
) -> AppResult<(StatusCode, Json<Grade>)> {
    principal.authorize(policy::GRADE_MANAGE)?;
    validate_score(payload.score)?;

    let mut tx = state.pool.begin().await?;
    let assignment = ownership::ensure_assignment_owner(&mut tx, &principal, payload.assignment_id).await?;
    validate_score_within(payload.score, assignment.max_score)?;

    if !lookups::is_enrolled(&mut *tx, payload.student_id, assignment.subject_id).await? {
        return Err(AppError::bad_request("student is not enrolled in the assignment's subject"));
    }

    let now = utc_now();
    let grade_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO grades (id, student_id, assignment_id, subject_id, score, feedback, graded_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(grade_id)
    .bind(payload.student_id)
    .bind(assignment.id)
    .bind(assignment.subject_id)
    .bind(payload.score)
    .bind(&payload.feedback)
    .bind(principal.id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::unique_violation(err, "student already graded for this assignment"))?;

    let grade = lookups::fetch_grade(&mut *tx, grade_id).await?;
    tx.commit().await?;

    tracing::info!(grade_id = %grade_id, student_id = %grade.student_id, graded_by = %principal.id, "grade recorded");
    Ok((StatusCode::CREATED, Json(grade)))
}

#[utoipa::path(
    put,
    path = "/grades/{id}",
    tag = "Grades",
    params(("id" = Uuid, Path, description = "Grade id")),
    request_body = GradeUpdateRequest,
    responses(
        (status = 200, description = "Grade updated", body = Grade),
        (status = 400, description = "Score out of range or above the assignment's max_score"),
        (status = 403, description = "Subject not owned")
    )
)]
pub async fn update_grade(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradeUpdateRequest>,
) -> AppResult<Json<Grade>> {
    principal.authorize(policy::GRADE_MANAGE)?;
    if let Some(score) = payload.score {
        validate_score(score)?;
    }

    let mut tx = state.pool.begin().await?;
    let mut grade = ownership::ensure_grade_owner(&mut tx, &principal, id).await?;

    if let Some(score) = payload.score {
        if let Some(assignment) = lookups::find_assignment(&mut *tx, grade.assignment_id).await? {
            validate_score_within(score, assignment.max_score)?;
        }
        grade.score = score;
    }
    if payload.feedback.is_some() {
        grade.feedback = payload.feedback.clone();
    }
    grade.graded_by = Some(principal.id);
    grade.updated_at = utc_now();

    sqlx::query("UPDATE grades SET score = ?, feedback = ?, graded_by = ?, updated_at = ? WHERE id = ?")
        .bind(grade.score)
        .bind(&grade.feedback)
        .bind(grade.graded_by)
        .bind(grade.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(grade))
}

#[utoipa::path(
    delete,
    path = "/grades/{id}",
    tag = "Grades",
    params(("id" = Uuid, Path, description = "Grade id")),
    responses(
        (status = 204, description = "Grade deleted"),
        (status = 403, description = "Subject not owned"),
        (status = 404, description = "Grade not found")
    )
)]
pub async fn delete_grade(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    principal.authorize(policy::GRADE_MANAGE)?;

    integrity::delete_grade(&state.pool, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/grades/final",
    tag = "Grades",
    params(
        ("student_id" = Uuid, Query, description = "Student id"),
        ("subject_id" = Uuid, Query, description = "Subject id")
    ),
    responses(
        (status = 200, description = "Weighted final grade on the 0-5 scale", body = FinalGradeResponse),
        (status = 403, description = "Another student's grade, or subject not owned")
    )
)]
pub async fn final_grade(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<FinalGradeQuery>,
) -> AppResult<Json<FinalGradeResponse>> {
    principal.authorize(policy::GRADE_VIEW)?;

    if principal.role.is_student() && !principal.is_self(query.student_id) {
        return Err(AppError::forbidden("students may only view their own final grade"));
    }

    {
        let mut conn = state.pool.acquire().await?;
        ownership::ensure_subject_owner(&mut conn, &principal, query.subject_id).await?;
    }

    let final_grade = grading::final_grade_for(&state.pool, query.student_id, query.subject_id).await?;

    Ok(Json(FinalGradeResponse {
        student_id: query.student_id,
        subject_id: query.subject_id,
        final_grade,
        approved: final_grade.map(is_approved),
    }))
}
