use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::subjects::ensure_subject_visible;
use crate::app::AppState;
use crate::authz::{ownership, policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::grading::GRADE_SCALE;
use crate::integrity;
use crate::models::assignment::{
    Assignment, AssignmentCreateRequest, AssignmentUpdateRequest, ASSIGNMENT_COLUMNS, MAX_SUBJECT_WEIGHT,
};
use crate::utils::{required_text, utc_now};

const DEFAULT_MAX_SCORE: f64 = 5.0;
const WEIGHT_EPSILON: f64 = 1e-9;

fn validate_weight(weight: f64) -> AppResult<()> {
    if !weight.is_finite() || !(0.0..=MAX_SUBJECT_WEIGHT).contains(&weight) {
        return Err(AppError::bad_request(format!("weight must be between 0 and {MAX_SUBJECT_WEIGHT}")));
    }
    Ok(())
}

fn validate_max_score(max_score: f64) -> AppResult<()> {
    if !max_score.is_finite() || max_score <= 0.0 || max_score > GRADE_SCALE {
        return Err(AppError::bad_request(format!("max_score must be greater than 0 and at most {GRADE_SCALE}")));
    }
    Ok(())
}

/// Rejects a `max_score` below a score already recorded for the assignment.
async fn ensure_max_score_covers_grades(
    conn: &mut SqliteConnection,
    assignment_id: Uuid,
    max_score: f64,
) -> AppResult<()> {
    let highest: Option<f64> = sqlx::query_scalar("SELECT MAX(score) FROM grades WHERE assignment_id = ?")
        .bind(assignment_id)
        .fetch_one(&mut *conn)
        .await?;

    if let Some(highest) = highest.filter(|highest| *highest > max_score) {
        return Err(AppError::bad_request(format!(
            "max_score {max_score} is below the highest recorded score of {highest}"
        )));
    }
    Ok(())
}

/// Rejects a weight that would push the subject's total past 100.
async fn ensure_weight_fits(
    conn: &mut SqliteConnection,
    subject_id: Uuid,
    weight: f64,
    excluding: Option<Uuid>,
) -> AppResult<()> {
    let allocated: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(weight), 0.0) FROM assignments WHERE subject_id = ? AND (? IS NULL OR id <> ?)",
    )
    .bind(subject_id)
    .bind(excluding)
    .bind(excluding)
    .fetch_one(&mut *conn)
    .await?;

    if allocated + weight > MAX_SUBJECT_WEIGHT + WEIGHT_EPSILON {
        let remaining = (MAX_SUBJECT_WEIGHT - allocated).max(0.0);
        return Err(AppError::bad_request(format!(
            "assignment weights of a subject may not exceed {MAX_SUBJECT_WEIGHT}; {remaining} remaining"
        )));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/subjects/{id}/assignments",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Assignments of the subject", body = [Assignment]),
        (status = 403, description = "Not owned or not enrolled")
    )
)]
pub async fn list_subject_assignments(
    State(state): State<AppState>,
    principal: Principal,
    Path(subject_id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    principal.authorize(policy::ASSIGNMENT_VIEW)?;

    let mut conn = state.pool.acquire().await?;
    ensure_subject_visible(&mut conn, &principal, subject_id).await?;

    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE subject_id = ? ORDER BY due_date, created_at");
    let assignments = sqlx::query_as::<_, Assignment>(&sql)
        .bind(subject_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Json(assignments))
}

#[utoipa::path(
    post,
    path = "/assignments",
    tag = "Assignments",
    request_body = AssignmentCreateRequest,
    responses(
        (status = 201, description = "Assignment created", body = Assignment),
        (status = 400, description = "Invalid weight or max_score"),
        (status = 403, description = "Subject not owned")
    )
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AssignmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    principal.authorize(policy::ASSIGNMENT_MANAGE)?;

    let title = required_text("title", &payload.title)?;
    let max_score = payload.max_score.unwrap_or(DEFAULT_MAX_SCORE);
    validate_weight(payload.weight)?;
    validate_max_score(max_score)?;

    let mut tx = state.pool.begin().await?;
    ownership::ensure_subject_owner(&mut tx, &principal, payload.subject_id).await?;
    ensure_weight_fits(&mut tx, payload.subject_id, payload.weight, None).await?;

    let now = utc_now();
    let assignment_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO assignments (id, subject_id, title, description, weight, max_score, due_date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(assignment_id)
    .bind(payload.subject_id)
    .bind(&title)
    .bind(&payload.description)
    .bind(payload.weight)
    .bind(max_score)
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let assignment = lookups::fetch_assignment(&mut *tx, assignment_id).await?;
    tx.commit().await?;

    tracing::info!(assignment_id = %assignment_id, subject_id = %assignment.subject_id, "assignment created");
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    put,
    path = "/assignments/{id}",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = AssignmentUpdateRequest,
    responses(
        (status = 200, description = "Assignment updated", body = Assignment),
        (status = 400, description = "Invalid weight, or max_score below a recorded grade"),
        (status = 403, description = "Subject not owned"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn update_assignment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignmentUpdateRequest>,
) -> AppResult<Json<Assignment>> {
    principal.authorize(policy::ASSIGNMENT_MANAGE)?;

    if let Some(weight) = payload.weight {
        validate_weight(weight)?;
    }
    if let Some(max_score) = payload.max_score {
        validate_max_score(max_score)?;
    }

    let mut tx = state.pool.begin().await?;
    let mut assignment = ownership::ensure_assignment_owner(&mut tx, &principal, id).await?;

    if let Some(title) = payload.title.as_deref() {
        assignment.title = required_text("title", title)?;
    }
    if payload.description.is_some() {
        assignment.description = payload.description.clone();
    }
    if let Some(weight) = payload.weight {
        ensure_weight_fits(&mut tx, assignment.subject_id, weight, Some(id)).await?;
        assignment.weight = weight;
    }
    if let Some(max_score) = payload.max_score {
        ensure_max_score_covers_grades(&mut tx, id, max_score).await?;
        assignment.max_score = max_score;
    }
    if payload.due_date.is_some() {
        assignment.due_date = payload.due_date;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE assignments SET title = ?, description = ?, weight = ?, max_score = ?, due_date = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(assignment.weight)
    .bind(assignment.max_score)
    .bind(assignment.due_date)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    assignment.updated_at = now;
    Ok(Json(assignment))
}

#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 403, description = "Subject not owned"),
        (status = 409, description = "Assignment has recorded grades")
    )
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    principal.authorize(policy::ASSIGNMENT_MANAGE)?;

    integrity::delete_assignment(&state.pool, &principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
