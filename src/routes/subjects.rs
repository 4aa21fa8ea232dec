use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::Filters;
use crate::app::AppState;
use crate::authz::{ownership, policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::integrity::{self, DeletionSummary};
use crate::models::subject::{Subject, SubjectCreateRequest, SubjectUpdateRequest, SUBJECT_COLUMNS};
use crate::utils::{required_text, utc_now};

/// Loads a subject the caller may read: teachers need ownership, students an
/// enrollment. Staff read everything.
pub(crate) async fn ensure_subject_visible(
    conn: &mut SqliteConnection,
    principal: &Principal,
    subject_id: Uuid,
) -> AppResult<Subject> {
    let subject = ownership::ensure_subject_owner(conn, principal, subject_id).await?;

    if principal.role.is_student() && !lookups::is_enrolled(&mut *conn, principal.id, subject_id).await? {
        return Err(AppError::forbidden("you are not enrolled in this subject"));
    }

    Ok(subject)
}

async fn ensure_teacher(conn: &mut SqliteConnection, teacher_id: Uuid) -> AppResult<()> {
    let teacher = lookups::find_user(&mut *conn, teacher_id)
        .await?
        .ok_or_else(|| AppError::bad_request("teacher_id does not reference an existing user"))?;

    if !teacher.canonical_role().is_teacher() {
        return Err(AppError::bad_request("teacher_id must reference a teacher"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/subjects",
    tag = "Subjects",
    responses((status = 200, description = "Subjects visible to the caller", body = [Subject]))
)]
pub async fn list_subjects(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Subject>>> {
    principal.authorize(policy::SUBJECT_VIEW)?;

    let mut filters = Filters::default();
    if principal.role.is_teacher() {
        filters.push("teacher_id = ?", &[principal.id]);
    } else if principal.role.is_student() {
        filters.push("id IN (SELECT subject_id FROM enrollments WHERE student_id = ?)", &[principal.id]);
    }

    let select = format!("SELECT {SUBJECT_COLUMNS} FROM subjects");
    let subjects = filters.fetch_all::<Subject>(&state.pool, &select, "name").await?;
    Ok(Json(subjects))
}

#[utoipa::path(
    get,
    path = "/subjects/{id}",
    tag = "Subjects",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Subject detail", body = Subject),
        (status = 403, description = "Not owned or not enrolled"),
        (status = 404, description = "Subject not found")
    )
)]
pub async fn get_subject(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Subject>> {
    principal.authorize(policy::SUBJECT_VIEW)?;

    let mut conn = state.pool.acquire().await?;
    let subject = ensure_subject_visible(&mut conn, &principal, id).await?;
    Ok(Json(subject))
}

#[utoipa::path(
    post,
    path = "/subjects",
    tag = "Subjects",
    request_body = SubjectCreateRequest,
    responses(
        (status = 201, description = "Subject created", body = Subject),
        (status = 400, description = "Invalid payload or teacher")
    )
)]
pub async fn create_subject(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<SubjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Subject>)> {
    principal.authorize(policy::SUBJECT_MANAGE)?;

    let name = required_text("name", &payload.name)?;
    let mut conn = state.pool.acquire().await?;
    if let Some(teacher_id) = payload.teacher_id {
        ensure_teacher(&mut conn, teacher_id).await?;
    }

    let now = utc_now();
    let subject_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO subjects (id, name, code, description, teacher_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(subject_id)
    .bind(&name)
    .bind(&payload.code)
    .bind(&payload.description)
    .bind(payload.teacher_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    tracing::info!(subject_id = %subject_id, created_by = %principal.id, "subject created");

    let subject = lookups::fetch_subject(&mut *conn, subject_id).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[utoipa::path(
    put,
    path = "/subjects/{id}",
    tag = "Subjects",
    params(("id" = Uuid, Path, description = "Subject id")),
    request_body = SubjectUpdateRequest,
    responses(
        (status = 200, description = "Subject updated", body = Subject),
        (status = 404, description = "Subject not found")
    )
)]
pub async fn update_subject(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubjectUpdateRequest>,
) -> AppResult<Json<Subject>> {
    principal.authorize(policy::SUBJECT_MANAGE)?;

    let mut tx = state.pool.begin().await?;
    let mut subject = lookups::fetch_subject(&mut *tx, id).await?;

    if let Some(name) = payload.name.as_deref() {
        subject.name = required_text("name", name)?;
    }
    if payload.code.is_some() {
        subject.code = payload.code.clone();
    }
    if payload.description.is_some() {
        subject.description = payload.description.clone();
    }
    if payload.clear_teacher {
        subject.teacher_id = None;
    } else if let Some(teacher_id) = payload.teacher_id {
        ensure_teacher(&mut tx, teacher_id).await?;
        subject.teacher_id = Some(teacher_id);
    }

    let now = utc_now();
    sqlx::query("UPDATE subjects SET name = ?, code = ?, description = ?, teacher_id = ?, updated_at = ? WHERE id = ?")
        .bind(&subject.name)
        .bind(&subject.code)
        .bind(&subject.description)
        .bind(subject.teacher_id)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    subject.updated_at = now;
    Ok(Json(subject))
}

#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    tag = "Subjects",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Subject and its assignments and grades deleted", body = DeletionSummary),
        (status = 409, description = "Subject has enrolled students")
    )
)]
pub async fn delete_subject(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletionSummary>> {
    principal.authorize(policy::SUBJECT_MANAGE)?;

    let summary = integrity::delete_subject(&state.pool, &principal, id).await?;
    Ok(Json(summary))
}
