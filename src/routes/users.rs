use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::MessageResponse;
use crate::app::AppState;
use crate::authz::{policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::integrity::{self, DeletionSummary};
use crate::models::user::{
    DbUser, DeleteUserQuery, PasswordChangeRequest, User, UserCreateRequest, UserUpdateRequest, USER_COLUMNS,
    USER_FROM,
};
use crate::utils::{hash_password, normalize_username, required_text, utc_now, verify_password};

fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Caller is not staff")
    )
)]
pub async fn list_users(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<User>>> {
    principal.authorize(policy::USER_VIEW)?;

    let sql = format!("SELECT {USER_COLUMNS} {USER_FROM} ORDER BY u.username");
    let users = sqlx::query_as::<_, DbUser>(&sql).fetch_all(&state.pool).await?;

    let users: Vec<User> = users.into_iter().map(User::try_from).collect::<Result<_, _>>()?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    if !principal.is_self(id) {
        principal.authorize(policy::USER_VIEW)?;
    }

    let user: User = lookups::fetch_user(&state.pool, id).await?.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload or unknown role"),
        (status = 403, description = "Only administrators may create administrators"),
        (status = 409, description = "Username already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    principal.authorize(policy::USER_MANAGE)?;

    let username = normalize_username(&payload.username)?;
    let full_name = required_text("full_name", &payload.full_name)?;
    let email = optional_text(payload.email.as_deref());

    let mut conn = state.pool.acquire().await?;
    let role = integrity::resolve_role_assignment(&mut conn, payload.role_id, payload.role_name.as_deref())
        .await?
        .ok_or_else(|| AppError::bad_request("role_id or role_name is required"))?;
    integrity::ensure_can_assign(&principal, &role.canonical)?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, username, full_name, email, password_hash, role_id, role_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&username)
    .bind(&full_name)
    .bind(&email)
    .bind(password_hash)
    .bind(role.role_id)
    .bind(&role.role_name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|err| AppError::unique_violation(err, "username already in use"))?;

    tracing::info!(user_id = %user_id, role = %role.canonical, created_by = %principal.id, "user created");

    let user: User = lookups::fetch_user(&mut *conn, user_id).await?.try_into()?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Role change not permitted for this caller"),
        (status = 409, description = "Would remove the last administrator, or username taken")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    principal.authorize(policy::USER_MANAGE)?;

    let username = payload.username.as_deref().map(normalize_username).transpose()?;
    let full_name = payload
        .full_name
        .as_deref()
        .map(|value| required_text("full_name", value))
        .transpose()?;

    let mut tx = state.pool.begin().await?;
    let target = lookups::fetch_user(&mut *tx, id).await?;
    integrity::ensure_can_manage(&principal, &target)?;

    let mut role_id = target.role_id;
    let mut role_name = target.role_name.clone();
    if payload.touches_role() {
        if let Some(role) =
            integrity::resolve_role_assignment(&mut tx, payload.role_id, payload.role_name.as_deref()).await?
        {
            integrity::ensure_role_change_allowed(&mut tx, &principal, &target, &role.canonical).await?;
            tracing::info!(
                target_id = %id,
                from = %target.canonical_role(),
                to = %role.canonical,
                changed_by = %principal.id,
                "user role changed"
            );
            role_id = role.role_id;
            role_name = Some(role.role_name);
        }
    }

    let email = match payload.email.as_deref() {
        Some(value) => optional_text(Some(value)),
        None => target.email.clone(),
    };

    sqlx::query(
        "UPDATE users SET username = ?, full_name = ?, email = ?, role_id = ?, role_name = ?, updated_at = ? WHERE id = ?",
    )
    .bind(username.unwrap_or_else(|| target.username.clone()))
    .bind(full_name.unwrap_or_else(|| target.full_name.clone()))
    .bind(email)
    .bind(role_id)
    .bind(role_name)
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::unique_violation(err, "username already in use"))?;

    let user: User = lookups::fetch_user(&mut *tx, id).await?.try_into()?;
    tx.commit().await?;

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("force" = Option<bool>, Query, description = "Remove dependent records too (administrators only)")
    ),
    responses(
        (status = 200, description = "User deleted", body = DeletionSummary),
        (status = 403, description = "Caller may not delete this user"),
        (status = 409, description = "Last administrator, own account, or dependent records exist")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteUserQuery>,
) -> AppResult<Json<DeletionSummary>> {
    principal.authorize(policy::USER_MANAGE)?;
    if query.force {
        principal.authorize(policy::FORCE_DELETE)?;
    }

    let summary = integrity::delete_user(&state.pool, &principal, id, query.force).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    put,
    path = "/users/{id}/password",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Missing current password or weak new password"),
        (status = 403, description = "Current password mismatch or caller may not reset this password")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<PasswordChangeRequest>,
) -> AppResult<Json<MessageResponse>> {
    let target = if principal.is_self(id) {
        principal.authorize(policy::ANY_AUTHENTICATED)?;
        let target = lookups::fetch_user(&state.pool, id).await?;
        let current = payload
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::bad_request("current_password is required"))?;
        if !verify_password(current, &target.password_hash)? {
            return Err(AppError::forbidden("current password is incorrect"));
        }
        target
    } else {
        principal.authorize(policy::USER_MANAGE)?;
        let target = lookups::fetch_user(&state.pool, id).await?;
        integrity::ensure_can_manage(&principal, &target)?;
        target
    };

    let password_hash = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(utc_now())
        .bind(target.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(target_id = %target.id, changed_by = %principal.id, "password changed");
    Ok(Json(MessageResponse::new("Password updated")))
}
