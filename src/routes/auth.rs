use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};

use super::MessageResponse;
use crate::app::AppState;
use crate::authz::provider::DEFAULT_TOKEN_TTL_HOURS;
use crate::authz::{policy, Principal};
use crate::db::lookups;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AccessTokenRequest, AccessTokenResponse, AuthResponse, LoginRequest, User};
use crate::utils::verify_password;

fn session_cookie(name: &str, value: String, max_age_seconds: i64) -> String {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(max_age_seconds))
        .build()
        .to_string()
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; also sets the session cookie", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let username = payload.username.trim().to_lowercase();
    let db_user = lookups::find_user_by_username(&state.pool, &username)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(username = %username, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let role_label = db_user.role_display().unwrap_or_default().to_string();
    let token = state.jwt.encode(db_user.id, &db_user.username, &role_label)?;
    let cookie = session_cookie(&state.jwt.cookie_name, token.clone(), state.jwt.max_age_seconds());
    let user: User = db_user.try_into()?;

    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(([(header::SET_COOKIE, cookie)], Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session cookie cleared", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>, principal: Principal) -> AppResult<impl IntoResponse> {
    principal.authorize(policy::ANY_AUTHENTICATED)?;

    let cookie = session_cookie(&state.jwt.cookie_name, String::new(), 0);
    Ok(([(header::SET_COOKIE, cookie)], Json(MessageResponse::new("Logged out"))))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<User>> {
    principal.authorize(policy::ANY_AUTHENTICATED)?;

    let user: User = lookups::fetch_user(&state.pool, principal.id).await?.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/access-tokens",
    tag = "Auth",
    request_body = AccessTokenRequest,
    responses(
        (status = 201, description = "Opaque access token issued", body = AccessTokenResponse),
        (status = 400, description = "Invalid ttl")
    )
)]
pub async fn create_access_token(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AccessTokenRequest>,
) -> AppResult<(StatusCode, Json<AccessTokenResponse>)> {
    principal.authorize(policy::ANY_AUTHENTICATED)?;

    // tokens outlive the JWT, so the user row must still exist
    lookups::fetch_user(&state.pool, principal.id).await?;

    let ttl_hours = payload.ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS);
    let label = payload.label.as_deref().map(str::trim).filter(|label| !label.is_empty());
    let (id, token, expires_at) = state.access_tokens.issue(principal.id, label, ttl_hours).await?;

    tracing::info!(user_id = %principal.id, token_id = %id, "access token issued");
    Ok((StatusCode::CREATED, Json(AccessTokenResponse { id, token, expires_at })))
}
