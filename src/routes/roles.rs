use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::{policy, Principal};
use crate::errors::AppResult;
use crate::models::role::{DbRole, Role};

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Users",
    responses(
        (status = 200, description = "Role table with canonical keys", body = [Role]),
        (status = 403, description = "Caller is not staff")
    )
)]
pub async fn list_roles(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Role>>> {
    principal.authorize(policy::ROLE_VIEW)?;

    let roles = sqlx::query_as::<_, DbRole>("SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(roles.into_iter().map(Role::from).collect()))
}
