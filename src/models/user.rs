use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::roles::{normalize_role, CanonicalRole};
use crate::errors::AppError;

/// Column list shared by every user lookup. `role_label` is the joined
/// `roles.name`; `role_name` is the free-form column kept on the user row.
pub const USER_COLUMNS: &str = "u.id, u.username, u.full_name, u.email, u.password_hash, u.role_id, u.role_name, r.name AS role_label, u.created_at, u.updated_at";
pub const USER_FROM: &str = "FROM users u LEFT JOIN roles r ON r.id = u.role_id";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role_id: Option<Uuid>,
    /// Display label as stored ("Administrador", "Profesor", ...).
    pub role_name: Option<String>,
    /// Canonical role key.
    #[schema(example = "teacher")]
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub role_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    /// The role label to trust: the role table wins over the free-form column.
    pub fn role_display(&self) -> Option<&str> {
        self.role_label.as_deref().or(self.role_name.as_deref())
    }

    pub fn canonical_role(&self) -> CanonicalRole {
        normalize_role(self.role_display())
    }
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let role = value.canonical_role().as_str().to_string();
        let role_name = value.role_display().map(str::to_string);

        Ok(User {
            id: value.id,
            username: value.username,
            full_name: value.full_name,
            email: value.email,
            role_id: value.role_id,
            role_name,
            role,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "mgarcia")]
    pub username: String,
    #[schema(example = "María García")]
    pub full_name: String,
    #[schema(example = "mgarcia@colegio.edu")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    pub role_id: Option<Uuid>,
    #[schema(example = "Profesor")]
    pub role_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<Uuid>,
    #[schema(example = "Estudiante")]
    pub role_name: Option<String>,
}

impl UserUpdateRequest {
    pub fn touches_role(&self) -> bool {
        self.role_id.is_some() || self.role_name.is_some()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    /// Required when changing your own password.
    pub current_password: Option<String>,
    #[schema(example = "N3wS3cureP@ss")]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessTokenRequest {
    #[schema(example = "grading-sync")]
    pub label: Option<String>,
    #[schema(example = 24)]
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub id: Uuid,
    /// Shown once; only its digest is stored.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
