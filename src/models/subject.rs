use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const SUBJECT_COLUMNS: &str = "id, name, code, description, teacher_id, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subject {
    pub id: Uuid,
    #[schema(example = "Matemáticas I")]
    pub name: String,
    #[schema(example = "MAT-101")]
    pub code: Option<String>,
    pub description: Option<String>,
    /// Owning teacher; `None` while unassigned.
    pub teacher_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubjectCreateRequest {
    #[schema(example = "Matemáticas I")]
    pub name: String,
    #[schema(example = "MAT-101")]
    pub code: Option<String>,
    pub description: Option<String>,
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubjectUpdateRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub teacher_id: Option<Uuid>,
    /// Set to detach the current teacher.
    #[serde(default)]
    pub clear_teacher: bool,
}
