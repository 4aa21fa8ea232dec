use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const ASSIGNMENT_COLUMNS: &str = "id, subject_id, title, description, weight, max_score, due_date, created_at, updated_at";

/// Upper bound for the summed weights of one subject's assignments.
pub const MAX_SUBJECT_WEIGHT: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Assignment {
    pub id: Uuid,
    pub subject_id: Uuid,
    #[schema(example = "Parcial 1")]
    pub title: String,
    pub description: Option<String>,
    /// Percentage contribution to the subject's final grade.
    #[schema(example = 30.0)]
    pub weight: f64,
    #[schema(example = 5.0)]
    pub max_score: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentCreateRequest {
    pub subject_id: Uuid,
    #[schema(example = "Parcial 1")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = 30.0)]
    pub weight: f64,
    #[schema(example = 5.0)]
    pub max_score: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AssignmentUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub max_score: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}
