use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const GRADE_COLUMNS: &str = "id, student_id, assignment_id, subject_id, score, feedback, graded_by, created_at, updated_at";

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Grade {
    pub id: Uuid,
    pub student_id: Uuid,
    pub assignment_id: Uuid,
    pub subject_id: Option<Uuid>,
    #[schema(example = 4.2)]
    pub score: f64,
    pub feedback: Option<String>,
    pub graded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeCreateRequest {
    pub student_id: Uuid,
    pub assignment_id: Uuid,
    #[schema(example = 4.2)]
    pub score: f64,
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GradeUpdateRequest {
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GradeQuery {
    pub student_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct FinalGradeQuery {
    pub student_id: Uuid,
    pub subject_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinalGradeResponse {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    /// `null` until at least one weighted assignment is graded.
    pub final_grade: Option<f64>,
    pub approved: Option<bool>,
}

pub fn validate_score(score: f64) -> Result<(), crate::errors::AppError> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(crate::errors::AppError::bad_request(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}"
        )));
    }
    Ok(())
}

/// Rejects a score above the assignment's own `max_score`.
pub fn validate_score_within(score: f64, max_score: f64) -> Result<(), crate::errors::AppError> {
    if score > max_score {
        return Err(crate::errors::AppError::bad_request(format!(
            "score {score} exceeds the assignment's max_score of {max_score}"
        )));
    }
    Ok(())
}
