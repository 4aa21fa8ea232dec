use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollmentCreateRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentQuery {
    pub subject_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}
