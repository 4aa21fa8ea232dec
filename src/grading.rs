//! Weighted final-grade computation.
//!
//! Scores are normalized to the 0-5 scale of their assignment and weighted by
//! the assignment's percentage. The result is not rescaled by the total
//! weight graded so far: a partially graded subject reports current
//! standing, not a projection.

use std::collections::HashMap;

use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::assignment::{Assignment, ASSIGNMENT_COLUMNS};
use crate::models::grade::{Grade, GRADE_COLUMNS};

pub const GRADE_SCALE: f64 = 5.0;
pub const PASSING_GRADE: f64 = 3.0;

pub fn is_approved(final_grade: f64) -> bool {
    final_grade >= PASSING_GRADE
}

/// Computes the final grade of one student in one subject.
///
/// `grades` are that student's grades in the subject and `assignments` the
/// subject's assignments. Returns `None` when there are no grades, or when
/// none of the graded assignments carries weight.
pub fn calculate_final_grade(grades: &[Grade], assignments: &[Assignment]) -> Option<f64> {
    if grades.is_empty() {
        return None;
    }

    let by_id: HashMap<Uuid, &Assignment> = assignments.iter().map(|a| (a.id, a)).collect();

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for grade in grades {
        // orphaned grade
        let Some(assignment) = by_id.get(&grade.assignment_id) else {
            continue;
        };

        let normalized = if assignment.max_score > 0.0 {
            grade.score / assignment.max_score * GRADE_SCALE
        } else {
            0.0
        };

        weighted_sum += normalized * (assignment.weight / 100.0);
        total_weight += assignment.weight;
    }

    if total_weight == 0.0 {
        return None;
    }

    Some(weighted_sum)
}

/// Loads the rows for `(student_id, subject_id)` and computes the final grade.
///
/// Grades are matched by their own `subject_id` or by belonging to one of the
/// subject's assignments, so rows written without a subject reference still
/// count.
pub async fn final_grade_for<'c, E>(executor: E, student_id: Uuid, subject_id: Uuid) -> AppResult<Option<f64>>
where
    E: SqliteExecutor<'c> + Copy,
{
    let assignments_sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE subject_id = ?");
    let assignments = sqlx::query_as::<_, Assignment>(&assignments_sql)
        .bind(subject_id)
        .fetch_all(executor)
        .await?;

    let grades_sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades WHERE student_id = ? AND (subject_id = ? OR assignment_id IN (SELECT id FROM assignments WHERE subject_id = ?))"
    );
    let grades = sqlx::query_as::<_, Grade>(&grades_sql)
        .bind(student_id)
        .bind(subject_id)
        .bind(subject_id)
        .fetch_all(executor)
        .await?;

    Ok(calculate_final_grade(&grades, &assignments))
}
