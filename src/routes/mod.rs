pub mod assignments;
pub mod auth;
pub mod enrollments;
pub mod grades;
pub mod health;
pub mod roles;
pub mod subjects;
pub mod users;

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `WHERE` clauses for list endpoints. Every bind is an id.
#[derive(Debug, Default)]
pub(crate) struct Filters {
    clauses: Vec<String>,
    binds: Vec<Uuid>,
}

impl Filters {
    /// Adds a clause; `binds` must hold one id per `?` in `clause`.
    pub(crate) fn push(&mut self, clause: impl Into<String>, binds: &[Uuid]) {
        self.clauses.push(clause.into());
        self.binds.extend_from_slice(binds);
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            return String::new();
        }
        let joined = self
            .clauses
            .iter()
            .map(|clause| format!("({clause})"))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {joined}")
    }

    pub(crate) async fn fetch_all<T>(&self, pool: &SqlitePool, select: &str, order_by: &str) -> AppResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let sql = format!("{select}{} ORDER BY {order_by}", self.where_clause());
        let mut query = sqlx::query_as::<_, T>(&sql);
        for id in &self.binds {
            query = query.bind(*id);
        }
        Ok(query.fetch_all(pool).await?)
    }
}
