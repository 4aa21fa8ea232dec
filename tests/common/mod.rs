#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use academic_records::create_app;
use academic_records::jwt::{JwtConfig, DEFAULT_COOKIE_NAME};
use academic_records::utils::hash_password;

pub const TEST_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "correct-horse-battery";

// Seeded by migrations/20250101000100_seed_roles.sql
pub const ADMIN_ROLE: Uuid = Uuid::from_u128(0x0192A6C0_0000_7000_8000_000000000001);
pub const DIRECTOR_ROLE: Uuid = Uuid::from_u128(0x0192A6C0_0000_7000_8000_000000000002);
pub const TEACHER_ROLE: Uuid = Uuid::from_u128(0x0192A6C0_0000_7000_8000_000000000003);
pub const STUDENT_ROLE: Uuid = Uuid::from_u128(0x0192A6C0_0000_7000_8000_000000000004);

/// A seeded user and a bearer token for them.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    jwt: JwtConfig,
    password_hash: String,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("test.db");

        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_path())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        std::env::set_var("JWT_SECRET", TEST_SECRET);
        let app = create_app(pool.clone()).await?;

        Ok(Self {
            app,
            pool,
            jwt: JwtConfig::new(TEST_SECRET.as_bytes().to_vec(), 2, DEFAULT_COOKIE_NAME),
            password_hash: hash_password(PASSWORD)?,
            _dir: dir,
        })
    }

    /// Inserts a user whose `role_id` points at the seeded role of the same
    /// name, or a bare `role_name` when no such role row exists.
    pub async fn user(&self, username: &str, role_label: &str) -> Result<Actor> {
        let role_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(role_label)
            .fetch_optional(&self.pool)
            .await?;

        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO users (id, username, full_name, email, password_hash, role_id, role_name, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind(format!("{username} full name"))
        .bind(&self.password_hash)
        .bind(role_id)
        .bind(role_label)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let token = self.jwt.encode(id, username, role_label)?;
        Ok(Actor {
            id,
            username: username.to_string(),
            token,
        })
    }

    pub async fn subject(&self, name: &str, teacher_id: Option<Uuid>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO subjects (id, name, code, description, teacher_id, created_at, updated_at) VALUES (?, ?, NULL, NULL, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(teacher_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn assignment(&self, subject_id: Uuid, weight: f64, max_score: f64) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO assignments (id, subject_id, title, description, weight, max_score, due_date, created_at, updated_at) VALUES (?, ?, 'task', NULL, ?, ?, NULL, ?, ?)",
        )
        .bind(id)
        .bind(subject_id)
        .bind(weight)
        .bind(max_score)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn enroll(&self, student_id: Uuid, subject_id: Uuid) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO enrollments (id, student_id, subject_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(student_id)
            .bind(subject_id)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn grade(&self, student_id: Uuid, assignment_id: Uuid, subject_id: Uuid, score: f64) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO grades (id, student_id, assignment_id, subject_id, score, feedback, graded_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, ?)",
        )
        .bind(id)
        .bind(student_id)
        .bind(assignment_id)
        .bind(subject_id)
        .bind(score)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn count(&self, sql: &str, id: Uuid) -> Result<i64> {
        Ok(sqlx::query_scalar(sql).bind(id).fetch_one(&self.pool).await?)
    }

    pub async fn admin_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(1) FROM users u LEFT JOIN roles r ON r.id = u.role_id WHERE r.name = 'Administrador'",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(request).await?;
        let status = resp.status();
        let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&body_bytes)))?
        };
        Ok((status, value))
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, actor: &Actor) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, uri, Some(&actor.token), None).await
    }

    pub async fn post(&self, uri: &str, actor: &Actor, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, uri, Some(&actor.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, actor: &Actor, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::PUT, uri, Some(&actor.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, actor: &Actor) -> Result<(StatusCode, Value)> {
        self.call(Method::DELETE, uri, Some(&actor.token), None).await
    }
}

pub fn error_message(body: &Value) -> &str {
    body.get("error").and_then(Value::as_str).unwrap_or_default()
}
