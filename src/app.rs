use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{AccessTokenProvider, IdentityProvider};
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{assignments, auth, enrollments, grades, health, roles, subjects, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub access_tokens: AccessTokenProvider,
    /// Fallback verification for credentials that are not valid JWTs.
    pub identity_provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        let access_tokens = AccessTokenProvider::new(pool.clone());
        Self {
            pool,
            jwt: Arc::new(jwt),
            identity_provider: Arc::new(access_tokens.clone()),
            access_tokens,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/access-tokens", post(auth::create_access_token));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/:id/password", put(users::change_password));

    let subject_routes = Router::new()
        .route("/", get(subjects::list_subjects).post(subjects::create_subject))
        .route(
            "/:id",
            get(subjects::get_subject)
                .put(subjects::update_subject)
                .delete(subjects::delete_subject),
        )
        .route("/:id/assignments", get(assignments::list_subject_assignments));

    let enrollment_routes = Router::new()
        .route("/", get(enrollments::list_enrollments).post(enrollments::create_enrollment))
        .route("/:id", axum::routing::delete(enrollments::delete_enrollment));

    let assignment_routes = Router::new()
        .route("/", post(assignments::create_assignment))
        .route(
            "/:id",
            put(assignments::update_assignment).delete(assignments::delete_assignment),
        );

    let grade_routes = Router::new()
        .route("/", get(grades::list_grades).post(grades::create_grade))
        .route("/final", get(grades::final_grade))
        .route("/:id", put(grades::update_grade).delete(grades::delete_grade));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/roles", get(roles::list_roles))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/subjects", subject_routes)
        .nest("/enrollments", enrollment_routes)
        .nest("/assignments", assignment_routes)
        .nest("/grades", grade_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
