use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::AppError;
use crate::integrity::{DeletionSummary, DependentReferences, RemovedRecords};
use crate::jwt::DEFAULT_COOKIE_NAME;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::logout,
		routes::auth::me,
		routes::auth::create_access_token,
		routes::roles::list_roles,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::users::change_password,
		routes::subjects::list_subjects,
		routes::subjects::get_subject,
		routes::subjects::create_subject,
		routes::subjects::update_subject,
		routes::subjects::delete_subject,
		routes::enrollments::list_enrollments,
		routes::enrollments::create_enrollment,
		routes::enrollments::delete_enrollment,
		routes::assignments::list_subject_assignments,
		routes::assignments::create_assignment,
		routes::assignments::update_assignment,
		routes::assignments::delete_assignment,
		routes::grades::list_grades,
		routes::grades::create_grade,
		routes::grades::update_grade,
		routes::grades::delete_grade,
		routes::grades::final_grade
	),
	components(
		schemas(
			routes::MessageResponse,
			routes::health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::PasswordChangeRequest,
			models::user::AccessTokenRequest,
			models::user::AccessTokenResponse,
			models::role::Role,
			models::subject::Subject,
			models::subject::SubjectCreateRequest,
			models::subject::SubjectUpdateRequest,
			models::enrollment::Enrollment,
			models::enrollment::EnrollmentCreateRequest,
			models::assignment::Assignment,
			models::assignment::AssignmentCreateRequest,
			models::assignment::AssignmentUpdateRequest,
			models::grade::Grade,
			models::grade::GradeCreateRequest,
			models::grade::GradeUpdateRequest,
			models::grade::FinalGradeResponse,
			DeletionSummary,
			DependentReferences,
			RemovedRecords
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Auth", description = "Login, session cookie and access tokens"),
		(name = "Health", description = "Liveness"),
		(name = "Users", description = "Accounts and roles"),
		(name = "Subjects", description = "Subjects and their owning teacher"),
		(name = "Enrollments", description = "Student enrollments"),
		(name = "Assignments", description = "Weighted assignments"),
		(name = "Grades", description = "Grades and final-grade computation")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
		);
		components.add_security_scheme(
			"cookieAuth",
			SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(DEFAULT_COOKIE_NAME))),
		);
	}
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Result<Router, AppError> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(
		serde_json::to_value(&doc).map_err(|err| AppError::internal(format!("OpenAPI serialization failed: {err}")))?,
	);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn documents_every_resource() {
		let doc = build_openapi(8000);
		let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

		for expected in [
			"/auth/login",
			"/users/{id}",
			"/subjects/{id}/assignments",
			"/enrollments",
			"/grades/final",
		] {
			assert!(paths.contains(&expected), "missing {expected}");
		}

		let schemes = &doc.components.as_ref().unwrap().security_schemes;
		assert!(schemes.contains_key("bearerAuth"));
	}
}
