use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use cookie::Cookie;
use uuid::Uuid;

use super::roles::{normalize_role, CanonicalRole};
use crate::app::AppState;
use crate::errors::{AppError, AppResult};

/// The authenticated caller for one request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub role: CanonicalRole,
}

impl Principal {
    pub fn new(id: Uuid, username: impl Into<String>, role_claim: Option<&str>) -> Self {
        Self {
            id,
            username: username.into(),
            role: normalize_role(role_claim),
        }
    }

    /// Checks the caller's canonical role against an allow-list of canonical
    /// keys. An empty list admits every authenticated caller.
    pub fn authorize(&self, allowed: &[&str]) -> AppResult<()> {
        if allowed.is_empty() || allowed.contains(&self.role.as_str()) {
            return Ok(());
        }

        tracing::debug!(
            user_id = %self.id,
            role = %self.role,
            allowed = ?allowed,
            "role not in allow-list"
        );
        Err(AppError::forbidden(format!("role '{}' may not perform this operation", self.role)))
    }

    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.id == user_id
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value).filter_map(Result::ok))
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Verifies a raw credential: first as a signed JWT, then through the
/// configured identity provider as an opaque access token.
pub async fn resolve_principal(state: &AppState, token: &str) -> AppResult<Principal> {
    let primary_err = match state.jwt.decode(token) {
        Ok(claims) => return Ok(Principal::new(claims.sub, claims.username, Some(&claims.role))),
        Err(err) => err,
    };

    match state.identity_provider.resolve(token).await {
        Ok(Some(identity)) => {
            tracing::debug!(user_id = %identity.id, "credential resolved by identity provider");
            Ok(Principal::new(identity.id, identity.username, identity.role.as_deref()))
        }
        Ok(None) => {
            tracing::debug!(error = %primary_err, "credential rejected by both verification schemes");
            Err(AppError::unauthorized("invalid or expired credential"))
        }
        Err(provider_err) => {
            tracing::warn!(error = %provider_err, "identity provider lookup failed");
            Err(provider_err)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers, &state.jwt.cookie_name))
            .ok_or_else(|| AppError::unauthorized("authentication required"))?;

        resolve_principal(state, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn principal(role: &str) -> Principal {
        Principal::new(Uuid::new_v4(), "someone", Some(role))
    }

    #[test]
    fn allow_list_uses_normalized_role() {
        let director = principal("Director");
        assert!(director.authorize(&["admin", "director"]).is_ok());
        assert!(matches!(director.authorize(&["admin"]), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn empty_allow_list_admits_any_role() {
        assert!(principal("visitante").authorize(&[]).is_ok());
    }

    #[test]
    fn bearer_header_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; academic_auth_token=cookie-token"));

        assert_eq!(bearer_token(&headers).as_deref(), Some("header-token"));
        assert_eq!(cookie_token(&headers, "academic_auth_token").as_deref(), Some("cookie-token"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(bearer_token(&headers).is_none());
        assert!(cookie_token(&headers, "academic_auth_token").is_none());
    }
}
