use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::AppError;

pub const DEFAULT_COOKIE_NAME: &str = "academic_auth_token";
const DEFAULT_EXP_HOURS: i64 = 2;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    pub cookie_name: String,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EXP_HOURS))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;
        let cookie_name = std::env::var("AUTH_COOKIE_NAME").unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string());

        Ok(Self::new(secret.into_bytes(), exp_hours, cookie_name))
    }

    pub fn new(secret: Vec<u8>, exp_hours: i64, cookie_name: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret),
            exp_hours,
            cookie_name: cookie_name.into(),
        }
    }

    /// Signs an identity. The role claim is stored as given; it is normalized
    /// when the token is read back.
    pub fn encode(&self, user_id: Uuid, username: &str, role: &str) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role: role.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn max_age_seconds(&self) -> i64 {
        self.exp_hours * 3600
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_identity_claims() {
        let config = JwtConfig::new(b"unit-secret".to_vec(), 2, DEFAULT_COOKIE_NAME);
        let user_id = Uuid::new_v4();

        let token = config.encode(user_id, "ana", "Profesor").unwrap();
        let claims = config.decode(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.role, "Profesor");
        assert_eq!(claims.exp - claims.iat, 2 * 3600);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let issuer = JwtConfig::new(b"issuer-secret".to_vec(), 2, DEFAULT_COOKIE_NAME);
        let verifier = JwtConfig::new(b"other-secret".to_vec(), 2, DEFAULT_COOKIE_NAME);

        let token = issuer.encode(Uuid::new_v4(), "ana", "admin").unwrap();
        assert!(matches!(verifier.decode(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn rejects_expired_tokens() {
        let config = JwtConfig::new(b"unit-secret".to_vec(), -3, DEFAULT_COOKIE_NAME);
        let token = config.encode(Uuid::new_v4(), "ana", "admin").unwrap();
        assert!(config.decode(&token).is_err());
    }
}
