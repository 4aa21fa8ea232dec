use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::lookups;
use crate::errors::{AppError, AppResult};

const TOKEN_BYTES: usize = 32;
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 90;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 30;

/// Identity resolved from an opaque access token.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub id: Uuid,
    pub username: String,
    /// Raw role label; normalized by the caller.
    pub role: Option<String>,
}

/// Secondary verification scheme consulted when a credential is not a valid JWT.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the token is unknown or expired.
    async fn resolve(&self, token: &str) -> AppResult<Option<ResolvedIdentity>>;
}

/// Resolves opaque access tokens stored (as SHA-256 digests) in `access_tokens`.
#[derive(Debug, Clone)]
pub struct AccessTokenProvider {
    pool: SqlitePool,
}

impl AccessTokenProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issues a new opaque token for `user_id`. The raw value is returned once.
    pub async fn issue(
        &self,
        user_id: Uuid,
        label: Option<&str>,
        ttl_hours: i64,
    ) -> AppResult<(Uuid, String, DateTime<Utc>)> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            return Err(AppError::bad_request(format!(
                "ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}"
            )));
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);

        sqlx::query(
            "INSERT INTO access_tokens (id, user_id, token_hash, label, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(digest(&token))
        .bind(label)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok((id, token, expires_at))
    }
}

#[async_trait]
impl IdentityProvider for AccessTokenProvider {
    async fn resolve(&self, token: &str) -> AppResult<Option<ResolvedIdentity>> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM access_tokens WHERE token_hash = ?")
                .bind(digest(token))
                .fetch_optional(&self.pool)
                .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= Utc::now() {
            tracing::debug!(user_id = %user_id, "access token expired");
            return Ok(None);
        }

        let Some(user) = lookups::find_user(&self.pool, user_id).await? else {
            return Ok(None);
        };

        Ok(Some(ResolvedIdentity {
            id: user.id,
            username: user.username.clone(),
            role: user.role_display().map(str::to_string),
        }))
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let a = digest("opaque-token");
        assert_eq!(a, digest("opaque-token"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, digest("opaque-token2"));
    }
}
