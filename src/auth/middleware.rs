//! Axum extractors for authentication.

use crate::auth::jwt::{verify_jwt, JwtClaims};
use crate::config::Config;
use crate::error::AppError;
use crate::models::Role;
use crate::storage;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub redis: redis::Client,
    pub config: Arc<Config>,
}

/// Authenticated session extractor.
///
/// Accepts the token from `Authorization: Bearer {jwt}` or, failing that,
/// from the requester role's cookie. A verified signature alone is not
/// enough: the referenced session must still exist in Redis (the session
/// record is the source of truth for revocation). Extraction also
/// refreshes the session TTL, so activity keeps a session alive.
///
/// Returns 401 Unauthorized if missing, invalid, or revoked.
pub struct AuthSession {
    pub user_id: String,
    pub role: Role,
    pub session_id: String,
    pub claims: JwtClaims,
}

/// Token from the Authorization header, if present.
fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Token from any role cookie, if present.
///
/// Each role has its own cookie namespace; all three are candidates
/// because the role is only known after the JWT is decoded.
fn cookie_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get("cookie")?.to_str().ok()?;
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if Role::ALL.iter().any(|role| role.cookie_name() == name) && !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()))?;

        let claims = verify_jwt(&state.config.jwt_secret, &token)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let mut con = state
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

        let valid = storage::session::validate_session(
            &mut con,
            &claims.session_id,
            &claims.sub,
            claims.role,
        )
        .await?;
        if !valid {
            return Err(AppError::Unauthorized(
                "Session expired or revoked".to_string(),
            ));
        }

        // Activity refreshes the TTL; the stored value is never rewritten
        storage::session::touch_session(
            &mut con,
            &claims.session_id,
            &claims.sub,
            claims.role,
            state.config.session_ttl_secs,
        )
        .await?;

        Ok(AuthSession {
            user_id: claims.sub.clone(),
            role: claims.role,
            session_id: claims.session_id.clone(),
            claims,
        })
    }
}

/// Admin-only session extractor.
///
/// Extracts the session and verifies the role is elevated
/// (Admin or SuperAdmin). Returns 403 Forbidden otherwise.
pub struct AdminSession(pub AuthSession);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = AuthSession::from_request_parts(parts, state).await?;

        if !session.role.is_elevated() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminSession(session))
    }
}
