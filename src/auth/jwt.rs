//! Stateless bearer tokens referencing server-side sessions.
//!
//! Tokens are HS256-signed and expire with the session TTL. The signature
//! only proves the claims were issued by this service; the Redis session
//! record remains the source of truth for revocation, so a verified token
//! whose session is gone must still be rejected by the caller.

use crate::models::Role;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claim set carried by every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id.
    pub sub: String,
    pub full_name: String,
    pub avatar_link: Option<String>,
    pub role: Role,
    pub session_id: String,
    pub iat: u64,
    pub exp: u64,
}

/// Identity fields baked into a new token.
#[derive(Debug, Clone)]
pub struct JwtPayload {
    pub user_id: String,
    pub full_name: String,
    pub avatar_link: Option<String>,
    pub role: Role,
    pub session_id: String,
}

/// Sign a token expiring `ttl_secs` from now.
pub fn sign_jwt(
    secret: &str,
    payload: JwtPayload,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = JwtClaims {
        sub: payload.user_id,
        full_name: payload.full_name,
        avatar_link: payload.avatar_link,
        role: payload.role,
        session_id: payload.session_id,
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry.
///
/// Returns None on any failure (bad signature, expired, malformed) so
/// callers uniformly treat a missing payload as unauthenticated.
pub fn verify_jwt(secret: &str, token: &str) -> Option<JwtClaims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}
