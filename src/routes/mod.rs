//! API route handlers.

pub mod admin;
pub mod auth;

use crate::auth::middleware::AppState;
use crate::auth::token::TOKEN_LEN;
use crate::error::AppError;
use axum::{routing::get, routing::post, Router};

/// Validate that a string is a generated token id (URL-safe base64).
pub fn validate_token_id(id: &str, label: &str) -> Result<(), AppError> {
    if id.len() != TOKEN_LEN
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(format!("Invalid {} format", label)));
    }
    Ok(())
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/sessions", get(auth::list_sessions))
        .route(
            "/api/auth/sessions/{id}",
            axum::routing::delete(auth::terminate_session),
        )
        .route("/api/auth/reset", post(auth::request_reset))
        .route("/api/auth/reset/confirm", post(auth::confirm_reset))
        // Admin endpoints
        .route(
            "/api/users",
            post(admin::create_user).get(admin::list_users),
        )
        .route(
            "/api/users/{id}",
            axum::routing::delete(admin::delete_user),
        )
        .route(
            "/api/users/{id}/sessions",
            get(admin::list_user_sessions).delete(admin::terminate_user_sessions),
        )
        .route(
            "/api/ratelimit/{identifier}",
            axum::routing::delete(admin::reset_rate_limit),
        )
}
