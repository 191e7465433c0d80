//! Admin API endpoints (all require AdminSession).

use crate::auth::middleware::{AdminSession, AppState};
use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::models::{CreateUserRequest, Role, SessionInfo, StoredUser, UserInfo};
use crate::storage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// POST /api/users — Create a user
pub async fn create_user(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    // Only a super-admin may mint elevated accounts
    if req.role.is_elevated() && session.role != Role::SuperAdmin {
        return Err(AppError::Forbidden(
            "Super-admin access required to create elevated accounts".to_string(),
        ));
    }

    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let existing = storage::user::get_user_by_email(&mut con, &req.email).await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(format!(
            "Email '{}' is already registered",
            req.email
        )));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| AppError::Internal(format!("Password hashing error: {}", e)))?;

    let user = StoredUser {
        id: nanoid::nanoid!(12),
        email: req.email,
        full_name: req.full_name,
        avatar_link: req.avatar_link,
        role: req.role,
        password_hash,
        created_at: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    };

    storage::user::store_user(&mut con, &user).await?;

    tracing::info!(action = "user_created", user_id = %user.id, role = %user.role, by = %session.user_id, "Admin created user");

    Ok(Json(UserInfo::from(user)))
}

/// GET /api/users — List all users
pub async fn list_users(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let mut users = storage::user::list_users(&mut con).await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let infos: Vec<UserInfo> = users.into_iter().map(UserInfo::from).collect();
    Ok(Json(infos))
}

/// DELETE /api/users/{id} — Delete a user and revoke their sessions
pub async fn delete_user(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // The bootstrap super-admin cannot be deleted
    if id == "admin" {
        return Err(AppError::Forbidden(
            "The bootstrap admin cannot be deleted".to_string(),
        ));
    }

    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let deleted = storage::user::delete_user(&mut con, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let revoked =
        storage::session::invalidate_all_sessions(&mut con, &deleted.id, deleted.role).await?;

    tracing::info!(action = "user_deleted", user_id = %deleted.id, sessions_revoked = revoked, by = %session.user_id, "Admin deleted user");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/{id}/sessions — List a user's active sessions
pub async fn list_user_sessions(
    AdminSession(_session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let user = storage::user::get_user(&mut con, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let active = storage::session::get_active_sessions(&mut con, &user.id, user.role).await?;

    let infos: Vec<SessionInfo> = active
        .into_iter()
        .map(|s| SessionInfo {
            current: false,
            session_id: s.session_id,
            device: s.device,
            ip: s.ip,
            location: s.location,
            user_agent: s.user_agent,
            created_at: s.created_at,
            last_active_at: s.last_active_at,
        })
        .collect();

    Ok(Json(infos))
}

/// DELETE /api/users/{id}/sessions — Revoke all of a user's sessions
pub async fn terminate_user_sessions(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let user = storage::user::get_user(&mut con, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let revoked = storage::session::invalidate_all_sessions(&mut con, &user.id, user.role).await?;

    tracing::info!(action = "sessions_revoked", user_id = %user.id, count = revoked, by = %session.user_id, "Admin revoked user sessions");

    Ok(Json(serde_json::json!({ "terminated": revoked })))
}

/// DELETE /api/ratelimit/{identifier} — Clear a rate-limit window
pub async fn reset_rate_limit(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let existed = storage::rate_limit::reset_rate_limit(&mut con, &identifier).await?;
    if !existed {
        return Err(AppError::NotFound("Rate-limit window not found".to_string()));
    }

    tracing::info!(action = "rate_limit_reset", identifier = %identifier, by = %session.user_id, "Admin cleared rate-limit window");

    Ok(StatusCode::NO_CONTENT)
}
