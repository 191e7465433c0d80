//! Auth API endpoints.

use crate::auth::jwt::{sign_jwt, JwtPayload};
use crate::auth::middleware::{AppState, AuthSession};
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::{
    LoginRequest, LoginResponse, RateLimitConfig, ResetConfirmRequest, ResetRequest,
    ResetResponse, Role, SessionInfo, SessionLimitResponse, StoredSession,
};
use crate::storage;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

fn session_info(session: StoredSession, current_id: &str) -> SessionInfo {
    SessionInfo {
        current: session.session_id == current_id,
        session_id: session.session_id,
        device: session.device,
        ip: session.ip,
        location: session.location,
        user_agent: session.user_agent,
        created_at: session.created_at,
        last_active_at: session.last_active_at,
    }
}

/// Role cookie carrying the freshly minted JWT.
fn session_cookie(role: Role, token: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        role.cookie_name(),
        token,
        max_age_secs
    )
}

/// Expired cookie clearing the role's namespace.
fn clear_cookie(role: Role) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        role.cookie_name()
    )
}

/// Consume one attempt from the per-IP window; 429 when over.
async fn enforce_ip_limit<C>(
    con: &mut C,
    scope: &str,
    ip: std::net::IpAddr,
    cfg: &RateLimitConfig,
) -> Result<(), AppError>
where
    C: redis::AsyncCommands,
{
    let identifier = format!("{}:{}", scope, ip);
    let result = storage::rate_limit::consume_rate_limit(con, &identifier, cfg).await?;

    if !result.allowed {
        let mut hasher = std::hash::DefaultHasher::new();
        ip.hash(&mut hasher);
        let ip_hash = format!("{:x}", hasher.finish());
        tracing::warn!(action = "rate_limited", scope = %scope, ip_hash = %ip_hash, "Rate limit exceeded");
        return Err(AppError::RateLimited {
            retry_after_secs: result.retry_after_secs.unwrap_or(1),
        });
    }
    Ok(())
}

/// POST /api/auth/login — Verify credentials and create a session
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let limit = RateLimitConfig {
        window_ms: state.config.rate_limit_window_ms,
        max_requests: state.config.rate_limit_auth_max,
    };
    enforce_ip_limit(&mut con, "auth", addr.ip(), &limit).await?;

    // Same message for unknown email and wrong password
    let user = storage::user::get_user_by_email(&mut con, &req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))?;
    if !valid {
        tracing::warn!(action = "auth_failed", user_id = %user.id, "Invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let device = req.device.as_deref().unwrap_or("web");
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let created = storage::session::create_session(
        &mut con,
        &user.id,
        user.role,
        device,
        &addr.ip().to_string(),
        user_agent,
        req.location,
        state.config.session_ttl_secs,
    )
    .await?;

    if created.limit_exceeded {
        // Credentials were fine; the caller gets the active list so the
        // user can terminate a session and retry.
        tracing::info!(action = "session_limit", user_id = %user.id, role = %user.role, "Concurrent session limit reached");
        let body = SessionLimitResponse {
            error: "Concurrent session limit reached".to_string(),
            active_sessions: created
                .active_sessions
                .into_iter()
                .map(|s| session_info(s, ""))
                .collect(),
        };
        return Ok((StatusCode::CONFLICT, Json(body)).into_response());
    }

    let session = created.session;
    let token = sign_jwt(
        &state.config.jwt_secret,
        JwtPayload {
            user_id: user.id.clone(),
            full_name: user.full_name.clone(),
            avatar_link: user.avatar_link.clone(),
            role: user.role,
            session_id: session.session_id.clone(),
        },
        state.config.session_ttl_secs,
    )
    .map_err(|e| AppError::Internal(format!("JWT signing error: {}", e)))?;

    tracing::info!(action = "login", user_id = %user.id, role = %user.role, device = %device, "User logged in");

    let cookie = session_cookie(user.role, &token, state.config.session_ttl_secs);
    let current_id = session.session_id.clone();
    let body = LoginResponse {
        token,
        session: session_info(session, &current_id),
    };

    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/auth/logout — Invalidate current session
pub async fn logout(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    storage::session::invalidate_session(&mut con, &session.session_id, &session.user_id, session.role)
        .await?;

    tracing::info!(action = "logout", user_id = %session.user_id, "User logged out");

    Ok((
        [(SET_COOKIE, clear_cookie(session.role))],
        StatusCode::NO_CONTENT,
    ))
}

/// GET /api/auth/sessions — List the caller's active sessions
pub async fn list_sessions(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let active =
        storage::session::get_active_sessions(&mut con, &session.user_id, session.role).await?;

    let infos: Vec<SessionInfo> = active
        .into_iter()
        .map(|s| session_info(s, &session.session_id))
        .collect();

    Ok(Json(infos))
}

/// DELETE /api/auth/sessions/{id} — Terminate one of the caller's sessions
pub async fn terminate_session(
    session: AuthSession,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    super::validate_token_id(&session_id, "session id")?;

    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let deleted = storage::session::invalidate_session(
        &mut con,
        &session_id,
        &session.user_id,
        session.role,
    )
    .await?;
    if !deleted {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    tracing::info!(action = "session_terminated", user_id = %session.user_id, "Session terminated");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/reset — Issue a password-reset token
///
/// The token is returned to the caller; delivering it to the user (an
/// emailed link, typically) is the caller's responsibility.
pub async fn request_reset(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let limit = RateLimitConfig {
        window_ms: state.config.rate_limit_window_ms,
        max_requests: state.config.rate_limit_reset_max,
    };
    enforce_ip_limit(&mut con, "reset", addr.ip(), &limit).await?;

    let user = storage::user::get_user_by_email(&mut con, &req.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let token = storage::reset::generate_reset_token(
        &mut con,
        &user.id,
        &user.email,
        user.role,
        state.config.reset_token_ttl_secs,
    )
    .await?;

    tracing::info!(action = "reset_requested", user_id = %user.id, role = %user.role, "Password reset token issued");

    Ok(Json(ResetResponse {
        reset_token: token,
        expires_in_secs: state.config.reset_token_ttl_secs,
    }))
}

/// POST /api/auth/reset/confirm — Complete a password reset
///
/// Burns the token, replaces the password, and revokes every session of
/// the user so stolen sessions die with the old password.
pub async fn confirm_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let mut con = state
        .redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))?;

    let (record, role) = storage::reset::validate_reset_token(&mut con, &req.token)
        .await?
        .ok_or_else(|| AppError::NotFound("Reset token not found or expired".to_string()))?;

    let hash = hash_password(&req.new_password)
        .map_err(|e| AppError::Internal(format!("Password hashing error: {}", e)))?;

    let updated = storage::user::update_password(&mut con, &record.user_id, &hash).await?;
    if !updated {
        // Account deleted after the token was issued
        return Err(AppError::NotFound("User not found".to_string()));
    }

    // Single use: the token dies with the password change
    storage::reset::invalidate_reset_token(&mut con, &req.token).await?;
    let revoked =
        storage::session::invalidate_all_sessions(&mut con, &record.user_id, role).await?;

    tracing::info!(action = "password_reset", user_id = %record.user_id, sessions_revoked = revoked, "Password changed via reset token");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password updated"
    })))
}
