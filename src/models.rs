//! Request, response, and storage models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent Redis data structures.

use serde::{Deserialize, Serialize};

// ============================================================================
// Stakeholder Roles
// ============================================================================

/// Stakeholder role types.
///
/// Each role has its own session limit, reset-token prefix, and cookie
/// namespace. Adding a role means extending every match below, which the
/// compiler enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Maximum concurrent sessions for this role.
    pub fn session_limit(&self) -> usize {
        match self {
            Role::User => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 2,
        }
    }

    /// Three-letter prefix embedded in password-reset tokens so the role
    /// can be recovered from the token string alone.
    pub fn reset_token_prefix(&self) -> &'static str {
        match self {
            Role::User => "usr",
            Role::Admin => "adm",
            Role::SuperAdmin => "sup",
        }
    }

    /// Cookie name carrying this role's bearer token.
    pub fn cookie_name(&self) -> &'static str {
        match self {
            Role::User => "turnstile_user",
            Role::Admin => "turnstile_admin",
            Role::SuperAdmin => "turnstile_super",
        }
    }

    /// Recover a role from a reset-token prefix. None for unknown prefixes.
    pub fn from_reset_prefix(prefix: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| role.reset_token_prefix() == prefix)
    }

    /// True for roles allowed to use the admin API.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// ============================================================================
// Storage Models
// ============================================================================

/// Session data as stored in Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
    pub device: String,
    pub ip: String,
    pub location: Option<String>,
    pub user_agent: String,
    pub created_at: u64,
    pub last_active_at: u64,
}

/// Result of a session-creation attempt.
///
/// `session` always carries a freshly generated session id, whether or not
/// it was persisted. When `limit_exceeded` is true nothing was written and
/// `active_sessions` holds the full current list so the caller can offer
/// the user a session to terminate.
#[derive(Debug, Clone)]
pub struct SessionCreation {
    pub session: StoredSession,
    pub limit_exceeded: bool,
    pub active_sessions: Vec<StoredSession>,
}

/// Password-reset token data as stored in Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResetToken {
    pub user_id: String,
    pub email: String,
    pub created_at: u64,
}

/// User credential record as stored in Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub avatar_link: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub created_at: u64,
}

// ============================================================================
// Rate Limiting
// ============================================================================

/// Sliding-window parameters for one class of requests.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u64,
}

/// Outcome of a rate-limit consume or probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the current window after this call.
    pub remaining: u64,
    /// Epoch millis at which the oldest window entry ages out.
    pub reset_at_ms: u64,
    /// Seconds to wait before retrying; set only when denied, minimum 1.
    pub retry_after_secs: Option<u64>,
}

// ============================================================================
// Auth Models
// ============================================================================

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Device class (e.g. "web", "mobile"). Defaults to "web".
    pub device: Option<String>,
    /// Optional human-readable location label supplied by the client.
    pub location: Option<String>,
}

/// Session view returned to clients.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub device: String,
    pub ip: String,
    pub location: Option<String>,
    pub user_agent: String,
    pub created_at: u64,
    pub last_active_at: u64,
    /// True when this entry is the session making the request.
    pub current: bool,
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub session: SessionInfo,
}

/// 409 body when the per-role session limit is reached at login.
#[derive(Debug, Serialize)]
pub struct SessionLimitResponse {
    pub error: String,
    pub active_sessions: Vec<SessionInfo>,
}

/// Request to issue a password-reset token.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Response carrying a freshly issued reset token.
///
/// Dispatching the token to the user (e.g. an emailed link) is the
/// caller's job; this service never sends mail.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset_token: String,
    pub expires_in_secs: u64,
}

/// Request to complete a password reset.
#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

// ============================================================================
// Admin Models
// ============================================================================

/// Request to create a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    pub avatar_link: Option<String>,
}

/// User info for admin listing.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub avatar_link: Option<String>,
    pub role: Role,
    pub created_at: u64,
}

impl From<StoredUser> for UserInfo {
    fn from(user: StoredUser) -> Self {
        UserInfo {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            avatar_link: user.avatar_link,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
