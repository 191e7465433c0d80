//! Session Redis operations.
//!
//! Redis key pattern:
//! - `session:{role}:{user_id}:{session_id}` — session data (JSON)
//!
//! Sessions are TTL-bound and refreshed on activity. Each (role, user)
//! pair is capped at `role.session_limit()` concurrent sessions; the
//! over-limit create is not persisted and the caller receives the active
//! list instead, so the user can pick a session to terminate.

use crate::auth::token::generate_session_id;
use crate::models::{Role, SessionCreation, StoredSession};
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn session_key(role: Role, user_id: &str, session_id: &str) -> String {
    format!("session:{}:{}:{}", role.as_str(), user_id, session_id)
}

fn namespace_pattern(role: Role, user_id: &str) -> String {
    format!("session:{}:{}:*", role.as_str(), user_id)
}

/// Create a session for (role, user), enforcing the per-role limit.
///
/// A fresh session id is generated on every call, whether or not the
/// session is persisted. The limit check is check-then-act: two logins
/// racing for the last slot can both pass the read and transiently exceed
/// the limit by one. Accepted; the limit is a guard, not a security
/// boundary.
#[allow(clippy::too_many_arguments)]
pub async fn create_session<C>(
    con: &mut C,
    user_id: &str,
    role: Role,
    device: &str,
    ip: &str,
    user_agent: &str,
    location: Option<String>,
    ttl_secs: u64,
) -> Result<SessionCreation, redis::RedisError>
where
    C: AsyncCommands,
{
    let now = super::epoch_secs();
    let session = StoredSession {
        session_id: generate_session_id(),
        user_id: user_id.to_string(),
        role,
        device: device.to_string(),
        ip: ip.to_string(),
        location,
        user_agent: user_agent.to_string(),
        created_at: now,
        last_active_at: now,
    };

    let active = get_active_sessions(con, user_id, role).await?;
    if active.len() >= role.session_limit() {
        return Ok(SessionCreation {
            session,
            limit_exceeded: true,
            active_sessions: active,
        });
    }

    let key = session_key(role, user_id, &session.session_id);
    let json =
        serde_json::to_string(&session).map_err(|e| super::json_error("JSON serialize", e))?;
    con.set_ex::<_, _, ()>(&key, json, ttl_secs).await?;

    Ok(SessionCreation {
        session,
        limit_exceeded: false,
        active_sessions: Vec::new(),
    })
}

/// List all live sessions for (role, user), newest first.
///
/// Uses an incremental SCAN over the namespace plus one MGET; keys that
/// expire between the two calls, and values that no longer parse, are
/// silently skipped.
pub async fn get_active_sessions<C>(
    con: &mut C,
    user_id: &str,
    role: Role,
) -> Result<Vec<StoredSession>, redis::RedisError>
where
    C: AsyncCommands,
{
    let keys = super::scan_keys(con, &namespace_pattern(role, user_id)).await?;
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Option<String>> = con.mget(&keys).await?;

    let mut sessions: Vec<StoredSession> = values
        .into_iter()
        .flatten()
        .filter_map(|data| {
            let data = Zeroizing::new(data);
            serde_json::from_str(&data).ok()
        })
        .collect();

    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(sessions)
}

/// Existence check only; the stored value is not read.
pub async fn validate_session<C>(
    con: &mut C,
    session_id: &str,
    user_id: &str,
    role: Role,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = session_key(role, user_id, session_id);
    con.exists(&key).await
}

/// Delete one session. Returns true if it existed.
pub async fn invalidate_session<C>(
    con: &mut C,
    session_id: &str,
    user_id: &str,
    role: Role,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = session_key(role, user_id, session_id);
    let deleted: i32 = con.del(&key).await?;
    Ok(deleted > 0)
}

/// Delete every session in the (role, user) namespace. Returns the count.
pub async fn invalidate_all_sessions<C>(
    con: &mut C,
    user_id: &str,
    role: Role,
) -> Result<u64, redis::RedisError>
where
    C: AsyncCommands,
{
    let keys = super::scan_keys(con, &namespace_pattern(role, user_id)).await?;

    let mut removed = 0u64;
    for key in &keys {
        let deleted: i32 = con.del(key).await?;
        removed += deleted as u64;
    }
    Ok(removed)
}

/// Refresh a session's TTL without rewriting the stored value.
///
/// EXPIRE-only, so concurrent requests from the same session never race
/// on a read-modify-write of the record. Returns false if the session is
/// already gone.
pub async fn touch_session<C>(
    con: &mut C,
    session_id: &str,
    user_id: &str,
    role: Role,
    ttl_secs: u64,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = session_key(role, user_id, session_id);
    con.expire(&key, ttl_secs as i64).await
}
