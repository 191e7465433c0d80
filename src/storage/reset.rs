//! Password-reset token Redis operations.
//!
//! Redis key pattern:
//! - `resettoken:{role}:{suffix}` — token data (JSON)
//!
//! Tokens are single-use: deleted immediately after a successful password
//! change. Issuing a new token does not revoke earlier ones; each is
//! independently TTL-bound. The role prefix travels in the token string
//! itself, so validation recovers the role without any extra lookup.

use crate::auth::token::{compose_reset_token, generate_reset_suffix, parse_reset_token};
use crate::models::{Role, StoredResetToken};
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn reset_key(role: Role, suffix: &str) -> String {
    format!("resettoken:{}:{}", role.as_str(), suffix)
}

/// Issue a reset token for a user and store its record with TTL.
///
/// Returns the full prefixed token to hand to the user (e.g. embedded in
/// an emailed link). Only the random suffix is part of the storage key.
pub async fn generate_reset_token<C>(
    con: &mut C,
    user_id: &str,
    email: &str,
    role: Role,
    ttl_secs: u64,
) -> Result<String, redis::RedisError>
where
    C: AsyncCommands,
{
    let suffix = generate_reset_suffix();
    let record = StoredResetToken {
        user_id: user_id.to_string(),
        email: email.to_string(),
        created_at: super::epoch_secs(),
    };

    let json =
        serde_json::to_string(&record).map_err(|e| super::json_error("JSON serialize", e))?;
    con.set_ex::<_, _, ()>(reset_key(role, &suffix), json, ttl_secs)
        .await?;

    Ok(compose_reset_token(role, &suffix))
}

/// Look up a prefixed token's record.
///
/// None for a malformed token, an unknown prefix, or a missing/expired
/// record; the cases are indistinguishable so the response never leaks
/// which part failed.
pub async fn validate_reset_token<C>(
    con: &mut C,
    token: &str,
) -> Result<Option<(StoredResetToken, Role)>, redis::RedisError>
where
    C: AsyncCommands,
{
    let Some((role, suffix)) = parse_reset_token(token) else {
        return Ok(None);
    };

    let json: Option<String> = con.get(reset_key(role, suffix)).await?;
    match json {
        Some(data) => {
            let data = Zeroizing::new(data);
            let record = serde_json::from_str(&data)
                .map_err(|e| super::json_error("JSON deserialize", e))?;
            Ok(Some((record, role)))
        }
        None => Ok(None),
    }
}

/// Delete a token's record; called after a successful password change.
/// Returns true if the record existed. Malformed tokens report false.
pub async fn invalidate_reset_token<C>(con: &mut C, token: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let Some((role, suffix)) = parse_reset_token(token) else {
        return Ok(false);
    };

    let deleted: i32 = con.del(reset_key(role, suffix)).await?;
    Ok(deleted > 0)
}
