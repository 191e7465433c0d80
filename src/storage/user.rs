//! User credential Redis operations.
//!
//! Redis key patterns:
//! - `user:{id}` — user record (JSON)
//! - `email:{email}` — email lookup to user id (STRING)
//!
//! User records are permanent (no TTL); account lifecycle is explicit
//! admin action, unlike sessions and reset tokens which age out.

use crate::models::{Role, StoredUser};
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

/// Store a user record plus its email lookup key.
pub async fn store_user<C>(con: &mut C, user: &StoredUser) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let json = serde_json::to_string(user).map_err(|e| super::json_error("JSON serialize", e))?;

    con.set::<_, _, ()>(user_key(&user.id), json).await?;
    con.set::<_, _, ()>(email_key(&user.email), &user.id).await?;

    Ok(())
}

/// Get a user by id.
pub async fn get_user<C>(con: &mut C, id: &str) -> Result<Option<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(user_key(id)).await?;
    match json {
        Some(data) => {
            // The record carries a password hash; clear the intermediate copy
            let data = Zeroizing::new(data);
            let user = serde_json::from_str(&data)
                .map_err(|e| super::json_error("JSON deserialize", e))?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Get a user by email.
///
/// Performs a two-step lookup: email -> user_id -> user data.
pub async fn get_user_by_email<C>(
    con: &mut C,
    email: &str,
) -> Result<Option<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let user_id: Option<String> = con.get(email_key(email)).await?;
    match user_id {
        Some(id) => get_user(con, &id).await,
        None => Ok(None),
    }
}

/// Delete a user and their email lookup key.
/// Returns the deleted record so the caller can clean up their sessions.
pub async fn delete_user<C>(con: &mut C, id: &str) -> Result<Option<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let user = get_user(con, id).await?;

    con.del::<_, ()>(user_key(id)).await?;
    if let Some(user) = &user {
        con.del::<_, ()>(email_key(&user.email)).await?;
    }

    Ok(user)
}

/// List all users.
///
/// Scans for keys matching `user:*` and deserializes each; records that
/// no longer parse are skipped.
pub async fn list_users<C>(con: &mut C) -> Result<Vec<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let mut users = Vec::new();
    let keys = super::scan_keys(con, "user:*").await?;

    for key in keys {
        let json: Option<String> = con.get(&key).await?;
        if let Some(data) = json {
            let data = Zeroizing::new(data);
            if let Ok(user) = serde_json::from_str::<StoredUser>(&data) {
                users.push(user);
            }
        }
    }

    Ok(users)
}

/// Replace a user's password hash. Returns false if the user is missing.
pub async fn update_password<C>(
    con: &mut C,
    id: &str,
    password_hash: &str,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let Some(mut user) = get_user(con, id).await? else {
        return Ok(false);
    };

    user.password_hash = password_hash.to_string();
    store_user(con, &user).await?;
    Ok(true)
}

/// Upsert the bootstrap super-admin under the fixed id `admin`.
///
/// Called at startup; keeps any previously stored created_at irrelevant
/// by always rewriting the record from the environment.
pub async fn upsert_admin<C>(
    con: &mut C,
    email: &str,
    full_name: &str,
    password_hash: &str,
) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let user = StoredUser {
        id: "admin".to_string(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        avatar_link: None,
        role: Role::SuperAdmin,
        password_hash: password_hash.to_string(),
        created_at: super::epoch_secs(),
    };

    store_user(con, &user).await
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Connect to the test Redis, or None to skip.
    async fn test_connection() -> Option<redis::aio::MultiplexedConnection> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let client = match redis::Client::open(url) {
            Ok(c) => c,
            Err(_) => {
                eprintln!("Skipping test: Redis not available");
                return None;
            }
        };
        match client.get_multiplexed_async_connection().await {
            Ok(con) => Some(con),
            Err(_) => {
                eprintln!("Skipping test: Redis connection failed");
                None
            }
        }
    }

    fn test_user(suffix: &str) -> StoredUser {
        StoredUser {
            id: format!("user-test-{}", suffix),
            email: format!("{}@example.com", suffix),
            full_name: "Test User".to_string(),
            avatar_link: None,
            role: Role::User,
            password_hash: "$argon2id$fake".to_string(),
            created_at: crate::storage::epoch_secs(),
        }
    }

    #[tokio::test]
    async fn test_store_get_delete() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let user = test_user(&nanoid::nanoid!(8));

        store_user(&mut con, &user).await.unwrap();

        let by_id = get_user(&mut con, &user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, user.email);

        let by_email = get_user_by_email(&mut con, &user.email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let deleted = delete_user(&mut con, &user.id).await.unwrap();
        assert!(deleted.is_some());
        assert!(get_user(&mut con, &user.id).await.unwrap().is_none());
        assert!(get_user_by_email(&mut con, &user.email)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_email_is_none() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let missing = format!("missing-{}@example.com", nanoid::nanoid!(8));
        assert!(get_user_by_email(&mut con, &missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let user = test_user(&nanoid::nanoid!(8));
        store_user(&mut con, &user).await.unwrap();

        assert!(update_password(&mut con, &user.id, "$argon2id$new")
            .await
            .unwrap());
        let reloaded = get_user(&mut con, &user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "$argon2id$new");

        assert!(!update_password(&mut con, "user-test-missing", "$x")
            .await
            .unwrap());

        delete_user(&mut con, &user.id).await.unwrap();
    }
}
