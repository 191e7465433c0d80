//! Sliding-window rate limiting over Redis sorted sets.
//!
//! Redis key pattern:
//! - `ratelimit:{identifier}` — ZSET, score = request epoch millis,
//!   member = `{millis}-{nonce}` (unique per attempt)
//!
//! A consume runs trim, count, add, and expiry refresh as one MULTI/EXEC
//! pipeline, so concurrent callers cannot both observe an under-limit
//! count from a stale window. The add happens before the limit decision;
//! an over-limit add is rolled back synchronously in the same call, which
//! keeps the check-and-add atomic in a single round trip instead of a
//! racy pre-check.

use crate::models::{RateLimitConfig, RateLimitResult};
use redis::AsyncCommands;

fn window_key(identifier: &str) -> String {
    format!("ratelimit:{}", identifier)
}

/// Oldest surviving entry's score, if any.
async fn oldest_entry_ms<C>(con: &mut C, key: &str) -> Result<Option<u64>, redis::RedisError>
where
    C: AsyncCommands,
{
    let oldest: Vec<(String, u64)> = con.zrange_withscores(key, 0, 0).await?;
    Ok(oldest.into_iter().next().map(|(_, score)| score))
}

/// Record one request attempt against `identifier` and report whether it
/// is allowed under `cfg`.
pub async fn consume_rate_limit<C>(
    con: &mut C,
    identifier: &str,
    cfg: &RateLimitConfig,
) -> Result<RateLimitResult, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = window_key(identifier);
    let now_ms = super::epoch_millis();
    let cutoff = now_ms.saturating_sub(cfg.window_ms);
    let member = format!("{}-{}", now_ms, nanoid::nanoid!(8));

    // Trim aged entries, read the pre-add count, add this attempt, and
    // refresh the key expiry, atomically.
    let (count,): (u64,) = redis::pipe()
        .atomic()
        .zrembyscore(&key, 0, cutoff)
        .ignore()
        .zcard(&key)
        .zadd(&key, &member, now_ms)
        .ignore()
        .pexpire(&key, cfg.window_ms as i64)
        .ignore()
        .query_async(con)
        .await?;

    if count >= cfg.max_requests {
        // Over limit: remove the entry we just added so the window count
        // invariant holds.
        con.zrem::<_, _, ()>(&key, &member).await?;

        let reset_at_ms = match oldest_entry_ms(con, &key).await? {
            Some(oldest) => oldest + cfg.window_ms,
            None => now_ms + cfg.window_ms,
        };
        let retry_after_secs = reset_at_ms.saturating_sub(now_ms).div_ceil(1000).max(1);

        return Ok(RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_at_ms,
            retry_after_secs: Some(retry_after_secs),
        });
    }

    Ok(RateLimitResult {
        allowed: true,
        remaining: cfg.max_requests - count - 1,
        reset_at_ms: now_ms + cfg.window_ms,
        retry_after_secs: None,
    })
}

/// Non-consuming probe: trim and count, never add.
///
/// Repeated probes leave a later consume's outcome unchanged.
pub async fn check_rate_limit<C>(
    con: &mut C,
    identifier: &str,
    cfg: &RateLimitConfig,
) -> Result<RateLimitResult, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = window_key(identifier);
    let now_ms = super::epoch_millis();
    let cutoff = now_ms.saturating_sub(cfg.window_ms);

    let (count,): (u64,) = redis::pipe()
        .atomic()
        .zrembyscore(&key, 0, cutoff)
        .ignore()
        .zcard(&key)
        .query_async(con)
        .await?;

    let reset_at_ms = match oldest_entry_ms(con, &key).await? {
        Some(oldest) => oldest + cfg.window_ms,
        None => now_ms + cfg.window_ms,
    };

    Ok(RateLimitResult {
        allowed: count < cfg.max_requests,
        remaining: cfg.max_requests.saturating_sub(count),
        reset_at_ms,
        retry_after_secs: None,
    })
}

/// Delete the whole window (administrative override).
/// Returns true if a window existed.
pub async fn reset_rate_limit<C>(
    con: &mut C,
    identifier: &str,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let deleted: i32 = con.del(window_key(identifier)).await?;
    Ok(deleted > 0)
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

    fn test_id() -> String {
        format!("test:{}", nanoid::nanoid!(8))
    }

    const CFG: RateLimitConfig = RateLimitConfig {
        window_ms: 60_000,
        max_requests: 5,
    };

    #[tokio::test]
    async fn test_consume_counts_down_then_denies() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let id = test_id();

        for expected_remaining in [4u64, 3, 2, 1, 0] {
            let result = consume_rate_limit(&mut con, &id, &CFG).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, expected_remaining);
            assert!(result.retry_after_secs.is_none());
        }

        let denied = consume_rate_limit(&mut con, &id, &CFG).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        let retry = denied.retry_after_secs.unwrap();
        assert!((1..=60).contains(&retry));

        // The rolled-back attempt must not linger in the window
        let probe = check_rate_limit(&mut con, &id, &CFG).await.unwrap();
        assert!(!probe.allowed);
        assert_eq!(probe.remaining, 0);

        reset_rate_limit(&mut con, &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_is_a_pure_probe() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let id = test_id();

        for _ in 0..10 {
            let probe = check_rate_limit(&mut con, &id, &CFG).await.unwrap();
            assert!(probe.allowed);
            assert_eq!(probe.remaining, CFG.max_requests);
        }

        // Probing consumed nothing: the first real consume still sees a
        // full window.
        let result = consume_rate_limit(&mut con, &id, &CFG).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, CFG.max_requests - 1);

        reset_rate_limit(&mut con, &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_window_slides() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let id = test_id();
        let cfg = RateLimitConfig {
            window_ms: 500,
            max_requests: 2,
        };

        for _ in 0..2 {
            assert!(consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);
        }
        assert!(!consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);

        // Past the window the old entries age out
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        let result = consume_rate_limit(&mut con, &id, &cfg).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 1);

        reset_rate_limit(&mut con, &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let id = test_id();
        let cfg = RateLimitConfig {
            window_ms: 60_000,
            max_requests: 1,
        };

        assert!(consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);
        assert!(!consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);

        assert!(reset_rate_limit(&mut con, &id).await.unwrap());
        // Resetting a missing window reports false
        assert!(!reset_rate_limit(&mut con, &id).await.unwrap());

        assert!(consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);

        reset_rate_limit(&mut con, &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_after_has_floor_of_one_second() {
        let Some(mut con) = test_connection().await else {
            return;
        };
        let id = test_id();
        let cfg = RateLimitConfig {
            window_ms: 100,
            max_requests: 1,
        };

        assert!(consume_rate_limit(&mut con, &id, &cfg).await.unwrap().allowed);
        let denied = consume_rate_limit(&mut con, &id, &cfg).await.unwrap();
        assert!(!denied.allowed);
        // Window is 100ms but retryAfter never reports below 1s
        assert_eq!(denied.retry_after_secs, Some(1));

        reset_rate_limit(&mut con, &id).await.unwrap();
    }
}
