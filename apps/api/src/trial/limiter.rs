//! Trial rate limiting — Redis fixed-window counter keyed by client IP and
//! session, bounding cover-letter generations for anonymous users.

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::errors::AppError;

/// Complete trial generations allowed per window.
pub const TRIAL_MAX_GENERATIONS: i64 = 5;

/// Window length: 24 hours.
pub const TRIAL_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Counter key for one client's generation window.
pub fn generation_key(ip: &str, session_id: Uuid) -> String {
    format!("trial:generate:{ip}:{session_id}")
}

/// Rounds a TTL up to whole hours for the 429 response.
pub fn hours_remaining(ttl_secs: i64) -> i64 {
    if ttl_secs <= 0 {
        return 0;
    }
    (ttl_secs + 3599) / 3600
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one invocation against `key`; errors with `RateLimited` once
    /// the window budget is spent.
    async fn check(&self, key: &str) -> Result<(), AppError>;
}

pub struct RedisRateLimiter {
    client: redis::Client,
    max: i64,
    window_secs: i64,
}

impl RedisRateLimiter {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            max: TRIAL_MAX_GENERATIONS,
            window_secs: TRIAL_WINDOW_SECS,
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let count: i64 = conn.incr(key, 1i64).await?;
        if count == 1 {
            // First hit opens the window.
            let _: i64 = conn.expire(key, self.window_secs).await?;
        }

        if count > self.max {
            let ttl: i64 = conn.ttl(key).await?;
            return Err(AppError::RateLimited {
                retry_after_hours: hours_remaining(ttl),
            });
        }
        Ok(())
    }
}
