use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::HttpRequest;

use crate::config::QuotaSettings;

/// Fallback key when no client address can be determined; those requests all
/// share one bucket.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allow,
    Limited,
}

impl LimitDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, LimitDecision::Limited)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LimiterError {
    #[error("Failed to talk to the rate limit store.")]
    Redis(#[from] redis::RedisError),
}

/// Fixed-window limiter: at most `max_requests` per `window_secs` per key.
pub trait Limiter {
    async fn check(&self, key: &str) -> Result<LimitDecision, LimiterError>;
}

/// Redis-backed fixed window. Counters live under
/// `{namespace}:rate:{name}:{key}:{window_bucket}` and expire with the window,
/// so an idle key costs nothing.
pub struct RedisFixedWindowLimiter {
    client: redis::Client,
    namespace: String,
    name: String,
    quota: QuotaSettings,
}

impl RedisFixedWindowLimiter {
    pub fn new(
        client: redis::Client,
        namespace: String,
        name: &str,
        quota: QuotaSettings,
    ) -> RedisFixedWindowLimiter {
        RedisFixedWindowLimiter {
            client,
            namespace,
            name: name.to_string(),
            quota,
        }
    }

    fn window_bucket(&self) -> u64 {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock is set before the unix epoch")
            .as_secs();

        now_secs / self.quota.window_secs
    }
}

impl Limiter for RedisFixedWindowLimiter {
    #[tracing::instrument(name = "Checking rate limit", skip(self), fields(limiter = %self.name))]
    async fn check(&self, key: &str) -> Result<LimitDecision, LimiterError> {
        let mut redis_conn = self.client.get_tokio_connection().await?;
        let storage_key = format!(
            "{}:rate:{}:{}:{}",
            self.namespace,
            self.name,
            key,
            self.window_bucket()
        );

        let count: u32 = redis::cmd("INCR")
            .arg(&storage_key)
            .query_async(&mut redis_conn)
            .await?;

        if count == 1 {
            // First hit of the window owns the key; make it disappear with it
            redis::cmd("EXPIRE")
                .arg(&storage_key)
                .arg(self.quota.window_secs)
                .query_async::<_, ()>(&mut redis_conn)
                .await?;
        }

        if count > self.quota.max_requests {
            tracing::warn!(limiter = %self.name, key = %key, count, "Rate limit exceeded");
            return Ok(LimitDecision::Limited);
        }

        Ok(LimitDecision::Allow)
    }
}

/// Test double with the same window arithmetic, minus the network.
pub struct InMemoryLimiter {
    quota: QuotaSettings,
    counters: Mutex<HashMap<String, (u64, u32)>>,
}

impl InMemoryLimiter {
    pub fn new(quota: QuotaSettings) -> InMemoryLimiter {
        InMemoryLimiter {
            quota,
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn window_bucket(&self) -> u64 {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock is set before the unix epoch")
            .as_secs();

        now_secs / self.quota.window_secs
    }
}

impl Limiter for InMemoryLimiter {
    async fn check(&self, key: &str) -> Result<LimitDecision, LimiterError> {
        let bucket = self.window_bucket();
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((bucket, 0));

        if entry.0 != bucket {
            *entry = (bucket, 0);
        }

        entry.1 += 1;

        if entry.1 > self.quota.max_requests {
            return Ok(LimitDecision::Limited);
        }

        Ok(LimitDecision::Allow)
    }
}

/// Client identity for rate limiting: first `X-Forwarded-For` entry, then the
/// peer address, then the anonymous sentinel.
pub fn client_ip(request: &HttpRequest) -> String {
    let forwarded_for = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if let Some(ip) = forwarded_for {
        return ip;
    }

    request
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}
