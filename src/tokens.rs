use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

pub const TOKEN_LENGTH: usize = 30;

/// Opaque token shared by the confirm, unsubscribe and privacy flows.
/// Alphanumeric to stay URL-safe without encoding.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();

    std::iter::repeat_with(|| rng.sample(rand::distributions::Alphanumeric))
        .map(char::from)
        .take(TOKEN_LENGTH)
        .collect()
}

#[derive(thiserror::Error, Debug)]
pub enum TokenStoreError {
    #[error("Failed to talk to the token store.")]
    Redis(#[from] redis::RedisError),
}

/// Short-lived single-use token storage. `take` deletes on read: a consumed
/// token can never authorize a second action.
pub trait TokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenStoreError>;
    async fn take(&self, key: &str) -> Result<Option<String>, TokenStoreError>;
}

pub struct RedisTokenStore {
    client: redis::Client,
    namespace: String,
}

impl RedisTokenStore {
    pub fn new(client: redis::Client, namespace: String) -> RedisTokenStore {
        RedisTokenStore { client, namespace }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:token:{}", self.namespace, key)
    }
}

impl TokenStore for RedisTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenStoreError> {
        let mut redis_conn = self.client.get_tokio_connection().await?;

        redis::cmd("SET")
            .arg(self.storage_key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, ()>(&mut redis_conn)
            .await?;

        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        let mut redis_conn = self.client.get_tokio_connection().await?;

        let value: Option<String> = redis::cmd("GETDEL")
            .arg(self.storage_key(key))
            .query_async(&mut redis_conn)
            .await?;

        Ok(value)
    }
}

/// Test double with the same single-use semantics.
#[derive(Default)]
pub struct InMemoryTokenStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryTokenStore {
    pub fn new() -> InMemoryTokenStore {
        InMemoryTokenStore::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), TokenStoreError> {
        let mut entries = self.entries.lock().unwrap();

        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));

        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        let mut entries = self.entries.lock().unwrap();

        match entries.remove(key) {
            Some((value, expires_at)) if expires_at > Instant::now() => Ok(Some(value)),
            _ => Ok(None),
        }
    }
}
