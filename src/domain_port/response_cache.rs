use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache payload error: {0}")]
    Payload(String),
}

/// Get/set-with-TTL store for proxied JSON payloads.
///
/// Expiry is enforced by the backend; entries are never deleted explicitly.
#[async_trait::async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;
}
