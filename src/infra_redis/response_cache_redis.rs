use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::time::Duration;

/// Payloads are stored as their JSON text under `{prefix}:{key}`; Redis
/// handles expiry.
pub struct RedisResponseCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisResponseCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisResponseCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl ResponseCache for RedisResponseCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        raw.map(|text| serde_json::from_str(&text).map_err(|e| CacheError::Payload(e.to_string())))
            .transpose()
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let text = serde_json::to_string(value).map_err(|e| CacheError::Payload(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(key), text, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }
}
