use crate::domain_port::*;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Writes between full sweeps for expired entries.
const PRUNE_EVERY: usize = 256;

/// In-process cache. Expired entries are dropped when read and swept out
/// periodically on write.
#[derive(Default)]
pub struct MemoryResponseCache {
    entries: DashMap<String, (Value, Instant)>,
    writes: AtomicUsize,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prune_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait::async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|entry| {
            let (value, expires_at) = entry.value();
            (*expires_at > now).then(|| value.clone())
        });
        if hit.is_none() {
            // Only drops the entry if it is still the expired one.
            self.entries
                .remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.clone(), Instant::now() + ttl));
        if self.writes.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune_expired();
        }
        Ok(())
    }
}

/// Cache backend that never stores anything.
pub struct NoopResponseCache;

#[async_trait::async_trait]
impl ResponseCache for NoopResponseCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
