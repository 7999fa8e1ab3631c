//! In-process TTL cache backing [`BaseCache`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::BaseCache;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Concurrent key/value cache with per-entry expiry.
///
/// Expired entries are dropped lazily on read and opportunistically on write.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BaseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.cleanup_expired();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}
