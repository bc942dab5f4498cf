use crate::CacheBackend;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Bounded in-memory cache.
///
/// Capacity is measured in bytes (key plus value), so a handful of enormous
/// OpenAPI documents can't crowd out memory. Least-recently-used entries are
/// evicted first. An optional time-to-live caps staleness for deployments
/// whose blob store can't push change notifications.
#[derive(Clone)]
pub struct MokaCache {
    entries: Cache<String, Arc<Vec<u8>>>,
    capacity: u64,
}

impl MokaCache {
    pub fn new(capacity_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(capacity_bytes)
            .weigher(|key: &String, value: &Arc<Vec<u8>>| Self::weight(key, value));
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self { entries: builder.build(), capacity: capacity_bytes }
    }

    fn weight(key: &str, value: &[u8]) -> u32 {
        u32::try_from(key.len() + value.len()).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl CacheBackend for MokaCache {
    fn name(&self) -> &str {
        "moka"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).await.map(|value| value.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        // Moka silently refuses entries that could never fit; say so instead.
        if u64::from(Self::weight(key, value)) > self.capacity {
            exn::bail!(ErrorKind::InvalidData("entry larger than cache capacity"));
        }
        self.entries.insert(key.to_string(), Arc::new(value.to_vec())).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }
}
