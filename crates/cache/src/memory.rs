use crate::CacheBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Unbounded in-memory cache.
///
/// Entries are stored in a `HashMap` behind a [`RwLock`]. Nothing is ever
/// evicted except by [`delete()`](CacheBackend::delete) and
/// [`reset()`](CacheBackend::reset), which is fine when the set of documents
/// is small and invalidation is frequent.
///
/// # Examples
///
/// ```
/// use speccy_cache::{CacheBackend, MemoryCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = MemoryCache::default();
/// cache.set("orders/apiSpec.json/apiSpec", b"...").await?;
/// assert!(cache.get("orders/apiSpec.json/apiSpec").await?.is_some());
/// cache.reset().await?;
/// assert!(cache.get("orders/apiSpec.json/apiSpec").await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
