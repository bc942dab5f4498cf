//! Persistent SQLite cache backend.

use crate::CacheBackend;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// Cache traffic is small keyed lookups; a handful of connections is plenty.
const POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);
// Per-connection settings that `SqliteConnectOptions` has no setter for.
const CONNECTION_PRAGMAS: &str = "PRAGMA temp_store = MEMORY; PRAGMA cache_size = -4096;";

/// Persistent cache stored in a SQLite database.
///
/// Entries outlive the process, so a restarted service starts with whatever
/// the previous one left behind. That's useful for warm starts when nothing
/// else flushes it, and harmless when something does. With a time-to-live,
/// entries older than that read as missing; they are overwritten by the next
/// write or removed by the next reset.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    ttl: Option<Duration>,
}

impl SqliteCache {
    /// Open (creating if necessary) the cache database at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Self::options().filename(path.as_ref()).create_if_missing(true), POOL_SIZE).await
    }

    /// Open a private in-memory database, gone once this cache is closed.
    ///
    /// Every pooled connection to `:memory:` would get its own empty database,
    /// so the pool is pinned to a single connection.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Losing the last few writes on power loss only costs a cache miss.
            .synchronous(SqliteSynchronous::Normal)
            // A burst of misses all writing back at once would otherwise hit
            // SQLITE_BUSY; WAL still only allows one writer.
            .busy_timeout(BUSY_TIMEOUT)
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            // Runs for every new connection, not just the first one handed out.
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(CONNECTION_PRAGMAS).execute(conn).await?;
                    Ok::<_, sqlx::Error>(())
                })
            })
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let cache = Self { pool, ttl: None };
        cache.migrate().await?;
        Ok(cache)
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Oldest `stored_at` that is still fresh, if entries can go stale.
    fn fresh_since(&self) -> Option<i64> {
        let ttl = i64::try_from(self.ttl?.as_secs()).unwrap_or(i64::MAX);
        Some(UtcDateTime::now().unix_timestamp().saturating_sub(ttl))
    }

    #[instrument("migrating cache database", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(include_str!("../queries/get_entry.sql"))
            .bind(key)
            .bind(self.fresh_since())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_entry.sql"))
            .bind(key)
            .bind(value)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_entry.sql"))
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
            .map(drop)
    }

    async fn reset(&self) -> Result<()> {
        let flushed = sqlx::query(include_str!("../queries/delete_all.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(entries = flushed.rows_affected(), "Flushed SQLite cache");
        Ok(())
    }

    /// Wait for outstanding queries, then close every connection.
    async fn close(&self) {
        // Refresh query planner statistics on the way out; failure is harmless.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_in_memory_opens_and_closes() {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        assert!(!cache.pool().is_closed());
        cache.close().await;
        assert!(cache.pool().is_closed());
    }

    #[tokio::test]
    async fn test_migrating_twice() {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        cache.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_pragmas() {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        let (cache_size,): (i64,) = sqlx::query_as("PRAGMA cache_size").fetch_one(cache.pool()).await.unwrap();
        assert_eq!(cache_size, -4096);
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"\x00\x01\x02binary\xff".as_slice())]
    #[tokio::test]
    async fn test_set_and_get(#[case] value: &[u8]) {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        cache.set("id/apiSpec.json/apiSpec", value).await.unwrap();
        assert_eq!(cache.get("id/apiSpec.json/apiSpec").await.unwrap(), Some(value.to_vec()));
        assert_eq!(cache.get("id/apiSpec.json/openApiSpec").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_delete_reset() {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        cache.set("a", b"one").await.unwrap();
        cache.set("a", b"two").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(b"two".to_vec()));

        cache.delete("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        cache.delete("a").await.unwrap();

        cache.set("b", b"one").await.unwrap();
        cache.set("c", b"two").await.unwrap();
        cache.reset().await.unwrap();
        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_entries_read_as_missing() {
        let cache = SqliteCache::connect_in_memory().await.unwrap();
        cache.set("old", b"one").await.unwrap();
        sqlx::query("UPDATE entries SET stored_at = 0").execute(cache.pool()).await.unwrap();
        cache.set("new", b"two").await.unwrap();
        assert_eq!(cache.get("old").await.unwrap(), Some(b"one".to_vec()));

        let cache = cache.with_ttl(Some(Duration::from_secs(60)));
        assert_eq!(cache.get("old").await.unwrap(), None);
        assert_eq!(cache.get("new").await.unwrap(), Some(b"two".to_vec()));
        // Rewriting refreshes it.
        cache.set("old", b"three").await.unwrap();
        assert_eq!(cache.get("old").await.unwrap(), Some(b"three".to_vec()));
    }

    #[tokio::test]
    async fn test_entries_survive_reconnect() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");
        let cache = SqliteCache::connect(&path).await.unwrap();
        cache.set("a", b"persisted").await.unwrap();
        cache.close().await;

        let cache = SqliteCache::connect(&path).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), Some(b"persisted".to_vec()));
        cache.close().await;
    }
}
