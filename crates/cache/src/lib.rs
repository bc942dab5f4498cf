//! Byte-oriented key/value cache backends.
//!
//! The cache is never the source of truth: everything in it can be rebuilt
//! from the blob store, and the layer above throws the whole lot away whenever
//! it hears that something changed. Backends therefore only need to be fast,
//! safe to share between tasks, and honest about failures.
//!
//! # Backends
//! - [`MemoryCache`]: unbounded `HashMap`, lives and dies with the process.
//! - [`MokaCache`]: bounded by total bytes, optional time-to-live.
//! - [`SqliteCache`]: persistent, optional time-to-live; survives restarts
//!   (which is exactly why the layer above flushes it on startup).

mod db;
pub mod error;
mod lru;
mod memory;

pub use crate::db::SqliteCache;
pub use crate::lru::MokaCache;
pub use crate::memory::MemoryCache;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type CacheHandle = Arc<dyn CacheBackend + Send + Sync>;

/// Unified interface for cache backends.
///
/// Implementations must tolerate concurrent calls to every method from many
/// tasks without external locking.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Name of the backend (used for logging only).
    fn name(&self) -> &str;

    /// Look up an entry.
    ///
    /// Returns `Ok(None)` if there is no entry for `key`; errors are reserved
    /// for a backend that couldn't answer the question.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite an entry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove an entry. Removing an entry that doesn't exist is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry.
    async fn reset(&self) -> Result<()>;

    /// Release whatever the backend holds open. Nothing should be called after
    /// this; backends with nothing to release don't need to implement it.
    async fn close(&self) {}
}
