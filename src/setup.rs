//! Turn configuration into live backends.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use speccy_cache::{CacheHandle, MemoryCache, MokaCache, SqliteCache};
use speccy_config::{BackendConfig, CacheConfig, Config};
use speccy_spec::Store;
use speccy_storage::BackendHandle;
use speccy_storage::backend::LocalBackend;
use std::sync::Arc;

/// SQLite's name for a database that only lives in memory.
const IN_MEMORY: &str = ":memory:";

pub fn storage(config: &BackendConfig) -> Result<BackendHandle> {
    Ok(match config {
        BackendConfig::Local { root, .. } => {
            let backend = LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?;
            Arc::new(match config.poll_interval() {
                Some(interval) => backend.with_poll_interval(interval),
                None => backend,
            })
        },
        #[cfg(feature = "s3")]
        BackendConfig::S3 { prefix, region, endpoint, key_id, key_secret } => Arc::new(
            speccy_storage::backend::S3Backend::new(
                "s3",
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret,
            )
            .or_raise(|| ErrorKind::Storage)?,
        ),
        #[cfg(not(feature = "s3"))]
        BackendConfig::S3 { .. } => exn::bail!(ErrorKind::Unsupported("s3")),
    })
}

pub async fn cache(config: &CacheConfig) -> Result<CacheHandle> {
    Ok(match config {
        CacheConfig::Memory => Arc::new(MemoryCache::default()),
        CacheConfig::Moka { capacity_bytes, .. } => Arc::new(MokaCache::new(*capacity_bytes, config.ttl())),
        CacheConfig::Sqlite { path, .. } => {
            let cache = match path.as_os_str() == IN_MEMORY {
                true => SqliteCache::connect_in_memory().await,
                false => SqliteCache::connect(path).await,
            };
            Arc::new(cache.or_raise(|| ErrorKind::Cache)?.with_ttl(config.ttl()))
        },
    })
}

pub fn store(config: &Config) -> Result<Store> {
    let storage_config = &config.storage;
    let backend = storage(&storage_config.backend)?;
    tracing::debug!(backend = backend.name(), bucket = %storage_config.bucket, "Blob store ready");
    Store::new(
        backend,
        storage_config.bucket.as_str(),
        &storage_config.external_address,
        &storage_config.assets_folder,
    )
    .or_raise(|| ErrorKind::Storage)
}
