//! Read-through cache in front of a [`SpecSource`].

use crate::codec;
use crate::error::{ErrorKind, Result};
use crate::models::{ApiSpec, Artifact, AsyncApiSpec, Content, ODataSpec, OpenApiSpec};
use crate::source::{SourceHandle, SpecSource};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use speccy_cache::CacheHandle;
use speccy_storage::NotificationStream;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Caches documents from a [`SpecSource`] in a byte-oriented [`CacheBackend`](speccy_cache::CacheBackend).
///
/// # Lifecycle
/// Accessors work straight away, but until [`initialize()`](Self::initialize)
/// has finished nothing in the cache backend is trusted: every read still goes
/// to the source and refreshes the entry. Initializing flushes whatever a
/// previous process left behind, subscribes to the source's change feed and
/// marks the cache as synced. From then on hits are served from the backend,
/// and every change notification flushes the backend in full.
///
/// # Errors
/// A failing cache backend is never bypassed: if it can't answer, the accessor
/// fails without asking the source.
pub struct SpecCache {
    source: SourceHandle,
    cache: CacheHandle,
    initialized: OnceCell<()>,
    synced: AtomicBool,
    worker: OnceLock<JoinHandle<()>>,
}

impl SpecCache {
    pub fn new(source: SourceHandle, cache: CacheHandle) -> Self {
        Self {
            source,
            cache,
            initialized: OnceCell::new(),
            synced: AtomicBool::new(false),
            worker: OnceLock::new(),
        }
    }

    /// Flush the cache, subscribe to change notifications and start the
    /// invalidation worker.
    ///
    /// Only the first call does anything, but every call returns only once
    /// the cache is synced, including calls that overlap the first one. The
    /// worker runs until `stop` is cancelled or this cache is dropped. Must be
    /// called from within a Tokio runtime.
    pub async fn initialize(&self, stop: CancellationToken) {
        self.initialized.get_or_init(|| self.start(stop)).await;
    }

    async fn start(&self, stop: CancellationToken) {
        if let Err(err) = self.cache.reset().await {
            tracing::error!(cache = self.cache.name(), error = ?err, "Failed to flush spec cache on startup");
        }
        let feed = self.source.notifications(stop.clone());
        self.synced.store(true, Ordering::Release);
        let worker = tokio::spawn(invalidate_on_change(self.cache.clone(), feed, stop));
        _ = self.worker.set(worker);
        tracing::info!(cache = self.cache.name(), "Spec cache synced");
    }

    /// Whether [`initialize()`](Self::initialize) has completed. Never reverts.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn worker_finished(&self) -> bool {
        self.worker.get().is_some_and(JoinHandle::is_finished)
    }

    /// Get one document, from the cache if possible.
    #[instrument(skip(self), fields(kind = %A::KIND, cache = self.cache.name()))]
    pub async fn get<A: Artifact>(&self, id: &str) -> Result<Option<A>> {
        let key = A::KIND.cache_key(id);
        let cached = self.cache.get(&key).await.or_raise(|| ErrorKind::Cache)?;
        if let Some(bytes) = cached {
            if self.is_synced() {
                tracing::debug!(key, "Spec cache hit");
                return codec::decode(&key, &bytes).map(Some);
            }
            tracing::debug!(key, "Spec cache not synced; refreshing entry");
        } else {
            tracing::debug!(key, "Spec cache miss");
        }

        let Some(document) = A::from_source(self.source.as_ref(), id).await.or_raise(|| ErrorKind::Store)? else {
            if let Err(err) = self.cache.delete(&key).await {
                tracing::warn!(key, error = ?err, "Failed to delete stale spec cache entry");
            }
            return Ok(None);
        };
        self.cache.set(&key, &codec::encode(&key, &document)?).await.or_raise(|| ErrorKind::Cache)?;
        // Whatever the backend hands back is the answer, not what was just
        // fetched.
        let stored = self
            .cache
            .get(&key)
            .await
            .or_raise(|| ErrorKind::Cache)?
            .ok_or_raise(|| ErrorKind::Evicted(key.clone()))?;
        codec::decode(&key, &stored).map(Some)
    }
}

impl Drop for SpecCache {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get() {
            worker.abort();
        }
    }
}

async fn invalidate_on_change(cache: CacheHandle, mut feed: NotificationStream, stop: CancellationToken) {
    loop {
        let notification = tokio::select! {
            () = stop.cancelled() => break,
            next = feed.next() => match next {
                Some(notification) => notification,
                None => break,
            },
        };
        match cache.reset().await {
            Ok(()) => tracing::info!(
                bucket = %notification.bucket,
                key = ?notification.key,
                "Flushed spec cache after change notification"
            ),
            Err(err) => tracing::error!(cache = cache.name(), error = ?err, "Failed to flush spec cache"),
        }
    }
    tracing::debug!("Spec cache invalidation stopped");
}

#[async_trait]
impl SpecSource for SpecCache {
    async fn api_spec(&self, id: &str) -> Result<Option<ApiSpec>> {
        self.get(id).await
    }

    async fn open_api_spec(&self, id: &str) -> Result<Option<OpenApiSpec>> {
        self.get(id).await
    }

    async fn odata_spec(&self, id: &str) -> Result<Option<ODataSpec>> {
        self.get(id).await
    }

    async fn async_api_spec(&self, id: &str) -> Result<Option<AsyncApiSpec>> {
        self.get(id).await
    }

    async fn content(&self, id: &str) -> Result<Option<Content>> {
        self.get(id).await
    }

    fn notifications(&self, stop: CancellationToken) -> NotificationStream {
        self.source.notifications(stop)
    }
}
