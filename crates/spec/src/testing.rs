//! Test doubles for exercising [`SpecCache`](crate::SpecCache) call sequences.

use crate::error::Result;
use crate::models::{ApiSpec, AsyncApiSpec, Content, Kind, ODataSpec, OpenApiSpec};
use crate::source::SpecSource;
use crate::store::Store;
use async_trait::async_trait;
use speccy_cache::error::{ErrorKind as CacheErrorKind, Result as CacheResult};
use speccy_cache::{CacheBackend, MemoryCache};
use speccy_storage::NotificationStream;
use speccy_storage::backend::MockBackend;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll `condition` until it holds, failing the test after a second.
pub async fn wait_for(condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met within a second");
}

/// A [`MemoryCache`] that counts calls and fails on demand.
#[derive(Default)]
pub struct ScriptedCache {
    inner: MemoryCache,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    fail_reset: AtomicBool,
    forget_writes: AtomicBool,
    read_answer: Mutex<Option<Vec<u8>>>,
    reset_delay: Mutex<Duration>,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    resets: AtomicUsize,
}

impl ScriptedCache {
    pub fn fail_get(&self) {
        self.fail_get.store(true, Ordering::SeqCst);
    }

    pub fn fail_set(&self) {
        self.fail_set.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn fail_reset(&self) {
        self.fail_reset.store(true, Ordering::SeqCst);
    }

    /// Make every reset take `delay` before it does anything.
    pub fn slow_resets(&self, delay: Duration) {
        *self.reset_delay.lock().unwrap() = delay;
    }

    /// Accept writes without storing them.
    pub fn forget_writes(&self) {
        self.forget_writes.store(true, Ordering::SeqCst);
    }

    /// Answer every read with `value`, whatever was written.
    pub fn answer_reads_with(&self, value: Vec<u8>) {
        *self.read_answer.lock().unwrap() = Some(value);
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn injected(flag: &AtomicBool) -> CacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            exn::bail!(CacheErrorKind::Database);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for ScriptedCache {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Self::injected(&self.fail_get)?;
        if let Some(answer) = self.read_answer.lock().unwrap().clone() {
            return Ok(Some(answer));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.fail_set)?;
        if self.forget_writes.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.fail_delete)?;
        self.inner.delete(key).await
    }

    async fn reset(&self) -> CacheResult<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        let delay = *self.reset_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::injected(&self.fail_reset)?;
        self.inner.reset().await
    }
}

/// A [`Store`] over a [`MockBackend`] that records what it was asked for.
pub struct RecordingSource {
    store: Store,
    calls: Mutex<HashMap<Kind, usize>>,
    subscriptions: AtomicUsize,
}

impl RecordingSource {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            store: Store::new(backend, "test", "https://test.ninja", "assets").unwrap(),
            calls: Mutex::new(HashMap::new()),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self, kind: Kind) -> usize {
        self.calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn record(&self, kind: Kind) {
        *self.calls.lock().unwrap().entry(kind).or_default() += 1;
    }
}

#[async_trait]
impl SpecSource for RecordingSource {
    async fn api_spec(&self, id: &str) -> Result<Option<ApiSpec>> {
        self.record(Kind::ApiSpec);
        self.store.api_spec(id).await
    }

    async fn open_api_spec(&self, id: &str) -> Result<Option<OpenApiSpec>> {
        self.record(Kind::OpenApiSpec);
        self.store.open_api_spec(id).await
    }

    async fn odata_spec(&self, id: &str) -> Result<Option<ODataSpec>> {
        self.record(Kind::ODataSpec);
        self.store.odata_spec(id).await
    }

    async fn async_api_spec(&self, id: &str) -> Result<Option<AsyncApiSpec>> {
        self.record(Kind::AsyncApiSpec);
        self.store.async_api_spec(id).await
    }

    async fn content(&self, id: &str) -> Result<Option<Content>> {
        self.record(Kind::Content);
        self.store.content(id).await
    }

    fn notifications(&self, stop: CancellationToken) -> NotificationStream {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.store.notifications(stop)
    }
}
