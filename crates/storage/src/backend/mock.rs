//! In-memory storage backend for testing.

use crate::backend::BoxAsyncRead;
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::notify::{Notification, NotificationStream};
use crate::StorageBackend;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

type ObjectId = (String, String);

const NOTIFICATION_BUFFER: usize = 64;

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all methods can
/// operate on `&self` without external synchronisation. Every [`put()`](Self::put)
/// and [`remove()`](Self::remove) is announced on the bucket's change feed,
/// which makes this the only backend that exercises notification-driven
/// invalidation end to end.
///
/// # Examples
///
/// ```
/// use speccy_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("test", "valid/apiSpec.json", "{}"),
/// ]);
/// assert_eq!(backend.read("test", "valid/apiSpec.json").await?, b"{}");
///
/// backend.put("test", "other/apiSpec.json", "[]").await;
/// assert_eq!(backend.read("test", "other/apiSpec.json").await?, b"[]");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    failing: RwLock<HashSet<ObjectId>>,
    changes: broadcast::Sender<Notification>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. key traversal). If test setup
    /// is wrong, then test should not pass.
    pub fn with_objects(
        objects: impl IntoIterator<Item = (impl Into<String>, impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let mut map = HashMap::new();
        for (bucket, key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid key {key}");
            };
            map.insert((bucket.into(), validated), data.into());
        }
        let (changes, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            name: "mock".to_string(),
            objects: RwLock::new(map),
            failing: RwLock::new(HashSet::new()),
            changes,
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Create or overwrite an object, notifying subscribers of the bucket.
    pub async fn put(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        let key = Self::validated(key);
        self.objects.write().await.insert((bucket.to_string(), key.clone()), data.into());
        self.announce(bucket, key);
    }

    /// Remove an object (if it exists), notifying subscribers of the bucket.
    pub async fn remove(&self, bucket: &str, key: &str) {
        let key = Self::validated(key);
        self.objects.write().await.remove(&(bucket.to_string(), key.clone()));
        self.announce(bucket, key);
    }

    /// Make every subsequent read of an object fail with a network error.
    pub async fn fail(&self, bucket: &str, key: &str) {
        let key = Self::validated(key);
        self.failing.write().await.insert((bucket.to_string(), key));
    }

    fn validated(key: &str) -> String {
        match validate_key(key) {
            Ok(key) => key,
            Err(_) => panic!("MockBackend: invalid key {key}"),
        }
    }

    fn announce(&self, bucket: &str, key: String) {
        // No subscribers is fine; nobody is listening yet.
        _ = self.changes.send(Notification::new(bucket, Some(key)));
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, &str, &str); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let id = (bucket.to_string(), validate_key(key)?);
        if self.failing.read().await.contains(&id) {
            exn::bail!(ErrorKind::Network(format!("injected failure for {bucket}/{key}")));
        }
        let data = self
            .objects
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("{bucket}/{key}"))))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    fn notifications(&self, bucket: &str, stop: CancellationToken) -> NotificationStream {
        // Subscribe now, not on first poll, so nothing sent after this call
        // returns can be missed.
        let mut receiver = self.changes.subscribe();
        let bucket = bucket.to_string();
        Box::pin(stream! {
            loop {
                let received = tokio::select! {
                    _ = stop.cancelled() => break,
                    received = receiver.recv() => received,
                };
                match received {
                    Ok(notification) if notification.bucket == bucket => yield notification,
                    Ok(_) => continue,
                    // Something changed, we just don't know what anymore.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, bucket = %bucket, "Mock change feed lagged");
                        yield Notification::new(bucket.clone(), None);
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
