//! Local filesystem storage backend.
//!
//! Buckets are directories directly under a configured root, objects are files
//! inside them. Handy for development and for serving artifacts that were
//! synced to disk by something else.

use crate::backend::BoxAsyncRead;
use crate::error::ErrorKind;
use crate::notify::{self, DEFAULT_POLL_INTERVAL, NotificationStream, Snapshot};
use crate::{StorageBackend, error::Result, key::validate as validate_key};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Local filesystem storage backend.
///
/// Objects are stored at `<root>/<bucket>/<key>`. Changes are found by
/// rescanning the bucket directory every poll interval and comparing file sizes
/// and modification times, so anything that rewrites a file in place without
/// changing either goes unnoticed.
///
/// # Examples
///
/// ```no_run
/// use speccy_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/specs")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory containing one subdirectory per bucket
    root: PathBuf,
    poll_interval: Duration,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root, poll_interval: DEFAULT_POLL_INTERVAL })
    }

    /// How often a subscribed bucket is rescanned for changes.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The bucket is validated like a key, but must be a single segment.
    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        let bucket_segment = validate_key(bucket)?;
        if bucket_segment.contains('/') {
            exn::bail!(ErrorKind::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket_segment))
    }

    /// Get the absolute path for an object.
    fn absolute_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let key = validate_key(key)?;
        Ok(key.split('/').fold(self.bucket_path(bucket)?, |path, segment| path.join(segment)))
    }

    fn map_io_error(e: std::io::Error, object: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(object.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(object.to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let path = self.absolute_path(bucket, key)?;
        let object = format!("{bucket}/{key}");
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &object))?;
        // A "directory object" doesn't exist as far as callers are concerned.
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(object));
        }
        let file = fs::File::open(&path).await.map_err(|e| Self::map_io_error(e, &object))?;
        Ok(Box::pin(file))
    }

    fn notifications(&self, bucket: &str, stop: CancellationToken) -> NotificationStream {
        let dir = match self.bucket_path(bucket) {
            Ok(dir) => dir,
            Err(err) => {
                tracing::warn!(backend = %self.name, bucket, error = ?err, "Cannot watch invalid bucket");
                return notify::idle(stop);
            },
        };
        // Take the baseline now so that changes made after subscribing are
        // reported, even if they land before the first poll.
        let baseline = match scan(&dir) {
            Ok(baseline) => Some(baseline),
            Err(err) => {
                tracing::warn!(backend = %self.name, bucket, error = ?err, "Failed to scan bucket; deferring baseline");
                None
            },
        };
        tracing::debug!(backend = %self.name, bucket, interval = ?self.poll_interval, "Polling bucket for changes");
        notify::poll(bucket, self.poll_interval, baseline, stop, move || {
            let dir = dir.clone();
            async move {
                match tokio::task::spawn_blocking(move || scan(&dir)).await {
                    Ok(scanned) => scanned,
                    Err(err) => Err(exn::Exn::from(ErrorKind::BackendError(format!("bucket scan panicked: {err}")))),
                }
            }
        })
    }
}

/// Fingerprint every file below a bucket directory. A bucket that doesn't
/// exist (yet) is empty.
fn scan(bucket_dir: &Path) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    let mut pending = vec![bucket_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => exn::bail!(LocalBackend::map_io_error(e, &dir.display().to_string())),
        };
        for entry in entries {
            let path = entry.map_err(ErrorKind::Io)?.path();
            // Removed between listing and stat; the next scan won't see it either.
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            if metadata.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(bucket_dir) else {
                continue;
            };
            let key = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            let modified = metadata.modified().map_err(ErrorKind::Io)?;
            snapshot.insert(key, format!("{}@{modified:?}", metadata.len()));
        }
    }
    Ok(snapshot)
}
