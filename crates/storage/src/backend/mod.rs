//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for reading artifacts out of a blob store (local filesystem,
//! S3-compatible services, etc.).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::{ErrorKind, Result};
use crate::notify::{self, NotificationStream};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Unified interface for blob store backends.
///
/// Objects are addressed by a bucket name and a `/`-separated key. All keys
/// must be validated using [`validate_key`](crate::validate_key) before use;
/// implementations enforce this.
///
/// # Absence
/// A missing object is reported as [`NotFound`](crate::error::ErrorKind::NotFound).
/// Callers that treat absence as a normal answer should check
/// [`is_not_found()`](crate::error::ErrorKind::is_not_found) before
/// propagating:
///
/// ```
/// use speccy_storage::backend::StorageBackend;
/// use speccy_storage::error::Result;
///
/// async fn maybe_read(backend: &dyn StorageBackend, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
///     match backend.read(bucket, key).await {
///         Ok(body) => Ok(Some(body)),
///         Err(e) if e.is_not_found() => Ok(None),
///         Err(e) => Err(e),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Open an object for streaming reads.
    ///
    /// The async setup (opening the file, sending the request) happens before
    /// returning, so a missing object is reported here rather than on the
    /// first read.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio::io::AsyncReadExt;
    /// # use speccy_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut reader = backend.object("specs", "orders/apiSpec.json").await?;
    /// let mut head = [0u8; 16];
    /// let read = reader.read(&mut head).await.map_err(speccy_storage::error::ErrorKind::Io)?;
    /// println!("{:?}", &head[..read]);
    /// # Ok(())
    /// # }
    /// ```
    async fn object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead>;

    /// Read an entire object into memory.
    ///
    /// Default implementation drains [`object()`](Self::object).
    async fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let mut reader = self.object(bucket, key).await?;
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.map_err(ErrorKind::Io)?;
        Ok(body)
    }

    /// Subscribe to change notifications for a bucket.
    ///
    /// The subscription is established before this returns: anything that
    /// changes afterwards is delivered. The stream ends once `stop` is
    /// cancelled.
    ///
    /// Default implementation never yields; backends that can't observe
    /// changes don't have to pretend otherwise.
    fn notifications(&self, bucket: &str, stop: CancellationToken) -> NotificationStream {
        tracing::debug!(backend = self.name(), bucket, "Backend has no change feed; notifications are idle");
        notify::idle(stop)
    }
}
