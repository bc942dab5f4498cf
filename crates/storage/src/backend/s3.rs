//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, MinIO, Backblaze B2, Tigris (Fly.io), and
//! others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file.
//!
//! # Change notifications
//!
//! Plain S3 has no pull-based change feed (bucket notifications are pushed to
//! SNS/SQS/Lambda), so this backend keeps the default idle feed.

use crate::backend::BoxAsyncRead;
use crate::{
    StorageBackend,
    error::{ErrorKind, Result},
    validate_key,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::get_object::GetObjectError,
};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Reads objects from any bucket the credentials can see, optionally under a
/// key prefix shared by all buckets. Retries with exponential back-off are
/// handled by the SDK; callers see a single failure.
///
/// # Examples
///
/// ```no_run
/// use speccy_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "minio",
///     None,
///     "us-east-1",
///     Some("http://minio.kyma-system.svc:9000".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.map(validate_key).transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "speccy-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (MinIO, Backblaze, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from an object key.
    fn full_key(&self, key: &str) -> Result<String> {
        Ok(Self::join_prefix(self.prefix.as_deref(), &validate_key(key)?))
    }

    fn join_prefix(prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| exn::Exn::from(ErrorKind::BackendError("S3 rate limiter closed".to_string())))
    }

    fn map_get_error(err: SdkError<GetObjectError>, object: String) -> ErrorKind {
        match &err {
            SdkError::ServiceError(service) if service.err().is_no_such_key() => ErrorKind::NotFound(object),
            SdkError::ServiceError(service) if service.err().code() == Some("AccessDenied") => {
                ErrorKind::PermissionDenied(object)
            },
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
                ErrorKind::Network(DisplayErrorContext(&err).to_string())
            },
            _ => ErrorKind::BackendError(DisplayErrorContext(&err).to_string()),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let full_key = self.full_key(key)?;
        let object = format!("{bucket}/{full_key}");
        // Hold the permit until the body has been drained, otherwise the
        // limiter only limits request headers.
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|err| Self::map_get_error(err, object.clone()))?;
        let body = output
            .body
            .collect()
            .await
            .map_err(|err| ErrorKind::Network(format!("reading {object}: {err}")))?
            .into_bytes();
        tracing::trace!(backend = %self.name, object = %object, bytes = body.len(), "Fetched S3 object");
        Ok(Box::pin(Cursor::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_without_prefix() {
        assert_eq!(S3Backend::join_prefix(None, "orders/apiSpec.json"), "orders/apiSpec.json");
    }

    #[test]
    fn test_join_with_prefix() {
        assert_eq!(S3Backend::join_prefix(Some("specs"), "orders/apiSpec.json"), "specs/orders/apiSpec.json");
    }

    #[test]
    fn test_join_with_trailing_slash_prefix() {
        assert_eq!(S3Backend::join_prefix(Some("specs/"), "orders/apiSpec.json"), "specs/orders/apiSpec.json");
    }

    #[test]
    fn test_prefix_is_validated() {
        let result = S3Backend::new("s3", Some("../escape".to_string()), "us-east-1", None::<String>, "id", "secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_full_key() {
        let backend =
            S3Backend::new("s3", Some("specs/".to_string()), "us-east-1", None::<String>, "id", "secret").unwrap();
        assert_eq!(backend.full_key("./orders//content.json").unwrap(), "specs/orders/content.json");
        assert!(backend.full_key("../content.json").is_err());
    }
}
